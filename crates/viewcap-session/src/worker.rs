//! Background jobs that own a video writer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, trace, warn};
use viewcap_encoder::VideoWriter;
use viewcap_render::{CapturedFrame, DynamicImage, ImageView, RenderError, RgbaImage};
use viewcap_types::{JobKind, SessionEvent, SessionState, Size};

use crate::completion::Completer;
use crate::error::SessionError;
use crate::session::SessionShared;
use crate::SessionResult;

/// How often a waiting worker checks for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A rendered frame, or the reason the view could not be rendered.
pub(crate) type FrameMessage = Result<CapturedFrame, RenderError>;

/// One input image for video assembly.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image already in memory.
    Image(DynamicImage),

    /// An image file to decode.
    Path(PathBuf),
}

impl ImageSource {
    fn into_rgba(self) -> Result<RgbaImage, RenderError> {
        let image = match self {
            Self::Image(image) => image.into_rgba8(),
            Self::Path(path) => ImageView::open(path)?.into_image(),
        };
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::InvalidSize(Size::new(
                image.width(),
                image.height(),
            )));
        }
        Ok(image)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Image(image)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// Encode frames from the capture channel until it closes.
///
/// The channel closing only counts as the end of the recording when
/// `stop_requested` is set. Otherwise the capture task died (for example a
/// panicking view) and the recording fails.
pub(crate) fn recording_worker(
    mut writer: VideoWriter,
    frame_rx: Receiver<FrameMessage>,
    stop_requested: Arc<AtomicBool>,
    completer: Completer,
    shared: Arc<SessionShared>,
) {
    debug!("Recording worker starting");

    let outcome = append_captured(&mut writer, &frame_rx, &stop_requested, &completer);

    // Any capture task still running stops on its next send.
    drop(frame_rx);

    finish_job(JobKind::Recording, writer, outcome, completer, &shared);
}

fn append_captured(
    writer: &mut VideoWriter,
    frame_rx: &Receiver<FrameMessage>,
    stop_requested: &AtomicBool,
    completer: &Completer,
) -> SessionResult<()> {
    loop {
        match frame_rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(Ok(frame)) => {
                writer
                    .append(&frame)
                    .map_err(|e| SessionError::frame(frame.sequence, e))?;
            }
            Ok(Err(e)) => return Err(SessionError::frame(writer.frames_written(), e)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                let frames = writer.frames_written();
                if stop_requested.load(Ordering::SeqCst) {
                    debug!(frames, "Capture ended");
                    return Ok(());
                }
                warn!(frames, "Capture task exited without a stop request");
                return Err(SessionError::frame(frames, "capture stopped unexpectedly"));
            }
        }

        if completer.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
    }
}

/// Decode and encode every image in order.
pub(crate) fn assembly_worker(
    mut writer: VideoWriter,
    images: Vec<ImageSource>,
    completer: Completer,
    shared: Arc<SessionShared>,
) {
    debug!(images = images.len(), "Assembly worker starting");

    let outcome = append_images(&mut writer, images, &completer);
    finish_job(JobKind::Assembly, writer, outcome, completer, &shared);
}

fn append_images(
    writer: &mut VideoWriter,
    images: Vec<ImageSource>,
    completer: &Completer,
) -> SessionResult<()> {
    let total = images.len();

    for (index, source) in images.into_iter().enumerate() {
        if completer.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let index = index as u64;
        let image = source
            .into_rgba()
            .map_err(|e| SessionError::frame(index, e))?;
        writer
            .append_image(&image)
            .map_err(|e| SessionError::frame(index, e))?;

        trace!(index, total, "Image appended");
    }

    Ok(())
}

/// Finalize or discard the output, report, and return the session to Idle.
fn finish_job(
    job: JobKind,
    writer: VideoWriter,
    outcome: SessionResult<()>,
    completer: Completer,
    shared: &SessionShared,
) {
    let outcome = outcome.and_then(|()| {
        if completer.is_cancelled() {
            Err(SessionError::Cancelled)
        } else {
            Ok(())
        }
    });

    let result = match outcome {
        Ok(()) => {
            shared.transition_to(SessionState::Finalizing { job });
            writer.finish().map_err(SessionError::FinalizationFailure)
        }
        Err(e) => {
            writer.abort();
            Err(e)
        }
    };

    match &result {
        Ok(output) => {
            info!(
                job = job.name(),
                path = %output.path.display(),
                frames = output.frame_count,
                "Job finished"
            );
            shared.send_event(SessionEvent::Finished {
                job,
                output: output.clone(),
            });
        }
        Err(e) => {
            warn!(job = job.name(), "Job failed: {}", e);
            shared.send_event(SessionEvent::Failed {
                job,
                message: e.to_string(),
            });
        }
    }

    shared.transition_to(SessionState::Idle);
    completer.complete(result);
}
