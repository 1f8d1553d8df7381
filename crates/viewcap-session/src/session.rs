//! Capture session orchestration.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};
use viewcap_encoder::{video_settings, EncoderError, VideoSettings, VideoWriter, OUTPUT_EXTENSION};
use viewcap_render::{
    jpeg_quality_scale, take_snapshot, CaptureTimestamp, CapturedFrame, DynamicImage, RgbaImage,
    View, FRAME_CHANNEL_CAPACITY,
};
use viewcap_types::{CaptureConfig, JobKind, SessionEvent, SessionState};

use crate::completion::{completion_pair, CompletionHandle};
use crate::error::SessionError;
use crate::scheduler::{RepeatingTask, Scheduler, TaskHandle, ThreadScheduler, TickControl};
use crate::worker::{assembly_worker, recording_worker, FrameMessage, ImageSource};
use crate::SessionResult;

/// Highest accepted frame rate.
pub const MAX_FRAME_RATE: f64 = 240.0;

static OUTPUT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// State and event sink shared between a session and its worker.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    state: RwLock<SessionState>,
    events: RwLock<Option<Sender<SessionEvent>>>,
}

impl SessionShared {
    pub(crate) fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub(crate) fn transition_to(&self, new_state: SessionState) {
        let previous = {
            let mut state = self.state.write();
            let prev = state.clone();
            *state = new_state.clone();
            prev
        };

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.send_event(SessionEvent::StateChanged {
            previous,
            current: new_state,
        });
    }

    pub(crate) fn send_event(&self, event: SessionEvent) {
        if let Some(tx) = self.events.read().as_ref() {
            if let Err(e) = tx.try_send(event) {
                warn!("Failed to send event: {}", e);
            }
        }
    }
}

/// The job currently owned by a session.
struct ActiveJob {
    kind: JobKind,
    capture_task: Option<TaskHandle>,
    stop_requested: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl ActiveJob {
    /// End capture normally. Returns false if capture had already ended.
    fn stop_capture(&mut self) -> bool {
        match self.capture_task.take() {
            Some(task) => {
                self.stop_requested.store(true, Ordering::SeqCst);
                task.cancel();
                true
            }
            None => false,
        }
    }
}

/// Captures a view as snapshots, assembled videos and live recordings.
///
/// A session runs at most one video job at a time. Starting a job while
/// another is in progress fails with [`SessionError::Busy`]; the session
/// becomes available again once the job's [`CompletionHandle`] resolves.
pub struct CaptureSession {
    config: CaptureConfig,
    settings: VideoSettings,
    view: Arc<dyn View>,
    scheduler: Arc<dyn Scheduler>,
    shared: Arc<SessionShared>,
    job: Option<ActiveJob>,
}

impl CaptureSession {
    /// Create a session for `view`.
    ///
    /// Live recording is paced by a [`ThreadScheduler`] unless another
    /// scheduler is installed with [`with_scheduler`](Self::with_scheduler).
    pub fn new(view: Arc<dyn View>, config: CaptureConfig) -> SessionResult<Self> {
        let settings = validate_config(&config)?;

        debug!(
            size = %config.size(),
            frame_rate = config.frame_rate,
            bitrate_kbps = settings.bitrate_kbps,
            "Capture session created"
        );

        Ok(Self {
            config,
            settings,
            view,
            scheduler: Arc::new(ThreadScheduler::new()),
            shared: Arc::new(SessionShared::default()),
            job: None,
        })
    }

    /// Use `scheduler` to pace live recording.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Send state changes and job results to `events`.
    pub fn with_events(self, events: Sender<SessionEvent>) -> Self {
        *self.shared.events.write() = Some(events);
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Encoder settings derived from the configured size.
    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Render the view at the configured size.
    pub fn take_snapshot(&self) -> SessionResult<RgbaImage> {
        Ok(take_snapshot(&*self.view, Some(self.config.size()))?)
    }

    /// Render the view at the configured size as JPEG.
    ///
    /// `quality` defaults to the configured JPEG quality.
    pub fn take_snapshot_jpeg(&self, quality: Option<f32>) -> SessionResult<Bytes> {
        let quality = quality.unwrap_or(self.config.jpeg_quality);
        Ok(viewcap_render::take_snapshot_jpeg(
            &*self.view,
            quality,
            Some(self.config.size()),
        )?)
    }

    /// Start recording the view.
    ///
    /// The first frame is rendered before this returns, so a recording that
    /// is stopped immediately still holds one frame. Further frames are
    /// rendered once per frame interval until [`stop_recording`] is called.
    ///
    /// [`stop_recording`]: Self::stop_recording
    #[instrument(name = "session_start_recording", skip(self))]
    pub fn start_recording(&mut self) -> SessionResult<CompletionHandle> {
        self.ensure_idle()?;

        let writer = self.create_writer()?;
        let size = self.config.size();
        let frame_rate = self.config.frame_rate;

        let first = take_snapshot(&*self.view, Some(size))
            .map_err(|e| SessionError::frame(0, e))?;

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameMessage>(FRAME_CHANNEL_CAPACITY);
        frame_tx
            .send(Ok(CapturedFrame::new(
                first,
                CaptureTimestamp::for_frame(0, frame_rate),
                0,
            )))
            .map_err(|_| SessionError::WorkerLost)?;

        let (completer, handle) = completion_pair();
        let stop_requested = Arc::new(AtomicBool::new(false));

        self.shared.transition_to(SessionState::Recording);

        let shared = Arc::clone(&self.shared);
        let worker_stop = Arc::clone(&stop_requested);
        let worker = thread::Builder::new()
            .name("viewcap-worker".to_string())
            .spawn(move || recording_worker(writer, frame_rx, worker_stop, completer, shared))
            .map_err(|e| {
                self.shared.transition_to(SessionState::Idle);
                SessionError::Spawn(e)
            })?;

        let view = Arc::clone(&self.view);
        let mut sequence: u64 = 1;
        let task: RepeatingTask = Box::new(move || {
            let message = take_snapshot(&*view, Some(size)).map(|image| {
                CapturedFrame::new(image, CaptureTimestamp::for_frame(sequence, frame_rate), sequence)
            });
            let failed = message.is_err();

            // Blocks while the encoder is behind.
            if frame_tx.send(message).is_err() {
                return TickControl::Stop;
            }
            sequence += 1;

            if failed {
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        });

        let capture_task = match self
            .scheduler
            .schedule_repeating(self.config.frame_interval(), task)
        {
            Ok(task) => task,
            Err(e) => {
                handle.cancel();
                self.job = Some(ActiveJob {
                    kind: JobKind::Recording,
                    capture_task: None,
                    stop_requested,
                    worker,
                });
                return Err(SessionError::Spawn(e));
            }
        };

        self.job = Some(ActiveJob {
            kind: JobKind::Recording,
            capture_task: Some(capture_task),
            stop_requested,
            worker,
        });

        info!(size = %size, frame_rate, "Recording started");
        Ok(handle)
    }

    /// Stop a live recording.
    ///
    /// Returns once no further frames can be captured. Frames already
    /// captured are still encoded, and the completion handle returned by
    /// [`start_recording`](Self::start_recording) resolves after the file
    /// is finalized. Fails with [`SessionError::NotRecording`] and has no
    /// other effect when no recording is running.
    #[instrument(name = "session_stop_recording", skip(self))]
    pub fn stop_recording(&mut self) -> SessionResult<()> {
        let recording = self.state().is_recording();
        let stopped = match self.job.as_mut() {
            Some(job) if recording && job.kind == JobKind::Recording => job.stop_capture(),
            _ => false,
        };

        if !stopped {
            debug!(state = self.state().name(), "Stop requested while not recording");
            return Err(SessionError::NotRecording);
        }

        info!("Recording stopped");
        Ok(())
    }

    /// Assemble a video from in-memory images, one frame per image.
    pub fn create_video_from_images(
        &mut self,
        images: Vec<DynamicImage>,
    ) -> SessionResult<CompletionHandle> {
        self.create_video(images.into_iter().map(ImageSource::Image).collect())
    }

    /// Assemble a video from image files, one frame per file.
    ///
    /// Files are decoded on the worker; a file that cannot be read fails the
    /// job with [`SessionError::FrameEncodeFailure`] at its index.
    pub fn create_video_from_image_paths(
        &mut self,
        paths: Vec<PathBuf>,
    ) -> SessionResult<CompletionHandle> {
        self.create_video(paths.into_iter().map(ImageSource::Path).collect())
    }

    /// Assemble a video from a mix of in-memory images and files.
    #[instrument(name = "session_create_video", skip(self, images), fields(images = images.len()))]
    pub fn create_video(&mut self, images: Vec<ImageSource>) -> SessionResult<CompletionHandle> {
        if images.is_empty() {
            return Err(SessionError::InvalidConfiguration(
                "at least one image is required".to_string(),
            ));
        }

        self.ensure_idle()?;

        let writer = self.create_writer()?;
        let (completer, handle) = completion_pair();
        let total_frames = images.len();

        self.shared
            .transition_to(SessionState::Assembling { total_frames });

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("viewcap-worker".to_string())
            .spawn(move || assembly_worker(writer, images, completer, shared))
            .map_err(|e| {
                self.shared.transition_to(SessionState::Idle);
                SessionError::Spawn(e)
            })?;

        self.job = Some(ActiveJob {
            kind: JobKind::Assembly,
            capture_task: None,
            stop_requested: Arc::new(AtomicBool::new(false)),
            worker,
        });

        info!(total_frames, "Video assembly started");
        Ok(handle)
    }

    /// Fail with `Busy` unless idle, and reap the previous job.
    fn ensure_idle(&mut self) -> SessionResult<()> {
        let state = self.state();
        if !state.is_idle() {
            return Err(SessionError::Busy(state.name()));
        }

        if let Some(job) = self.job.take() {
            finish_active_job(job);
        }
        Ok(())
    }

    fn create_writer(&self) -> SessionResult<VideoWriter> {
        let path = self
            .config
            .output_path
            .clone()
            .unwrap_or_else(default_output_path);

        VideoWriter::create(&path, self.settings.clone(), self.config.frame_rate).map_err(|e| {
            match e {
                EncoderError::InvalidSettings(msg) => SessionError::InvalidConfiguration(msg),
                other => SessionError::EncoderInitFailure(other),
            }
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            finish_active_job(job);
        }
    }
}

/// Stop the capture task and wait for the worker to exit.
fn finish_active_job(mut job: ActiveJob) {
    job.stop_capture();
    if job.worker.join().is_err() {
        warn!(job = job.kind.name(), "Capture worker panicked");
    }
}

/// Check a configuration and derive its encoder settings.
fn validate_config(config: &CaptureConfig) -> SessionResult<VideoSettings> {
    let settings = video_settings(config.size())
        .map_err(|e| SessionError::InvalidConfiguration(e.to_string()))?;

    if !config.frame_rate.is_finite() || config.frame_rate <= 0.0 {
        return Err(SessionError::InvalidConfiguration(format!(
            "frame rate must be positive, got {}",
            config.frame_rate
        )));
    }
    if config.frame_rate > MAX_FRAME_RATE {
        return Err(SessionError::InvalidConfiguration(format!(
            "frame rate {} exceeds the maximum of {MAX_FRAME_RATE}",
            config.frame_rate
        )));
    }

    jpeg_quality_scale(config.jpeg_quality)
        .map_err(|e| SessionError::InvalidConfiguration(e.to_string()))?;

    Ok(settings)
}

/// A fresh file name in the system temp directory.
fn default_output_path() -> PathBuf {
    let n = OUTPUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "viewcap-{}-{n}.{OUTPUT_EXTENSION}",
        std::process::id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewcap_render::{CanvasView, Size};

    fn canvas() -> Arc<dyn View> {
        Arc::new(CanvasView::new(Size::new(32, 24)))
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let cases = [
            CaptureConfig::with_size(0, 10),
            CaptureConfig::with_size(10, 0),
            CaptureConfig {
                frame_rate: 0.0,
                ..CaptureConfig::with_size(16, 16)
            },
            CaptureConfig {
                frame_rate: f64::NAN,
                ..CaptureConfig::with_size(16, 16)
            },
            CaptureConfig {
                frame_rate: MAX_FRAME_RATE + 1.0,
                ..CaptureConfig::with_size(16, 16)
            },
            CaptureConfig {
                jpeg_quality: 1.5,
                ..CaptureConfig::with_size(16, 16)
            },
        ];

        for config in cases {
            let result = CaptureSession::new(canvas(), config.clone());
            assert!(
                matches!(result, Err(SessionError::InvalidConfiguration(_))),
                "accepted {config:?}"
            );
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = CaptureSession::new(canvas(), CaptureConfig::with_size(32, 24)).unwrap();
        assert!(session.state().is_idle());
        assert_eq!(session.settings().size(), Size::new(32, 24));
    }

    #[test]
    fn test_session_snapshots_use_configured_size() {
        let session = CaptureSession::new(canvas(), CaptureConfig::with_size(20, 10)).unwrap();

        let image = session.take_snapshot().unwrap();
        assert_eq!((image.width(), image.height()), (20, 10));

        let jpeg = session.take_snapshot_jpeg(None).unwrap();
        assert!(!jpeg.is_empty());

        assert!(matches!(
            session.take_snapshot_jpeg(Some(0.0)),
            Err(SessionError::Snapshot(_))
        ));
    }

    #[test]
    fn test_stop_when_idle() {
        let mut session = CaptureSession::new(canvas(), CaptureConfig::with_size(16, 16)).unwrap();
        assert!(matches!(
            session.stop_recording(),
            Err(SessionError::NotRecording)
        ));
        assert!(session.state().is_idle());
    }

    #[test]
    fn test_empty_image_list_is_rejected() {
        let mut session = CaptureSession::new(canvas(), CaptureConfig::with_size(16, 16)).unwrap();
        assert!(matches!(
            session.create_video_from_images(Vec::new()),
            Err(SessionError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            session.create_video_from_image_paths(Vec::new()),
            Err(SessionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_default_output_paths_are_unique() {
        let a = default_output_path();
        let b = default_output_path();
        assert_ne!(a, b);
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some(OUTPUT_EXTENSION));
    }

    #[test]
    fn test_state_transitions_are_reported() {
        let shared = SessionShared::default();
        let (tx, rx) = viewcap_types::event_channel();
        *shared.events.write() = Some(tx);

        shared.transition_to(SessionState::Recording);

        match rx.try_recv().unwrap() {
            SessionEvent::StateChanged { previous, current } => {
                assert_eq!(previous, SessionState::Idle);
                assert_eq!(current, SessionState::Recording);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(shared.state().is_recording());
    }
}
