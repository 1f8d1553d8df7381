//! viewcap demo host.
//!
//! Animates a canvas, then exports a JPEG snapshot, a video assembled from
//! still frames and a live recording into an output directory.
//!
//! Usage: `viewcap-demo [OUTPUT_DIR] [RECORD_SECONDS]`

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use viewcap_render::{CanvasView, DynamicImage, Rgba, RgbaImage};
use viewcap_session::{CaptureConfig, CaptureSession, Size};
use viewcap_types::event_channel;

const CANVAS_SIZE: Size = Size::new(640, 360);
const ANIMATION_INTERVAL: Duration = Duration::from_millis(16);
const ASSEMBLY_FRAMES: u32 = 45;

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "viewcap_demo=debug,viewcap_session=debug,viewcap_encoder=info,viewcap_render=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Draw frame `t` of the animation: a square bouncing over a gradient.
fn draw_scene(img: &mut RgbaImage, t: u32) {
    let (w, h) = img.dimensions();
    let side = h / 4;
    let span_x = (w - side).max(1);
    let span_y = (h - side).max(1);

    let bounce = |pos: u32, span: u32| {
        let p = pos % (2 * span);
        if p < span {
            p
        } else {
            2 * span - p
        }
    };
    let sx = bounce(t.wrapping_mul(7), span_x);
    let sy = bounce(t.wrapping_mul(4), span_y);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let inside = x >= sx && x < sx + side && y >= sy && y < sy + side;
        *pixel = if inside {
            Rgba([255, 210, 40, 255])
        } else {
            Rgba([(x * 255 / w) as u8, (t % 255) as u8, (y * 255 / h) as u8, 255])
        };
    }
}

fn main() -> Result<()> {
    init_logging();
    info!("viewcap demo starting");

    let mut args = std::env::args().skip(1);
    let out_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("viewcap-demo"));
    let record_secs: f64 = match args.next() {
        Some(s) => s.parse().context("RECORD_SECONDS must be a number")?,
        None => 2.0,
    };
    if !record_secs.is_finite() || record_secs < 0.0 {
        bail!("RECORD_SECONDS must be a non-negative number, got {record_secs}");
    }
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let canvas = CanvasView::new(CANVAS_SIZE);
    canvas.update(|img| draw_scene(img, 0));

    // Animate the canvas until the stop channel closes.
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    let painter = canvas.clone();
    let animator = thread::Builder::new()
        .name("viewcap-demo-animator".to_string())
        .spawn(move || {
            let mut t = 0u32;
            loop {
                match stop_rx.recv_timeout(ANIMATION_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                t = t.wrapping_add(1);
                painter.update(|img| draw_scene(img, t));
            }
        })
        .context("spawning animator")?;

    // Print session events as JSON lines.
    let (event_tx, event_rx) = event_channel();
    let printer = thread::spawn(move || {
        for event in event_rx {
            match serde_json::to_string(&event) {
                Ok(json) => println!("event: {json}"),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
    });

    let config = CaptureConfig {
        width: CANVAS_SIZE.width,
        height: CANVAS_SIZE.height,
        frame_rate: 30.0,
        output_path: Some(out_dir.join("assembled.mp4")),
        jpeg_quality: 0.85,
    };
    let mut session = CaptureSession::new(Arc::new(canvas.clone()), config.clone())?
        .with_events(event_tx.clone());

    // Snapshot
    let jpeg = session.take_snapshot_jpeg(None)?;
    let snapshot_path = out_dir.join("snapshot.jpg");
    std::fs::write(&snapshot_path, &jpeg)
        .with_context(|| format!("writing {}", snapshot_path.display()))?;
    info!(path = %snapshot_path.display(), bytes = jpeg.len(), "Snapshot saved");

    // Assembly from pre-rendered stills
    let stills: Vec<DynamicImage> = (0..ASSEMBLY_FRAMES)
        .map(|t| {
            let mut img = RgbaImage::new(CANVAS_SIZE.width, CANVAS_SIZE.height);
            draw_scene(&mut img, t * 3);
            DynamicImage::ImageRgba8(img)
        })
        .collect();
    let assembled = session.create_video_from_images(stills)?.wait()?;
    info!(
        path = %assembled.path.display(),
        frames = assembled.frame_count,
        duration_ms = assembled.duration.as_millis() as u64,
        "Assembly finished"
    );

    // Live recording of the animated canvas
    drop(session);
    let mut session = CaptureSession::new(
        Arc::new(canvas),
        CaptureConfig {
            output_path: Some(out_dir.join("recording.mp4")),
            ..config
        },
    )?
    .with_events(event_tx);

    let started = Instant::now();
    let handle = session.start_recording()?;
    thread::sleep(Duration::from_secs_f64(record_secs));
    session.stop_recording()?;
    let recorded = handle.wait()?;
    info!(
        path = %recorded.path.display(),
        frames = recorded.frame_count,
        wall_ms = started.elapsed().as_millis() as u64,
        "Recording finished"
    );

    drop(stop_tx);
    if animator.join().is_err() {
        warn!("Animator thread panicked");
    }

    // Closing the last sender ends the printer.
    drop(session);
    if printer.join().is_err() {
        warn!("Event printer panicked");
    }

    info!("viewcap demo finished");
    Ok(())
}
