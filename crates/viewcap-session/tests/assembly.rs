//! Video assembly from still images.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{assert_video, canvas, gradient, read_mp4, wait};
use viewcap_render::DynamicImage;
use viewcap_session::{
    event_channel, CaptureConfig, CaptureSession, ImageSource, JobKind, SessionError,
    SessionEvent, SessionState, Size,
};

fn session(config: CaptureConfig) -> CaptureSession {
    CaptureSession::new(Arc::new(canvas(Size::new(8, 8))), config).unwrap()
}

fn config(dir: &tempfile::TempDir, name: &str, size: Size, frame_rate: f64) -> CaptureConfig {
    CaptureConfig {
        frame_rate,
        output_path: Some(dir.path().join(name)),
        ..CaptureConfig::with_size(size.width, size.height)
    }
}

#[test]
fn test_images_become_one_frame_each() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(config(&dir, "images.mp4", Size::new(64, 48), 14.0));

    // Input sizes differ from the output size and from each other.
    let images: Vec<DynamicImage> = (0..7u8)
        .map(|i| {
            let size = Size::new(40 + u32::from(i) * 8, 30 + u32::from(i) * 2);
            DynamicImage::ImageRgba8(gradient(size, i * 30))
        })
        .collect();

    let handle = session.create_video_from_images(images).unwrap();
    let output = wait(handle).unwrap();

    assert_eq!(output.frame_count, 7);
    assert_eq!(output.duration, Duration::from_millis(500));
    assert!(session.state().is_idle());
    assert_video(&read_mp4(&output.path), 7, 14.0);
}

#[test]
fn test_odd_output_size_is_encoded() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(config(&dir, "odd.mp4", Size::new(33, 17), 30.0));
    assert_eq!(session.settings().width, 33);
    assert_eq!(session.settings().height, 17);

    let images = vec![DynamicImage::ImageRgba8(gradient(Size::new(33, 17), 1)); 3];
    let output = wait(session.create_video_from_images(images).unwrap()).unwrap();
    assert_video(&read_mp4(&output.path), 3, 30.0);
}

#[test]
fn test_image_paths_are_decoded_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<_> = (0..4u8)
        .map(|i| {
            let path = dir.path().join(format!("frame-{i}.png"));
            gradient(Size::new(32, 32), i * 60).save(&path).unwrap();
            path
        })
        .collect();

    let mut session = session(config(&dir, "paths.mp4", Size::new(32, 32), 8.0));
    let output = wait(session.create_video_from_image_paths(paths).unwrap()).unwrap();

    assert_eq!(output.frame_count, 4);
    assert_video(&read_mp4(&output.path), 4, 8.0);
}

#[test]
fn test_unreadable_path_fails_and_removes_output() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    gradient(Size::new(16, 16), 10).save(&good).unwrap();
    let paths = vec![good.clone(), dir.path().join("missing.png"), good];

    let output_path = dir.path().join("broken.mp4");
    let mut session = session(CaptureConfig {
        output_path: Some(output_path.clone()),
        ..CaptureConfig::with_size(16, 16)
    });

    match wait(session.create_video_from_image_paths(paths).unwrap()) {
        Err(SessionError::FrameEncodeFailure { index, reason }) => {
            assert_eq!(index, 1);
            assert!(reason.contains("missing.png"), "reason: {reason}");
        }
        other => panic!("expected a frame failure, got {other:?}"),
    }
    assert!(!output_path.exists());
    assert!(session.state().is_idle());
}

#[test]
fn test_mixed_sources() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("still.png");
    gradient(Size::new(20, 20), 200).save(&file).unwrap();

    let mut session = session(config(&dir, "mixed.mp4", Size::new(20, 20), 10.0));
    let sources = vec![
        ImageSource::from(DynamicImage::ImageRgba8(gradient(Size::new(20, 20), 0))),
        ImageSource::from(file),
    ];

    let output = wait(session.create_video(sources).unwrap()).unwrap();
    assert_eq!(output.frame_count, 2);
}

#[test]
fn test_assembly_reports_events() {
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, events_rx) = event_channel();
    let mut session =
        session(config(&dir, "events.mp4", Size::new(16, 16), 30.0)).with_events(events_tx);

    let images = vec![DynamicImage::ImageRgba8(gradient(Size::new(16, 16), 5)); 2];
    wait(session.create_video_from_images(images).unwrap()).unwrap();

    let events: Vec<SessionEvent> = events_rx.try_iter().collect();
    assert!(matches!(
        &events[0],
        SessionEvent::StateChanged {
            previous: SessionState::Idle,
            current: SessionState::Assembling { total_frames: 2 },
        }
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Finished {
            job: JobKind::Assembly,
            ..
        }
    )));
    assert!(matches!(
        events.last(),
        Some(SessionEvent::StateChanged {
            current: SessionState::Idle,
            ..
        })
    ));
}

#[test]
fn test_assembly_failure_is_reported_as_event() {
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, events_rx) = event_channel();
    let mut session =
        session(config(&dir, "fail.mp4", Size::new(16, 16), 30.0)).with_events(events_tx);

    let result = wait(
        session
            .create_video_from_image_paths(vec![dir.path().join("nope.png")])
            .unwrap(),
    );
    assert!(matches!(
        result,
        Err(SessionError::FrameEncodeFailure { index: 0, .. })
    ));

    assert!(events_rx.try_iter().any(|e| matches!(
        e,
        SessionEvent::Failed {
            job: JobKind::Assembly,
            ..
        }
    )));
}

#[test]
fn test_missing_output_directory_fails_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(CaptureConfig {
        output_path: Some(dir.path().join("no-such-dir").join("out.mp4")),
        ..CaptureConfig::with_size(16, 16)
    });

    let images = vec![DynamicImage::ImageRgba8(gradient(Size::new(16, 16), 0))];
    assert!(matches!(
        session.create_video_from_images(images),
        Err(SessionError::EncoderInitFailure(_))
    ));
    assert!(session.state().is_idle());
}

#[test]
fn test_default_output_goes_to_temp_dir() {
    let mut session = session(CaptureConfig::with_size(16, 16));
    let images = vec![DynamicImage::ImageRgba8(gradient(Size::new(16, 16), 0))];

    let output = wait(session.create_video_from_images(images).unwrap()).unwrap();
    assert!(output.path.starts_with(std::env::temp_dir()));
    assert!(output.path.exists());

    std::fs::remove_file(&output.path).unwrap();
}

#[test]
fn test_cancel_discards_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("cancelled.mp4");
    let mut session = session(CaptureConfig {
        output_path: Some(output_path.clone()),
        ..CaptureConfig::with_size(320, 240)
    });

    let images = vec![DynamicImage::ImageRgba8(gradient(Size::new(320, 240), 90)); 300];
    let handle = session.create_video_from_images(images).unwrap();
    handle.cancel();

    assert!(matches!(wait(handle), Err(SessionError::Cancelled)));
    assert!(!output_path.exists());
    assert!(session.state().is_idle());

    // The session takes a new job after the cancelled one.
    let images = vec![DynamicImage::ImageRgba8(gradient(Size::new(320, 240), 10)); 2];
    let output = wait(session.create_video_from_images(images).unwrap()).unwrap();
    assert_eq!(output.frame_count, 2);
}

#[test]
fn test_empty_image_fails_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("empty.mp4");
    let mut session = session(CaptureConfig {
        output_path: Some(output_path.clone()),
        ..CaptureConfig::with_size(16, 16)
    });

    let images = vec![
        DynamicImage::ImageRgba8(gradient(Size::new(16, 16), 0)),
        DynamicImage::new_rgba8(0, 0),
        DynamicImage::ImageRgba8(gradient(Size::new(16, 16), 40)),
    ];

    match wait(session.create_video_from_images(images).unwrap()) {
        Err(SessionError::FrameEncodeFailure { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected a frame failure, got {other:?}"),
    }
    assert!(!output_path.exists());
    assert!(session.state().is_idle());
}
