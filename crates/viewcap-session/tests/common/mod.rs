//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use viewcap_render::{CanvasView, Rgba, RgbaImage, RenderError, RenderResult};
use viewcap_session::{CompletionHandle, JobResult, Size, View};

/// Longest a test waits for a job.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(60);

pub fn wait(handle: CompletionHandle) -> JobResult {
    match handle.wait_timeout(JOB_TIMEOUT) {
        Ok(result) => result,
        Err(_) => panic!("job did not finish within {JOB_TIMEOUT:?}"),
    }
}

pub fn gradient(size: Size, shade: u8) -> RgbaImage {
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        Rgba([
            shade,
            (x * 255 / size.width.max(1)) as u8,
            (y * 255 / size.height.max(1)) as u8,
            255,
        ])
    })
}

pub fn canvas(size: Size) -> CanvasView {
    CanvasView::from_image(gradient(size, 0))
}

/// A view that renders successfully `ok_renders` times, then fails.
pub struct FlakyView {
    size: Size,
    ok_renders: u64,
    renders: AtomicU64,
}

impl FlakyView {
    pub fn new(size: Size, ok_renders: u64) -> Arc<Self> {
        Arc::new(Self {
            size,
            ok_renders,
            renders: AtomicU64::new(0),
        })
    }
}

impl View for FlakyView {
    fn natural_size(&self) -> Size {
        self.size
    }

    fn render(&self, size: Size) -> RenderResult<RgbaImage> {
        let n = self.renders.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_renders {
            return Err(RenderError::RenderFailed("surface lost".to_string()));
        }
        Ok(gradient(size, n as u8))
    }
}

/// A view whose render panics after `ok_renders` successful renders.
pub struct PanickingView {
    size: Size,
    ok_renders: u64,
    renders: AtomicU64,
}

impl PanickingView {
    pub fn new(size: Size, ok_renders: u64) -> Arc<Self> {
        Arc::new(Self {
            size,
            ok_renders,
            renders: AtomicU64::new(0),
        })
    }
}

impl View for PanickingView {
    fn natural_size(&self) -> Size {
        self.size
    }

    fn render(&self, size: Size) -> RenderResult<RgbaImage> {
        let n = self.renders.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_renders {
            panic!("view torn down during render");
        }
        Ok(gradient(size, n as u8))
    }
}

/// What the tests need to know about a written MP4.
#[derive(Debug)]
pub struct Mp4Summary {
    pub brand: [u8; 4],
    pub sample_count: u32,
    pub duration_secs: f64,
}

/// Walk the box tree of an MP4 file for `ftyp`, `mvhd` and `stsz`.
pub fn read_mp4(path: &Path) -> Mp4Summary {
    let data = std::fs::read(path).unwrap();

    let ftyp = find_box(&data, &[b"ftyp"]).expect("missing ftyp");
    let mut brand = [0u8; 4];
    brand.copy_from_slice(&ftyp[..4]);

    let mvhd = find_box(&data, &[b"moov", b"mvhd"]).expect("missing mvhd");
    let (timescale, duration) = match mvhd[0] {
        1 => (be_u32(&mvhd[20..]) as u64, be_u64(&mvhd[24..])),
        _ => (be_u32(&mvhd[12..]) as u64, be_u32(&mvhd[16..]) as u64),
    };
    assert!(timescale > 0, "mvhd timescale is zero");

    let stsz = find_box(
        &data,
        &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stsz"],
    )
    .expect("missing stsz");
    let sample_count = be_u32(&stsz[8..]);

    Mp4Summary {
        brand,
        sample_count,
        duration_secs: duration as f64 / timescale as f64,
    }
}

/// Payload of the first box matching `path`, descending one level per entry.
fn find_box<'a>(mut data: &'a [u8], path: &[&[u8; 4]]) -> Option<&'a [u8]> {
    for (depth, kind) in path.iter().enumerate() {
        let body = boxes(data).find(|(k, _)| k == *kind)?.1;
        if depth + 1 == path.len() {
            return Some(body);
        }
        data = body;
    }
    None
}

fn boxes(data: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> + '_ {
    let mut offset = 0usize;
    std::iter::from_fn(move || {
        if offset + 8 > data.len() {
            return None;
        }
        let mut size = be_u32(&data[offset..]) as usize;
        let mut kind = [0u8; 4];
        kind.copy_from_slice(&data[offset + 4..offset + 8]);
        let mut header = 8;

        if size == 1 {
            size = be_u64(&data[offset + 8..]) as usize;
            header = 16;
        } else if size == 0 {
            size = data.len() - offset;
        }
        if size < header || offset + size > data.len() {
            return None;
        }

        let body = &data[offset + header..offset + size];
        offset += size;
        Some((kind, body))
    })
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[..8]);
    u64::from_be_bytes(buf)
}

/// Assert that `summary` holds `frames` samples lasting about `frames / fps`.
pub fn assert_video(summary: &Mp4Summary, frames: u64, fps: f64) {
    assert_eq!(summary.sample_count as u64, frames, "sample count");

    let expected = frames as f64 / fps;
    let tolerance = 1.0 / fps + 1e-3;
    assert!(
        (summary.duration_secs - expected).abs() <= tolerance,
        "duration {} not within one frame of {}",
        summary.duration_secs,
        expected
    );
}
