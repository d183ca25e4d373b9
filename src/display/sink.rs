//! Presentation sinks
//!
//! A sink receives every converted frame in decode order. Returning
//! [`ControlFlow::Break`] asks the session to stop after the current packet.

use super::ConvertedFrame;
use crate::config::OutputLayout;
use image::{ImageFormat, RgbImage};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Instant;

pub trait PresentationSink {
    /// Present one frame. The pixel data is only valid for the duration of the call.
    fn present(&mut self, frame: &ConvertedFrame<'_>) -> ControlFlow<()>;
}

/// Counts presented frames, logs throughput and optionally stops after a frame limit.
pub struct StatsSink {
    frames: u64,
    limit: Option<u64>,
    log_every: u64,
    started_at: Option<Instant>,
    last_size: (usize, usize),
}

impl StatsSink {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            frames: 0,
            limit,
            log_every: 300,
            started_at: None,
            last_size: (0, 0),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl PresentationSink for StatsSink {
    fn present(&mut self, frame: &ConvertedFrame<'_>) -> ControlFlow<()> {
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        self.frames += 1;

        if self.last_size != (frame.width, frame.height) {
            log::info!("Presenting {}x{} {}", frame.width, frame.height, frame.layout);
            self.last_size = (frame.width, frame.height);
        }

        if self.frames.is_multiple_of(self.log_every) {
            let secs = started_at.elapsed().as_secs_f64();
            if secs > 0.0 {
                log::info!(
                    "Presented {} frames ({:.1} fps)",
                    self.frames,
                    self.frames as f64 / secs
                );
            }
        }

        match self.limit {
            Some(limit) if self.frames >= limit => {
                log::info!("Frame limit {} reached", limit);
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Writes every Nth frame as a binary PPM image, then forwards the frame to the inner sink.
pub struct SnapshotSink<S> {
    inner: S,
    dir: PathBuf,
    every: u64,
    seen: u64,
    written: u64,
}

impl<S: PresentationSink> SnapshotSink<S> {
    pub fn new(inner: S, dir: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            inner,
            dir: dir.into(),
            every: every.max(1),
            seen: 0,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn write_snapshot(&self, frame: &ConvertedFrame<'_>) -> std::io::Result<PathBuf> {
        let path = self.dir.join(format!("frame_{:06}.ppm", self.seen));
        let image = to_rgb_image(frame).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame {}x{} does not fit its pixel buffer", frame.width, frame.height),
            )
        })?;

        image
            .save_with_format(&path, ImageFormat::Pnm)
            .map_err(std::io::Error::other)?;
        Ok(path)
    }
}

/// Copy a packed frame into an RGB image, dropping row padding and swapping BGR.
fn to_rgb_image(frame: &ConvertedFrame<'_>) -> Option<RgbImage> {
    let row_bytes = frame.width * 3;
    if frame.stride == 0 || frame.stride < row_bytes {
        return None;
    }

    let mut packed = Vec::with_capacity(row_bytes * frame.height);
    for row in frame.pixels.chunks(frame.stride).take(frame.height) {
        packed.extend_from_slice(row.get(..row_bytes)?);
    }

    let width = u32::try_from(frame.width).ok()?;
    let height = u32::try_from(frame.height).ok()?;
    let mut image = RgbImage::from_raw(width, height, packed)?;
    if frame.layout == OutputLayout::Bgr24 {
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
    }
    Some(image)
}

impl<S: PresentationSink> PresentationSink for SnapshotSink<S> {
    fn present(&mut self, frame: &ConvertedFrame<'_>) -> ControlFlow<()> {
        if self.seen.is_multiple_of(self.every) {
            match self.write_snapshot(frame) {
                Ok(path) => {
                    self.written += 1;
                    log::debug!("Snapshot written to {}", path.display());
                }
                Err(e) => log::warn!("Failed to write snapshot: {}", e),
            }
        }
        self.seen += 1;
        self.inner.present(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pixels: &[u8], width: usize, height: usize, layout: OutputLayout) -> ConvertedFrame<'_> {
        ConvertedFrame {
            pixels,
            width,
            height,
            stride: width * 3,
            layout,
        }
    }

    #[test]
    fn test_stats_sink_frame_limit() {
        let pixels = [0u8; 2 * 2 * 3];
        let mut sink = StatsSink::new(Some(2));

        assert_eq!(
            sink.present(&frame(&pixels, 2, 2, OutputLayout::Bgr24)),
            ControlFlow::Continue(())
        );
        assert_eq!(
            sink.present(&frame(&pixels, 2, 2, OutputLayout::Bgr24)),
            ControlFlow::Break(())
        );
        assert_eq!(sink.frames(), 2);
    }

    #[test]
    fn test_snapshot_sink_writes_rgb_ppm() {
        let dir = std::env::temp_dir().join(format!("mediarecv-snap-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        // One blue pixel, one red pixel in BGR order
        let pixels = [255u8, 0, 0, 0, 0, 255];
        let mut sink = SnapshotSink::new(StatsSink::new(None), &dir, 2);

        for _ in 0..3 {
            let _ = sink.present(&frame(&pixels, 2, 1, OutputLayout::Bgr24));
        }

        assert_eq!(sink.written(), 2);
        assert_eq!(sink.into_inner().frames(), 3);

        let written = std::fs::read(dir.join("frame_000000.ppm")).unwrap();
        assert!(written.starts_with(b"P6"));
        let decoded = image::load_from_memory_with_format(&written, ImageFormat::Pnm)
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(0, 0), &image::Rgb([0, 0, 255]));
        assert_eq!(decoded.get_pixel(1, 0), &image::Rgb([255, 0, 0]));
        assert!(dir.join("frame_000002.ppm").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_padded_rows_are_stripped() {
        // Two RGB pixels per row followed by two bytes of padding
        let pixels = [1u8, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        let padded = ConvertedFrame {
            pixels: &pixels,
            width: 2,
            height: 2,
            stride: 8,
            layout: OutputLayout::Rgb24,
        };

        let converted = to_rgb_image(&padded).unwrap();
        assert_eq!(converted.as_raw(), &vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let pixels = [0u8; 5];
        assert!(to_rgb_image(&frame(&pixels, 2, 1, OutputLayout::Rgb24)).is_none());
    }
}
