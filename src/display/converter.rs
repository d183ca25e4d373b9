//! Pixel format conversion
//!
//! Turns decoded frames (whatever planar layout the decoder picked) into a packed
//! 3-channel image ready for presentation.

use crate::config::{OutputFormat, OutputLayout};
use crate::decoder::DecodedFrame;
use ac_ffmpeg::codec::video::frame::PixelFormat;
use ac_ffmpeg::codec::video::scaler::{Algorithm, VideoFrameScaler};
use thiserror::Error;

/// Bytes per pixel of every supported output layout.
const CHANNELS: usize = 3;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid frame dimensions {width}x{height}")]
    Dimensions { width: usize, height: usize },

    #[error("failed to allocate scaler context: {0}")]
    Context(#[source] ac_ffmpeg::Error),

    #[error("failed to allocate {bytes} byte output buffer")]
    Buffer { bytes: usize },

    #[error("failed to scale frame: {0}")]
    Scale(#[source] ac_ffmpeg::Error),

    #[error("scaled plane too short: {len} bytes for {rows} rows of {row_bytes}")]
    ShortPlane {
        len: usize,
        rows: usize,
        row_bytes: usize,
    },
}

/// Source properties a context was built for.
#[derive(Clone, Copy, PartialEq, Eq)]
struct ContextKey {
    format: PixelFormat,
    width: usize,
    height: usize,
}

impl ContextKey {
    fn of(frame: &DecodedFrame) -> Self {
        Self {
            format: frame.pixel_format(),
            width: frame.width(),
            height: frame.height(),
        }
    }
}

/// Scaler plus the packed output buffer for one (format, width, height) triple.
///
/// Built in one step: either every part exists or nothing does.
///
/// `VideoFrameScaler::scale` hands back a newly allocated frame, so every transform
/// still costs one output-sized allocation and a copy into `scratch`. Only the scaler
/// context and the scratch buffer survive between frames.
pub struct ConversionContext {
    key: ContextKey,
    scaler: VideoFrameScaler,
    width: usize,
    height: usize,
    scratch: Vec<u8>,
}

impl ConversionContext {
    fn build(key: ContextKey, output: OutputFormat) -> Result<Self, ConversionError> {
        let (width, height) = output.target_size(key.width, key.height);
        if key.width == 0 || key.height == 0 || width == 0 || height == 0 {
            return Err(ConversionError::Dimensions {
                width: key.width,
                height: key.height,
            });
        }

        let bytes = width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(CHANNELS))
            .ok_or(ConversionError::Dimensions { width, height })?;

        let scaler = VideoFrameScaler::builder()
            .source_pixel_format(key.format)
            .source_width(key.width)
            .source_height(key.height)
            .target_pixel_format(output.layout.pixel_format())
            .target_width(width)
            .target_height(height)
            .algorithm(Algorithm::Bicubic)
            .build()
            .map_err(ConversionError::Context)?;

        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(bytes)
            .map_err(|_| ConversionError::Buffer { bytes })?;
        scratch.resize(bytes, 0);

        Ok(Self {
            key,
            scaler,
            width,
            height,
            scratch,
        })
    }

    fn transform(&mut self, frame: &DecodedFrame) -> Result<(), ConversionError> {
        let scaled = self.scaler.scale(frame).map_err(ConversionError::Scale)?;
        let planes = scaled.planes();
        let data = planes[0].data();
        let stride = planes[0].line_size();
        let row_bytes = self.width * CHANNELS;

        // Fast path: no line padding
        if stride == row_bytes && data.len() >= self.scratch.len() {
            let len = self.scratch.len();
            self.scratch.copy_from_slice(&data[..len]);
            return Ok(());
        }

        for (row, dst) in self.scratch.chunks_exact_mut(row_bytes).enumerate() {
            let start = row * stride;
            let src = data
                .get(start..start + row_bytes)
                .ok_or(ConversionError::ShortPlane {
                    len: data.len(),
                    rows: self.height,
                    row_bytes,
                })?;
            dst.copy_from_slice(src);
        }
        Ok(())
    }
}

/// Packed output image borrowed from the converter's scratch buffer.
///
/// Valid until the next [`PixelConverter::convert`] call; copy it to keep it.
#[derive(Debug, Clone, Copy)]
pub struct ConvertedFrame<'a> {
    pub pixels: &'a [u8],
    pub width: usize,
    pub height: usize,
    /// Bytes per row
    pub stride: usize,
    pub layout: OutputLayout,
}

/// Lazily builds and reuses a [`ConversionContext`].
///
/// A context is created on the first frame and rebuilt whenever the source pixel format
/// or dimensions change. Frames with unchanged properties only rerun the transform.
pub struct PixelConverter {
    output: OutputFormat,
    context: Option<ConversionContext>,
    allocations: u64,
}

impl PixelConverter {
    pub fn new(output: OutputFormat) -> Self {
        Self {
            output,
            context: None,
            allocations: 0,
        }
    }

    pub fn convert(&mut self, frame: &DecodedFrame) -> Result<ConvertedFrame<'_>, ConversionError> {
        let layout = self.output.layout;
        let context = self.context_for(ContextKey::of(frame))?;
        context.transform(frame)?;

        Ok(ConvertedFrame {
            pixels: &context.scratch,
            width: context.width,
            height: context.height,
            stride: context.width * CHANNELS,
            layout,
        })
    }

    /// Reuse the current context when it matches `key`, otherwise replace it.
    ///
    /// The old context is dropped before the new one is built, so a failed build
    /// leaves the converter without any context.
    fn context_for(&mut self, key: ContextKey) -> Result<&mut ConversionContext, ConversionError> {
        match &mut self.context {
            Some(context) if context.key == key => Ok(context),
            slot => {
                if let Some(old) = slot.take() {
                    log::info!(
                        "Stream changed from {} {}x{} to {} {}x{}, rebuilding conversion context",
                        old.key.format.name(),
                        old.key.width,
                        old.key.height,
                        key.format.name(),
                        key.width,
                        key.height
                    );
                }
                let context = ConversionContext::build(key, self.output).map_err(|e| {
                    log::error!("Failed to allocate conversion resource: {}", e);
                    e
                })?;
                self.allocations += 1;
                log::info!(
                    "Conversion context {} {}x{} -> {} {}x{}",
                    key.format.name(),
                    key.width,
                    key.height,
                    self.output.layout,
                    context.width,
                    context.height
                );
                Ok(slot.insert(context))
            }
        }
    }

    /// Number of contexts built so far.
    pub fn context_allocations(&self) -> u64 {
        self.allocations
    }

    #[cfg(test)]
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }
}
