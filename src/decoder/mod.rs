//! Video decoding module
//!
//! Provides the H.264 decoder seam, its FFmpeg implementation and the adapter
//! the session feeds media payloads into.

mod adapter;
mod ffmpeg;

pub use adapter::{Drain, FrameDecoder};
pub use ffmpeg::FfmpegBackend;

use thiserror::Error;

/// Decoded picture as produced by the decoder. Pixel format and size are the decoder's choice.
pub use ac_ffmpeg::codec::video::VideoFrame as DecodedFrame;

/// Errors reported by a decoder backend. All of them end the session.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open H.264 decoder: {0}")]
    Open(#[source] ac_ffmpeg::Error),

    #[error("decoder rejected packet: {0}")]
    Push(#[source] ac_ffmpeg::Error),

    #[error("error decoding frame: {0}")]
    Receive(#[source] ac_ffmpeg::Error),

    #[error("decoder failure: {0}")]
    Backend(String),
}

/// Stateful compressed-video decoder.
///
/// `take` returns `Ok(None)` both when the decoder needs more input and when it
/// reached end of stream; neither is an error.
pub trait DecoderBackend {
    /// Push one chunk of compressed bytes.
    fn push(&mut self, data: &[u8]) -> Result<(), DecodeError>;

    /// Take the next decoded frame, if one is ready.
    fn take(&mut self) -> Result<Option<DecodedFrame>, DecodeError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{DecodeError, DecodedFrame, DecoderBackend};
    use ac_ffmpeg::codec::video::{self, VideoFrameMut};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    pub(crate) fn black_frame(width: usize, height: usize) -> DecodedFrame {
        VideoFrameMut::black(video::frame::get_pixel_format("yuv420p"), width, height).freeze()
    }

    /// Backend that emits a scripted number of frames per push.
    ///
    /// Frames are queued and handed out by `take`, so output can lag input. Pushed
    /// payloads are shared so they stay observable after the backend is dropped.
    pub(crate) struct ScriptedBackend {
        pub script: VecDeque<usize>,
        pub pending: usize,
        pub pushes: Rc<RefCell<Vec<Vec<u8>>>>,
        pub fail_take_after: Option<usize>,
        pub fail_push: bool,
        pub width: usize,
        pub height: usize,
        /// Added to the width of each successive frame so output order is observable
        pub width_step: usize,
        taken: usize,
    }

    impl ScriptedBackend {
        pub(crate) fn new(script: impl IntoIterator<Item = usize>) -> Self {
            Self {
                script: script.into_iter().collect(),
                pending: 0,
                pushes: Rc::default(),
                fail_take_after: None,
                fail_push: false,
                width: 64,
                height: 48,
                width_step: 0,
                taken: 0,
            }
        }
    }

    impl DecoderBackend for ScriptedBackend {
        fn push(&mut self, data: &[u8]) -> Result<(), DecodeError> {
            if self.fail_push {
                return Err(DecodeError::Backend("invalid bitstream".into()));
            }
            self.pushes.borrow_mut().push(data.to_vec());
            self.pending += self.script.pop_front().unwrap_or(0);
            Ok(())
        }

        fn take(&mut self) -> Result<Option<DecodedFrame>, DecodeError> {
            if self.fail_take_after == Some(self.taken) {
                return Err(DecodeError::Backend("corrupt slice".into()));
            }
            if self.pending == 0 {
                return Ok(None);
            }
            let width = self.width + self.taken * self.width_step;
            self.pending -= 1;
            self.taken += 1;
            Ok(Some(black_frame(width, self.height)))
        }
    }
}
