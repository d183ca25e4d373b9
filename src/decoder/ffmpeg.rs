use super::{DecodeError, DecodedFrame, DecoderBackend};
use ac_ffmpeg::codec::Decoder;
use ac_ffmpeg::codec::video::VideoDecoder;
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase, Timestamp};

/// H.264 video decoder using FFmpeg.
///
/// Owns the native codec context for its whole lifetime; dropping it releases every
/// decoder-owned buffer.
pub struct FfmpegBackend {
    decoder: VideoDecoder,
    packet_count: i64,
}

impl FfmpegBackend {
    /// Open a new H.264 decoder.
    pub fn open() -> Result<Self, DecodeError> {
        log::info!("Initializing H.264 decoder...");
        let decoder = VideoDecoder::builder("h264")
            .map_err(DecodeError::Open)?
            .time_base(TimeBase::new(1, 90_000))
            .build()
            .map_err(DecodeError::Open)?;
        log::info!("Initialized H.264 decoder");

        Ok(Self {
            decoder,
            packet_count: 0,
        })
    }

    #[inline]
    fn next_pts(&mut self) -> Timestamp {
        self.packet_count += 1;
        Timestamp::new(self.packet_count, TimeBase::new(1, 90_000))
    }
}

impl DecoderBackend for FfmpegBackend {
    fn push(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let pts = self.next_pts();
        let packet = PacketMut::from(data).with_pts(pts).freeze();

        self.decoder.push(packet).map_err(|e| {
            log::error!("Decoder: failed to push packet {}: {}", self.packet_count, e);
            DecodeError::Push(e)
        })
    }

    fn take(&mut self) -> Result<Option<DecodedFrame>, DecodeError> {
        self.decoder.take().map_err(DecodeError::Receive)
    }
}

impl Drop for FfmpegBackend {
    fn drop(&mut self) {
        log::debug!(
            "Releasing H.264 decoder after {} packets",
            self.packet_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_drain_without_input() {
        let mut backend = FfmpegBackend::open().unwrap();

        // Nothing pushed yet: the decoder asks for more input, which is not an error
        assert!(matches!(backend.take(), Ok(None)));
    }
}
