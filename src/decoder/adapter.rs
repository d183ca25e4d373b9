use super::{DecodeError, DecodedFrame, DecoderBackend};
use crate::protocol::MediaKind;
use std::iter::FusedIterator;

/// Frame decoder adapter
///
/// Owns the decoder state for a whole session. Each [`submit`](Self::submit) pushes one
/// payload and returns a [`Drain`] that pulls every frame the decoder has ready. A single
/// submission may yield zero, one or several frames, and frames may surface several
/// submissions after their bytes went in.
pub struct FrameDecoder<B: DecoderBackend> {
    backend: B,
    submissions: u64,
    frames_decoded: u64,
    audio_dropped: u64,
    unknown_skipped: u64,
}

impl<B: DecoderBackend> FrameDecoder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            submissions: 0,
            frames_decoded: 0,
            audio_dropped: 0,
            unknown_skipped: 0,
        }
    }

    /// Submit one media payload.
    ///
    /// Only IDR and P-slice payloads reach the backend. Audio is accepted and dropped;
    /// unknown kinds are logged and skipped. Both yield an empty drain.
    pub fn submit(&mut self, frame: &[u8], kind: MediaKind) -> Result<Drain<'_, B>, DecodeError> {
        if !kind.is_video() {
            if let MediaKind::Unknown(value) = kind {
                log::warn!("Unknown media pack type {}, skipping", value);
                self.unknown_skipped += 1;
            } else {
                self.audio_dropped += 1;
            }
            return Ok(Drain::empty());
        }

        // An empty packet means "flush" to FFmpeg; never send one mid-stream.
        if frame.is_empty() {
            log::debug!("Empty {} payload, nothing to decode", kind);
            return Ok(Drain::empty());
        }

        self.backend.push(frame)?;
        self.submissions += 1;

        Ok(Drain {
            decoder: Some(self),
        })
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn audio_dropped(&self) -> u64 {
        self.audio_dropped
    }

    pub fn unknown_skipped(&self) -> u64 {
        self.unknown_skipped
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }
}

/// Frames ready after one submission.
///
/// Ends when the decoder needs more input or reached end of stream. An error is
/// yielded once and ends the drain. The drain borrows the decoder mutably, so no
/// further submission can happen while it is alive.
pub struct Drain<'a, B: DecoderBackend> {
    decoder: Option<&'a mut FrameDecoder<B>>,
}

impl<B: DecoderBackend> Drain<'_, B> {
    fn empty() -> Self {
        Self { decoder: None }
    }
}

impl<B: DecoderBackend> Iterator for Drain<'_, B> {
    type Item = Result<DecodedFrame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let decoder = self.decoder.as_deref_mut()?;

        match decoder.backend.take() {
            Ok(Some(frame)) => {
                decoder.frames_decoded += 1;
                log::debug!(
                    "Frame decoded w: {} h: {}",
                    frame.width(),
                    frame.height()
                );
                Some(Ok(frame))
            }
            Ok(None) => {
                self.decoder = None;
                None
            }
            Err(e) => {
                log::error!("Error decoding frame: {}", e);
                self.decoder = None;
                Some(Err(e))
            }
        }
    }
}

impl<B: DecoderBackend> FusedIterator for Drain<'_, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testing::ScriptedBackend;

    #[test]
    fn test_idr_drain_ends_with_need_more_input() {
        let mut decoder = FrameDecoder::new(ScriptedBackend::new([1]));

        let frames: Vec<_> = decoder.submit(&[0, 0, 0, 1, 0x65], MediaKind::Idr).unwrap().collect();

        assert_eq!(frames.len(), 1);
        assert!(frames.iter().all(|f| f.is_ok()));
        assert_eq!(decoder.frames_decoded(), 1);
        assert_eq!(decoder.submissions(), 1);
    }

    #[test]
    fn test_zero_or_many_frames_per_submission() {
        // Lookahead: nothing on the first two pushes, three frames on the third
        let mut decoder = FrameDecoder::new(ScriptedBackend::new([0, 0, 3]));

        assert_eq!(decoder.submit(&[1], MediaKind::Idr).unwrap().count(), 0);
        assert_eq!(decoder.submit(&[2], MediaKind::PSlice).unwrap().count(), 0);
        assert_eq!(decoder.submit(&[3], MediaKind::PSlice).unwrap().count(), 3);

        assert_eq!(decoder.frames_decoded(), 3);
        assert_eq!(*decoder.backend().pushes.borrow(), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_audio_reaches_adapter_but_not_decoder() {
        let mut decoder = FrameDecoder::new(ScriptedBackend::new([5]));

        let mut drain = decoder.submit(&[0xAB; 8], MediaKind::Audio).unwrap();
        assert!(drain.next().is_none());

        assert!(decoder.backend().pushes.borrow().is_empty());
        assert_eq!(decoder.audio_dropped(), 1);
        assert_eq!(decoder.frames_decoded(), 0);
    }

    #[test]
    fn test_unknown_kind_skipped() {
        let mut decoder = FrameDecoder::new(ScriptedBackend::new([1]));

        assert_eq!(decoder.submit(&[1], MediaKind::Unknown(7)).unwrap().count(), 0);
        assert!(decoder.backend().pushes.borrow().is_empty());
        assert_eq!(decoder.unknown_skipped(), 1);
    }

    #[test]
    fn test_empty_payload_never_pushed() {
        let mut decoder = FrameDecoder::new(ScriptedBackend::new([1]));

        assert_eq!(decoder.submit(&[], MediaKind::Idr).unwrap().count(), 0);
        assert!(decoder.backend().pushes.borrow().is_empty());
    }

    #[test]
    fn test_push_error_propagates() {
        let mut backend = ScriptedBackend::new([1]);
        backend.fail_push = true;
        let mut decoder = FrameDecoder::new(backend);

        assert!(matches!(
            decoder.submit(&[1], MediaKind::Idr),
            Err(DecodeError::Backend(_))
        ));
        assert_eq!(decoder.submissions(), 0);
    }

    #[test]
    fn test_drain_error_yielded_once() {
        let mut backend = ScriptedBackend::new([3]);
        backend.fail_take_after = Some(1);
        let mut decoder = FrameDecoder::new(backend);

        let mut drain = decoder.submit(&[1], MediaKind::Idr).unwrap();
        assert!(matches!(drain.next(), Some(Ok(_))));
        assert!(matches!(drain.next(), Some(Err(DecodeError::Backend(_)))));
        assert!(drain.next().is_none());
        assert!(drain.next().is_none());
    }
}
