use super::{
    ControlSignal, ENVELOPE_HEADER_SIZE, MEDIA_HEADER_SIZE, MediaKind, MediaPayload,
    PACK_TYPE_SERVER_FULL, Packet,
};
use bytes::Buf;
use thiserror::Error;

/// Malformed or inconsistent length fields. The frame bytes are never looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("packet too short: {received} bytes, need at least {needed}")]
    Truncated { received: usize, needed: usize },

    #[error("envelope declares {declared} bytes but only {available} were received")]
    EnvelopeOverrun { declared: u32, available: usize },

    #[error("media payload declares {declared} bytes but the envelope holds only {available}")]
    PayloadOverrun { declared: u32, available: usize },
}

/// Parse one received packet.
///
/// `buf` must be exactly the bytes the transport reported as received.
/// Reads never go past `buf.len()`: every fixed-width field is bounds checked first.
pub fn extract(buf: &[u8]) -> Result<Packet<'_>, FramingError> {
    let mut cursor = buf;

    if cursor.remaining() < 1 {
        return Err(FramingError::Truncated {
            received: buf.len(),
            needed: 1,
        });
    }
    let pack_type = cursor.get_u8();

    // The control packet carries nothing else worth parsing.
    if pack_type == PACK_TYPE_SERVER_FULL {
        return Ok(Packet::Control(ControlSignal::ServerFull));
    }

    if cursor.remaining() < ENVELOPE_HEADER_SIZE - 1 {
        return Err(FramingError::Truncated {
            received: buf.len(),
            needed: ENVELOPE_HEADER_SIZE,
        });
    }
    let declared = cursor.get_u32();
    let available = buf.len() - ENVELOPE_HEADER_SIZE;
    if declared as u64 > available as u64 {
        return Err(FramingError::EnvelopeOverrun {
            declared,
            available,
        });
    }
    let envelope_len = declared as usize;
    let mut payload = &cursor[..envelope_len];

    if payload.remaining() < MEDIA_HEADER_SIZE {
        return Err(FramingError::Truncated {
            received: buf.len(),
            needed: ENVELOPE_HEADER_SIZE + MEDIA_HEADER_SIZE,
        });
    }
    let inner_declared = payload.get_u32();
    let channel_id = payload.get_u8();
    let kind = MediaKind::from_wire(payload.get_u8());

    if inner_declared as u64 + MEDIA_HEADER_SIZE as u64 > envelope_len as u64 {
        return Err(FramingError::PayloadOverrun {
            declared: inner_declared,
            available: envelope_len - MEDIA_HEADER_SIZE,
        });
    }

    let offset = ENVELOPE_HEADER_SIZE + MEDIA_HEADER_SIZE;
    let frame = &buf[offset..offset + inner_declared as usize];

    log::debug!(
        "Media packet chl: {} type: {} len: {}",
        channel_id,
        kind,
        frame.len()
    );

    Ok(Packet::Media(MediaPayload {
        channel_id,
        kind,
        offset,
        frame,
    }))
}

#[cfg(test)]
pub(crate) fn encode_media(pack_type: u8, channel_id: u8, kind: u8, frame: &[u8]) -> Vec<u8> {
    let inner_len = frame.len() as u32;
    let outer_len = inner_len + MEDIA_HEADER_SIZE as u32;
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + outer_len as usize);
    out.push(pack_type);
    out.extend_from_slice(&outer_len.to_be_bytes());
    out.extend_from_slice(&inner_len.to_be_bytes());
    out.push(channel_id);
    out.push(kind);
    out.extend_from_slice(frame);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_media_payload() {
        let packet = encode_media(0x01, 3, 0, &[0, 0, 0, 1, 0x65, 0xAA]);

        let Ok(Packet::Media(media)) = extract(&packet) else {
            panic!("expected media packet");
        };
        assert_eq!(media.channel_id, 3);
        assert_eq!(media.kind, MediaKind::Idr);
        assert_eq!(media.frame, &[0, 0, 0, 1, 0x65, 0xAA]);
        assert_eq!(media.offset, 11);
        assert_eq!(&packet[media.offset..media.offset + media.frame.len()], media.frame);
    }

    #[test]
    fn test_frame_bytes_limited_to_inner_length() {
        // Envelope carries trailing padding past the inner payload
        let mut packet = encode_media(0x01, 0, 1, &[9, 9, 9]);
        packet.extend_from_slice(&[0xEE; 4]);
        let outer_len = (3 + MEDIA_HEADER_SIZE + 4) as u32;
        packet[1..5].copy_from_slice(&outer_len.to_be_bytes());

        let Ok(Packet::Media(media)) = extract(&packet) else {
            panic!("expected media packet");
        };
        assert_eq!(media.kind, MediaKind::PSlice);
        assert_eq!(media.frame, &[9, 9, 9]);
    }

    #[test]
    fn test_server_full_short_circuits() {
        // No length field at all: still a control signal, not a framing error
        assert_eq!(
            extract(&[PACK_TYPE_SERVER_FULL]),
            Ok(Packet::Control(ControlSignal::ServerFull))
        );

        let mut packet = vec![PACK_TYPE_SERVER_FULL];
        packet.extend_from_slice(&u32::MAX.to_be_bytes());
        assert_eq!(
            extract(&packet),
            Ok(Packet::Control(ControlSignal::ServerFull))
        );
    }

    #[test]
    fn test_outer_length_overrun() {
        let mut packet = vec![0u8; 16];
        packet[0] = 0x01;
        packet[1..5].copy_from_slice(&0xFFFF_FFFFu32.to_be_bytes());

        assert_eq!(
            extract(&packet),
            Err(FramingError::EnvelopeOverrun {
                declared: 0xFFFF_FFFF,
                available: 11,
            })
        );
    }

    #[test]
    fn test_outer_length_one_past_received() {
        let mut packet = encode_media(0x01, 0, 0, &[1, 2, 3, 4]);
        let declared = (packet.len() - ENVELOPE_HEADER_SIZE + 1) as u32;
        packet[1..5].copy_from_slice(&declared.to_be_bytes());

        assert!(matches!(
            extract(&packet),
            Err(FramingError::EnvelopeOverrun { .. })
        ));
    }

    #[test]
    fn test_inner_length_overrun() {
        let mut packet = encode_media(0x01, 0, 0, &[1, 2, 3, 4]);
        // Inner length one byte larger than the envelope allows
        packet[5..9].copy_from_slice(&5u32.to_be_bytes());

        assert_eq!(
            extract(&packet),
            Err(FramingError::PayloadOverrun {
                declared: 5,
                available: 4,
            })
        );

        packet[5..9].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            extract(&packet),
            Err(FramingError::PayloadOverrun { .. })
        ));
    }

    #[test]
    fn test_truncated_headers() {
        assert!(matches!(extract(&[]), Err(FramingError::Truncated { .. })));
        assert!(matches!(
            extract(&[0x01, 0, 0]),
            Err(FramingError::Truncated { .. })
        ));

        // Envelope is consistent but too small to hold the media header
        let packet = [0x01, 0, 0, 0, 3, 0, 0, 0];
        assert!(matches!(
            extract(&packet),
            Err(FramingError::Truncated { .. })
        ));
    }

    #[test]
    fn test_every_declared_length_checked_against_received() {
        let packet = encode_media(0x01, 0, 0, &[7; 32]);
        for cut in 0..packet.len() {
            let truncated = &packet[..cut];
            assert!(
                extract(truncated).is_err(),
                "truncation at {} must be rejected",
                cut
            );
        }
        assert!(extract(&packet).is_ok());
    }

    #[test]
    fn test_unknown_kind_is_not_a_framing_error() {
        let packet = encode_media(0x01, 1, 9, &[1]);
        let Ok(Packet::Media(media)) = extract(&packet) else {
            panic!("expected media packet");
        };
        assert_eq!(media.kind, MediaKind::Unknown(9));
        assert!(!media.kind.is_video());
    }
}
