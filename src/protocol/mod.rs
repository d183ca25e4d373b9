//! Wire protocol for the media session
//!
//! Every packet delivered by the transport is wrapped in an outer envelope:
//!
//! ```text
//! +----------+----------------+---------------------------+
//! | packType | length (u32BE) | payload (length bytes)    |
//! +----------+----------------+---------------------------+
//! ```
//!
//! Media packets nest a second length-prefixed header inside the payload:
//!
//! ```text
//! +---------------------+-----------+-----------+-------------------------+
//! | innerLength (u32BE) | channelId | mediaKind | frameBytes (innerLength) |
//! +---------------------+-----------+-----------+-------------------------+
//! ```

mod framer;

pub use framer::{FramingError, extract};

#[cfg(test)]
pub(crate) use framer::encode_media;

/// Size of `packType` + `length`.
pub const ENVELOPE_HEADER_SIZE: usize = 5;

/// Size of `innerLength` + `channelId` + `mediaKind`.
pub const MEDIA_HEADER_SIZE: usize = 6;

/// `packType` sent by the server when it cannot accept another viewer.
pub const PACK_TYPE_SERVER_FULL: u8 = 0x08;

/// Kind of media carried by a media packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Key frame (instantaneous decoder refresh)
    Idr,
    /// Predicted slice
    PSlice,
    /// Audio samples (not decoded here)
    Audio,
    /// Any value outside the known range
    Unknown(u8),
}

impl MediaKind {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => MediaKind::Idr,
            1 => MediaKind::PSlice,
            2 => MediaKind::Audio,
            other => MediaKind::Unknown(other),
        }
    }

    /// Whether payloads of this kind go to the video decoder.
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Idr | MediaKind::PSlice)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Idr => write!(f, "IDR"),
            MediaKind::PSlice => write!(f, "P-slice"),
            MediaKind::Audio => write!(f, "Audio"),
            MediaKind::Unknown(v) => write!(f, "Unknown({})", v),
        }
    }
}

/// Out-of-band server state carried in place of media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The media server is at capacity
    ServerFull,
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlSignal::ServerFull => write!(f, "media server is full"),
        }
    }
}

/// Borrowed view over the media part of a packet.
///
/// `frame` points into the buffer handed to [`extract`]; nothing is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaPayload<'a> {
    pub channel_id: u8,
    pub kind: MediaKind,
    /// Offset of the first frame byte inside the original buffer
    pub offset: usize,
    pub frame: &'a [u8],
}

/// Outcome of framing one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    Control(ControlSignal),
    Media(MediaPayload<'a>),
}
