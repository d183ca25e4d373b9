//! Media session loop
//!
//! Pulls packets from the transport and pushes them through
//! framer → decoder → converter → presentation sink, one packet at a time.

use crate::config::{ControlPolicy, SessionConfig};
use crate::decoder::{DecodeError, DecoderBackend, FfmpegBackend, FrameDecoder};
use crate::display::{ConversionError, PixelConverter, PresentationSink};
use crate::pipeline::health::{HealthSummary, SessionHealth};
use crate::pipeline::state::SessionState;
use crate::protocol::{self, ControlSignal, FramingError, MediaKind, Packet};
use crate::transport::{PacketSource, TransportError};
use log::{debug, error, info, warn};
use std::ops::ControlFlow;
use std::time::Instant;
use thiserror::Error;

/// Reasons a session stops abnormally. Every one of them ends the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("media server refused the session: {0}")]
    Rejected(ControlSignal),

    #[error("control signal while running: {0}")]
    Control(ControlSignal),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

/// Single-threaded receive/decode/present loop.
///
/// The decoder and the conversion context only live inside [`run_with`](Self::run_with),
/// so they are released on every exit path once the session is `Stopped`.
pub struct MediaSession<S, K> {
    config: SessionConfig,
    source: S,
    sink: K,
    state: SessionState,
    health: SessionHealth,
}

impl<S: PacketSource, K: PresentationSink> MediaSession<S, K> {
    pub fn new(config: SessionConfig, source: S, sink: K) -> Self {
        Self {
            config,
            source,
            sink,
            state: SessionState::Idle,
            health: SessionHealth::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn health(&self) -> &SessionHealth {
        &self.health
    }

    #[cfg(test)]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Run the session with the FFmpeg H.264 decoder.
    pub fn run(&mut self) -> Result<HealthSummary, SessionError> {
        self.run_with(FfmpegBackend::open)
    }

    /// Run the session until the sink asks to stop or an error occurs.
    ///
    /// Returns `Ok` only for an explicit stop request from the sink.
    pub fn run_with<B, F>(&mut self, open_decoder: F) -> Result<HealthSummary, SessionError>
    where
        B: DecoderBackend,
        F: FnOnce() -> Result<B, DecodeError>,
    {
        self.transition(SessionState::Initializing)?;
        info!("Initializing media session...");

        let result = self.drive(open_decoder);

        self.transition(SessionState::Stopped)?;
        let summary = self.health.summary();
        match &result {
            Ok(()) => info!("Media session stopped. {}", summary),
            Err(e) => error!("Media session failed: {}. {}", e, summary),
        }
        result.map(|()| summary)
    }

    fn drive<B, F>(&mut self, open_decoder: F) -> Result<(), SessionError>
    where
        B: DecoderBackend,
        F: FnOnce() -> Result<B, DecodeError>,
    {
        let mut decoder = FrameDecoder::new(open_decoder()?);
        let mut converter = PixelConverter::new(self.config.output);
        let mut buf = vec![0u8; self.config.max_packet_size];

        info!("Receiving media frames");
        while self.state.accepts_packets() {
            let received = self.source.receive(&mut buf)?;
            self.health.record_packet(received);
            let packet = protocol::extract(&buf[..received])?;

            if !self.state.is_running() {
                if let Packet::Control(signal) = packet {
                    error!("The media server is full. Try again later");
                    return Err(SessionError::Rejected(signal));
                }
                self.transition(SessionState::Running {
                    started_at: Instant::now(),
                })?;
            }

            if self
                .process(packet, &mut decoder, &mut converter)?
                .is_break()
            {
                info!("Stop requested by presentation sink");
                self.transition(SessionState::Stopped)?;
            }
        }

        info!(
            "Decoder: {} submissions, {} frames, {} audio payloads dropped, {} unknown skipped",
            decoder.submissions(),
            decoder.frames_decoded(),
            decoder.audio_dropped(),
            decoder.unknown_skipped()
        );
        info!(
            "Converter: {} conversion context(s) built",
            converter.context_allocations()
        );
        Ok(())
    }

    /// Process one framed packet completely. Frames reach the sink in decode order.
    fn process<B: DecoderBackend>(
        &mut self,
        packet: Packet<'_>,
        decoder: &mut FrameDecoder<B>,
        converter: &mut PixelConverter,
    ) -> Result<ControlFlow<()>, SessionError> {
        let media = match packet {
            Packet::Control(signal) => {
                self.health.record_control_signal();
                return match self.config.control_policy {
                    ControlPolicy::Ignore => {
                        warn!("Ignoring control signal: {}", signal);
                        Ok(ControlFlow::Continue(()))
                    }
                    ControlPolicy::Fatal => Err(SessionError::Control(signal)),
                };
            }
            Packet::Media(media) => media,
        };
        debug!(
            "Channel {} {} payload: {} bytes at offset {}",
            media.channel_id,
            media.kind,
            media.frame.len(),
            media.offset
        );

        match media.kind {
            MediaKind::Audio => self.health.record_audio_dropped(),
            MediaKind::Idr => self.health.record_keyframe(),
            _ => {}
        }

        let mut flow = ControlFlow::Continue(());
        for frame in decoder.submit(media.frame, media.kind)? {
            let frame = frame?;
            self.health.record_frame_decoded();

            let converted = converter.convert(&frame)?;
            if self.sink.present(&converted).is_break() {
                flow = ControlFlow::Break(());
            }
            self.health.record_frame_presented(converted.pixels.len());
        }
        Ok(flow)
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(&next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if self.state != next {
            info!("Session: {} -> {}", self.state, next);
            if next.is_stopped() {
                if let Some(ran_for) = self.state.running_duration() {
                    info!("Session ran for {:.1?}", ran_for);
                }
            }
        }
        self.state = next;
        Ok(())
    }
}
