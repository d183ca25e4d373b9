//! Health counters for a media session

/// Counters updated by the session loop.
///
/// The loop is single threaded, so plain integers are enough.
#[derive(Debug, Default)]
pub struct SessionHealth {
    packets_received: u64,
    bytes_received: u64,
    control_signals: u64,
    audio_dropped: u64,
    frames_decoded: u64,
    frames_presented: u64,
    bytes_presented: u64,
    keyframes_received: u64,
}

impl SessionHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet(&mut self, size: usize) {
        self.packets_received += 1;
        self.bytes_received += size as u64;
    }

    pub fn record_control_signal(&mut self) {
        self.control_signals += 1;
    }

    pub fn record_audio_dropped(&mut self) {
        self.audio_dropped += 1;
    }

    pub fn record_keyframe(&mut self) {
        self.keyframes_received += 1;
    }

    pub fn record_frame_decoded(&mut self) {
        self.frames_decoded += 1;
    }

    /// Record a frame handed to the presentation sink
    pub fn record_frame_presented(&mut self, size: usize) {
        self.frames_presented += 1;
        self.bytes_presented += size as u64;
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            packets_received: self.packets_received,
            bytes_received: self.bytes_received,
            control_signals: self.control_signals,
            audio_dropped: self.audio_dropped,
            keyframes_received: self.keyframes_received,
            frames_decoded: self.frames_decoded,
            frames_presented: self.frames_presented,
            bytes_presented: self.bytes_presented,
        }
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub control_signals: u64,
    pub audio_dropped: u64,
    pub keyframes_received: u64,
    pub frames_decoded: u64,
    pub frames_presented: u64,
    pub bytes_presented: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} packets ({} bytes, {} keyframes, {} audio dropped, {} control), {} frames decoded, {} presented ({} bytes)",
            self.packets_received,
            self.bytes_received,
            self.keyframes_received,
            self.audio_dropped,
            self.control_signals,
            self.frames_decoded,
            self.frames_presented,
            self.bytes_presented
        )
    }
}
