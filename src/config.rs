use ac_ffmpeg::codec::video;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Default receive buffer size: the largest packet the session accepts.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 2 * 1024 * 1024;

/// What the running session does with a control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlPolicy {
    /// Log and skip it
    #[default]
    Ignore,
    /// Stop the session
    Fatal,
}

/// Packed 3-channel layout handed to the presentation sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    #[default]
    Bgr24,
    Rgb24,
}

impl OutputLayout {
    pub fn pixel_format(&self) -> video::frame::PixelFormat {
        video::frame::get_pixel_format(self.name())
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputLayout::Bgr24 => "bgr24",
            OutputLayout::Rgb24 => "rgb24",
        }
    }
}

impl std::fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Output image produced by the pixel converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct OutputFormat {
    pub layout: OutputLayout,
    /// Fixed output width; source width when unset
    pub width: Option<usize>,
    /// Fixed output height; source height when unset
    pub height: Option<usize>,
}

impl OutputFormat {
    pub fn target_size(&self, source_width: usize, source_height: usize) -> (usize, usize) {
        (
            self.width.unwrap_or(source_width),
            self.height.unwrap_or(source_height),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_packet_size: usize,
    pub control_policy: ControlPolicy,
    pub output: OutputFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            control_policy: ControlPolicy::default(),
            output: OutputFormat::default(),
        }
    }
}

impl SessionConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: SessionConfig = serde_json::from_str(raw)?;
        if config.max_packet_size < crate::protocol::ENVELOPE_HEADER_SIZE {
            anyhow::bail!(
                "max_packet_size {} cannot hold a packet header",
                config.max_packet_size
            );
        }
        Ok(config)
    }
}

/// Returns a version as specified in Cargo.toml
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
