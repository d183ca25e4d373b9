//! Display components: pixel conversion and presentation sinks

pub mod converter;
pub mod sink;

pub use converter::{ConversionContext, ConversionError, ConvertedFrame, PixelConverter};
pub use sink::{PresentationSink, SnapshotSink, StatsSink};
