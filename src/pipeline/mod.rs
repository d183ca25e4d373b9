//! Receive pipeline
//!
//! One blocking loop drives every stage in order:
//!
//! ```text
//! Transport → Framer → Decoder → Converter → Presentation sink
//! ```
//!
//! There are no channels and no worker tasks: each packet is fully processed before
//! the next one is received, so frames reach the sink in decode order.

pub mod health;
pub mod session;
pub mod state;

pub use health::{HealthSummary, SessionHealth};
pub use session::{MediaSession, SessionError};
pub use state::SessionState;
