pub mod config;
pub mod errors;
pub mod types;

pub use config::{ParamsLayout, PlayerConfig, RtspFlags, RtspTransport};
pub use errors::{EngineError, FrameDecodeError};
pub use types::*;
