use thiserror::Error;

use crate::types::EngineState;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to load native engine (os error {code:?}): {reason}")]
    LoadFailed { code: Option<i32>, reason: String },

    #[error("Native engine does not export `{symbol}`")]
    BindFailed { symbol: String },

    #[error("No native engine payload for {arch}")]
    PayloadMissing { arch: String },

    #[error("All {capacity} callback slots are in use")]
    CallbackSlotsExhausted { capacity: usize },

    #[error("Engine initialization failed (code {code}): {message}")]
    InitFailed { code: i32, message: String },

    #[error("Engine start failed (code {code}): {message}")]
    StartFailed { code: i32, message: String },

    #[error("Engine stop failed (code {code}): {message}")]
    StopFailed { code: i32, message: String },

    #[error("Current frame unavailable (code {code}): {message}")]
    FrameUnavailable { code: i32, message: String },

    #[error("Frame size unavailable (code {code}): {message}")]
    SizeUnavailable { code: i32, message: String },

    #[error("Engine uninitialization failed (code {code}): {message}")]
    UninitializeFailed { code: i32, message: String },

    #[error("Capture graph reset failed (code {code}): {message}")]
    ResetFailed { code: i32, message: String },

    #[error("`{operation}` is not allowed while the engine is {state}")]
    InvalidState { operation: &'static str, state: EngineState },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Frame decode error: {0}")]
    Decode(#[from] FrameDecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Raw result code returned by the engine, when the error came from one.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::InitFailed { code, .. }
            | Self::StartFailed { code, .. }
            | Self::StopFailed { code, .. }
            | Self::FrameUnavailable { code, .. }
            | Self::SizeUnavailable { code, .. }
            | Self::UninitializeFailed { code, .. }
            | Self::ResetFailed { code, .. } => Some(*code),
            Self::LoadFailed { code, .. } => *code,
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameDecodeError {
    #[error("Unsupported pixel format: {bits_per_pixel} bits per pixel")]
    UnsupportedFormat { bits_per_pixel: u16 },

    #[error("Engine returned a null frame buffer")]
    NullBuffer,

    #[error("Malformed frame header: {reason}")]
    InvalidHeader { reason: String },
}
