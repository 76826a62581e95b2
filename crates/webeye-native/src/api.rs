//! The engine contracts as safe traits. [`NativePlayer`](crate::NativePlayer)
//! and [`NativeCapture`](crate::NativeCapture) implement them over a loaded
//! module; tests implement them with fakes.
//!
//! Methods return the engine's raw result codes; interpreting them is up to
//! the proxy.

use std::ffi::CStr;

use webeye_core::{PlayerConfig, WindowHandle};
use webeye_frame::NativeBuffer;

use crate::marshal::WideBstr;
use crate::params::{DeviceCallback, EngineParams};

/// Open options forwarded with `StartPlay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOptions {
    pub connection_timeout_ms: i32,
    pub stream_timeout_ms: i32,
    pub transport: i32,
    pub flags: i32,
}

impl From<&PlayerConfig> for PlayOptions {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            connection_timeout_ms: i32::try_from(config.connection_timeout_ms).unwrap_or(i32::MAX),
            stream_timeout_ms: i32::try_from(config.stream_timeout_ms).unwrap_or(i32::MAX),
            transport: config.transport.as_raw(),
            flags: config.flags.as_raw(),
        }
    }
}

/// Streaming engine contract. 0 means success.
pub trait PlayerApi: Send + Sync {
    fn initialize(&self, params: EngineParams) -> i32;
    fn start_play(&self, url: &CStr, options: &PlayOptions) -> i32;
    /// `Ok(None)` when the engine reports success but hands out no buffer.
    fn current_frame(&self) -> Result<Option<NativeBuffer>, i32>;
    fn frame_size(&self) -> Result<(u32, u32), i32>;
    fn stop(&self) -> i32;
    fn uninitialize(&self) -> i32;
}

/// Capture-graph engine contract. Results are HRESULTs.
pub trait CaptureApi: Send + Sync {
    /// Calls `callback` once per device, synchronously.
    fn enum_video_input_devices(&self, callback: DeviceCallback);
    fn build_capture_graph(&self) -> i32;
    fn add_render_filter(&self, window: WindowHandle) -> i32;
    fn add_capture_filter(&self, device_path: &WideBstr) -> i32;
    fn reset_capture_graph(&self) -> i32;
    fn start(&self) -> i32;
    fn stop(&self) -> i32;
    fn current_image(&self) -> Result<Option<NativeBuffer>, i32>;
    fn video_size(&self) -> Result<(u32, u32), i32>;
    fn destroy_capture_graph(&self);
}
