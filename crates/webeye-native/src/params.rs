use std::ffi::{c_char, c_void};

use webeye_core::{ParamsLayout, WindowHandle};

use crate::bridge::Trampolines;

pub type VoidCallback = unsafe extern "system" fn();
pub type MessageCallback = unsafe extern "system" fn(message: *const c_char);
pub type DeviceCallback = unsafe extern "system" fn(info: *const VideoInputDeviceInfo);

/// Initialization record, first layout: three payload-less notifications.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ParamsV1 {
    pub window: *mut c_void,
    pub stream_started: Option<VoidCallback>,
    pub stream_stopped: Option<VoidCallback>,
    pub stream_failed: Option<VoidCallback>,
}

/// Initialization record, second layout: failures carry a message.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ParamsV2 {
    pub window: *mut c_void,
    pub stream_started: Option<VoidCallback>,
    pub stream_failed: Option<MessageCallback>,
}

/// What `Initialize` receives, by value.
#[derive(Clone, Copy)]
pub enum EngineParams {
    V1(ParamsV1),
    V2(ParamsV2),
}

impl EngineParams {
    pub fn build(layout: ParamsLayout, window: WindowHandle, trampolines: &Trampolines) -> Self {
        match layout {
            ParamsLayout::V1 => Self::V1(ParamsV1 {
                window: window.as_ptr(),
                stream_started: Some(trampolines.started),
                stream_stopped: Some(trampolines.stopped),
                stream_failed: Some(trampolines.failed),
            }),
            ParamsLayout::V2 => Self::V2(ParamsV2 {
                window: window.as_ptr(),
                stream_started: Some(trampolines.started),
                stream_failed: Some(trampolines.failed_with_message),
            }),
        }
    }

    pub fn layout(&self) -> ParamsLayout {
        match self {
            Self::V1(_) => ParamsLayout::V1,
            Self::V2(_) => ParamsLayout::V2,
        }
    }

    pub fn window(&self) -> WindowHandle {
        match self {
            Self::V1(p) => WindowHandle(p.window as usize),
            Self::V2(p) => WindowHandle(p.window as usize),
        }
    }
}

impl std::fmt::Debug for EngineParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineParams")
            .field("layout", &self.layout())
            .field("window", &self.window())
            .finish()
    }
}

/// One entry reported by device enumeration: two BSTRs.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VideoInputDeviceInfo {
    pub friendly_name: *const u16,
    pub device_path: *const u16,
}
