use std::ffi::c_void;
use std::ptr::{self, NonNull};

use webeye_core::{EngineError, WindowHandle};
use webeye_frame::NativeBuffer;

use crate::api::CaptureApi;
use crate::loader::NativeLibrary;
use crate::marshal::WideBstr;
use crate::memory::release_with_system_allocator;
use crate::params::DeviceCallback;

/// Export names of the capture-graph engine.
pub mod symbol {
    pub const ENUM_VIDEO_INPUT_DEVICES: &str = "EnumVideoInputDevices";
    pub const BUILD_CAPTURE_GRAPH: &str = "BuildCaptureGraph";
    pub const ADD_RENDER_FILTER: &str = "AddRenderFilter";
    pub const ADD_CAPTURE_FILTER: &str = "AddCaptureFilter";
    pub const RESET_CAPTURE_GRAPH: &str = "ResetCaptureGraph";
    pub const START: &str = "Start";
    pub const STOP: &str = "Stop";
    pub const GET_CURRENT_IMAGE: &str = "GetCurrentImage";
    pub const GET_VIDEO_SIZE: &str = "GetVideoSize";
    pub const DESTROY_CAPTURE_GRAPH: &str = "DestroyCaptureGraph";
}

type EnumDevicesFn = unsafe extern "system" fn(callback: DeviceCallback);
type HresultFn = unsafe extern "system" fn() -> i32;
type AddRenderFilterFn = unsafe extern "system" fn(window: *mut c_void) -> i32;
type AddCaptureFilterFn = unsafe extern "system" fn(device_path: *const u16) -> i32;
type GetCurrentImageFn = unsafe extern "system" fn(dib: *mut *mut u8) -> i32;
type GetVideoSizeFn = unsafe extern "system" fn(width: *mut i32, height: *mut i32) -> i32;
type VoidFn = unsafe extern "system" fn();

#[derive(Clone, Copy)]
struct CaptureFunctions {
    enum_video_input_devices: EnumDevicesFn,
    build_capture_graph: HresultFn,
    add_render_filter: AddRenderFilterFn,
    add_capture_filter: AddCaptureFilterFn,
    reset_capture_graph: HresultFn,
    start: HresultFn,
    stop: HresultFn,
    get_current_image: GetCurrentImageFn,
    get_video_size: GetVideoSizeFn,
    destroy_capture_graph: VoidFn,
}

/// The capture-graph engine, bound over a loaded module.
pub struct NativeCapture {
    functions: CaptureFunctions,
    library: NativeLibrary,
}

impl NativeCapture {
    pub fn load(payload: &[u8]) -> Result<Self, EngineError> {
        Self::bind(NativeLibrary::load(payload)?)
    }

    pub fn bind(library: NativeLibrary) -> Result<Self, EngineError> {
        // SAFETY: the types mirror the capture engine's exports.
        let functions = unsafe {
            CaptureFunctions {
                enum_video_input_devices: library.resolve(symbol::ENUM_VIDEO_INPUT_DEVICES)?,
                build_capture_graph: library.resolve(symbol::BUILD_CAPTURE_GRAPH)?,
                add_render_filter: library.resolve(symbol::ADD_RENDER_FILTER)?,
                add_capture_filter: library.resolve(symbol::ADD_CAPTURE_FILTER)?,
                reset_capture_graph: library.resolve(symbol::RESET_CAPTURE_GRAPH)?,
                start: library.resolve(symbol::START)?,
                stop: library.resolve(symbol::STOP)?,
                get_current_image: library.resolve(symbol::GET_CURRENT_IMAGE)?,
                get_video_size: library.resolve(symbol::GET_VIDEO_SIZE)?,
                destroy_capture_graph: library.resolve(symbol::DESTROY_CAPTURE_GRAPH)?,
            }
        };
        Ok(Self { functions, library })
    }

    pub fn library(&self) -> &NativeLibrary {
        &self.library
    }
}

impl CaptureApi for NativeCapture {
    fn enum_video_input_devices(&self, callback: DeviceCallback) {
        unsafe { (self.functions.enum_video_input_devices)(callback) }
    }

    fn build_capture_graph(&self) -> i32 {
        unsafe { (self.functions.build_capture_graph)() }
    }

    fn add_render_filter(&self, window: WindowHandle) -> i32 {
        unsafe { (self.functions.add_render_filter)(window.as_ptr()) }
    }

    fn add_capture_filter(&self, device_path: &WideBstr) -> i32 {
        unsafe { (self.functions.add_capture_filter)(device_path.as_ptr()) }
    }

    fn reset_capture_graph(&self) -> i32 {
        unsafe { (self.functions.reset_capture_graph)() }
    }

    fn start(&self) -> i32 {
        unsafe { (self.functions.start)() }
    }

    fn stop(&self) -> i32 {
        unsafe { (self.functions.stop)() }
    }

    fn current_image(&self) -> Result<Option<NativeBuffer>, i32> {
        let mut dib: *mut u8 = ptr::null_mut();
        let code = unsafe { (self.functions.get_current_image)(&mut dib) };
        if code < 0 {
            return Err(code);
        }
        // SAFETY: on success the graph hands out a CoTaskMem-allocated DIB.
        Ok(unsafe { NativeBuffer::from_raw(dib, |ptr: NonNull<u8>| release_with_system_allocator(ptr)) })
    }

    fn video_size(&self) -> Result<(u32, u32), i32> {
        let (mut width, mut height) = (0i32, 0i32);
        let code = unsafe { (self.functions.get_video_size)(&mut width, &mut height) };
        if code < 0 {
            return Err(code);
        }
        Ok((width.max(0) as u32, height.max(0) as u32))
    }

    fn destroy_capture_graph(&self) {
        unsafe { (self.functions.destroy_capture_graph)() }
    }
}
