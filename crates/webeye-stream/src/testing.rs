//! In-process stand-ins for the native engines. They record every call and
//! drive the real trampolines the proxies hand them.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::{Arc, Mutex};

use webeye_core::WindowHandle;
use webeye_frame::{stride_for, FrameHeader, NativeBuffer};
use webeye_native::marshal::read_bstr;
use webeye_native::{
    CaptureApi, DeviceCallback, EngineParams, MessageCallback, PlayOptions, PlayerApi, VideoInputDeviceInfo,
    VoidCallback, WideBstr,
};

/// A bottom-up DIB whose stored row `r` is filled with `r + 1`.
pub(crate) fn dib(width: i32, height: i32, bit_count: u16) -> Vec<u8> {
    let stride = stride_for(width as u32, bit_count).unwrap();
    let mut bytes = FrameHeader::new(width, height, bit_count).to_bytes().to_vec();
    for r in 0..height.unsigned_abs() as usize {
        bytes.extend(std::iter::repeat(r as u8 + 1).take(stride));
    }
    bytes
}

/// Engine-side state shared between a fake and the test driving it.
#[derive(Default)]
pub(crate) struct FakeEngine {
    log: Mutex<Vec<String>>,
    codes: Mutex<HashMap<&'static str, i32>>,
    callbacks: Mutex<Callbacks>,
    devices: Mutex<Vec<(String, String)>>,
    on_call: Mutex<Option<Box<dyn Fn(&str) + Send>>>,
}

#[derive(Default, Clone, Copy)]
struct Callbacks {
    started: Option<VoidCallback>,
    stopped: Option<VoidCallback>,
    failed: Option<VoidCallback>,
    failed_with_message: Option<MessageCallback>,
}

impl FakeEngine {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.split(' ').next() == Some(call)).count()
    }

    pub(crate) fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    pub(crate) fn set_code(&self, call: &'static str, code: i32) {
        self.codes.lock().unwrap().insert(call, code);
    }

    pub(crate) fn add_device(&self, name: &str, path: &str) {
        self.devices.lock().unwrap().push((name.to_string(), path.to_string()));
    }

    /// Runs `hook` with each call name as the engine receives it.
    pub(crate) fn on_call(&self, hook: impl Fn(&str) + Send + 'static) {
        *self.on_call.lock().unwrap() = Some(Box::new(hook));
    }

    fn record(&self, call: impl Into<String>) {
        let call = call.into();
        if let Some(hook) = self.on_call.lock().unwrap().as_ref() {
            hook(&call);
        }
        self.log.lock().unwrap().push(call);
    }

    fn code(&self, call: &'static str) -> i32 {
        self.codes.lock().unwrap().get(call).copied().unwrap_or(0)
    }

    fn callbacks(&self) -> Callbacks {
        *self.callbacks.lock().unwrap()
    }

    /// Raises the started notification from an engine thread.
    pub(crate) fn fire_started(&self) {
        let started = self.callbacks().started.expect("initialized with callbacks");
        std::thread::spawn(move || unsafe { started() }).join().unwrap();
    }

    pub(crate) fn fire_stopped(&self) {
        let stopped = self.callbacks().stopped.expect("layout with a stopped callback");
        std::thread::spawn(move || unsafe { stopped() }).join().unwrap();
    }

    /// Raises a failure through whichever failed callback the layout has.
    pub(crate) fn fire_failed(&self, message: &str) {
        let callbacks = self.callbacks();
        let message = CString::new(message).unwrap();
        std::thread::spawn(move || unsafe {
            match (callbacks.failed_with_message, callbacks.failed) {
                (Some(with_message), _) => with_message(message.as_ptr()),
                (None, Some(failed)) => failed(),
                (None, None) => panic!("no failed callback registered"),
            }
        })
        .join()
        .unwrap();
    }
}

// ── FakePlayer ────────────────────────────────────────────────────────────────

pub(crate) struct FakePlayer {
    pub(crate) engine: Arc<FakeEngine>,
    pub(crate) frame: Vec<u8>,
}

impl FakePlayer {
    pub(crate) fn new() -> (Self, Arc<FakeEngine>) {
        let engine = Arc::new(FakeEngine::default());
        let fake = Self {
            engine: engine.clone(),
            frame: dib(4, 3, 24),
        };
        (fake, engine)
    }
}

impl PlayerApi for FakePlayer {
    fn initialize(&self, params: EngineParams) -> i32 {
        let callbacks = match params {
            EngineParams::V1(p) => Callbacks {
                started: p.stream_started,
                stopped: p.stream_stopped,
                failed: p.stream_failed,
                failed_with_message: None,
            },
            EngineParams::V2(p) => Callbacks {
                started: p.stream_started,
                failed_with_message: p.stream_failed,
                ..Callbacks::default()
            },
        };
        *self.engine.callbacks.lock().unwrap() = callbacks;
        self.engine.record(format!("initialize {:?}", params.layout()));
        self.engine.code("initialize")
    }

    fn start_play(&self, url: &CStr, options: &PlayOptions) -> i32 {
        self.engine.record(format!(
            "start_play {} {} {} {} {}",
            url.to_string_lossy(),
            options.connection_timeout_ms,
            options.stream_timeout_ms,
            options.transport,
            options.flags
        ));
        self.engine.code("start_play")
    }

    fn current_frame(&self) -> Result<Option<NativeBuffer>, i32> {
        self.engine.record("current_frame");
        match self.engine.code("current_frame") {
            0 => Ok(Some(NativeBuffer::from_boxed(self.frame.clone().into_boxed_slice()))),
            code => Err(code),
        }
    }

    fn frame_size(&self) -> Result<(u32, u32), i32> {
        self.engine.record("frame_size");
        match self.engine.code("frame_size") {
            0 => Ok((640, 480)),
            code => Err(code),
        }
    }

    fn stop(&self) -> i32 {
        self.engine.record("stop");
        self.engine.code("stop")
    }

    fn uninitialize(&self) -> i32 {
        self.engine.record("uninitialize");
        self.engine.code("uninitialize")
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        self.engine.record("unload");
    }
}

// ── FakeCapture ───────────────────────────────────────────────────────────────

pub(crate) struct FakeCapture {
    pub(crate) engine: Arc<FakeEngine>,
}

impl FakeCapture {
    pub(crate) fn new() -> (Self, Arc<FakeEngine>) {
        let engine = Arc::new(FakeEngine::default());
        (Self { engine: engine.clone() }, engine)
    }
}

impl CaptureApi for FakeCapture {
    fn enum_video_input_devices(&self, callback: DeviceCallback) {
        self.engine.record("enum_video_input_devices");
        let devices = self.engine.devices.lock().unwrap().clone();
        for (name, path) in devices {
            let (name, path) = (WideBstr::new(&name), WideBstr::new(&path));
            let info = VideoInputDeviceInfo {
                friendly_name: name.as_ptr(),
                device_path: path.as_ptr(),
            };
            unsafe { callback(&info) };
        }
    }

    fn build_capture_graph(&self) -> i32 {
        self.engine.record("build_capture_graph");
        self.engine.code("build_capture_graph")
    }

    fn add_render_filter(&self, window: WindowHandle) -> i32 {
        self.engine.record(format!("add_render_filter {:#x}", window.0));
        self.engine.code("add_render_filter")
    }

    fn add_capture_filter(&self, device_path: &WideBstr) -> i32 {
        let path = unsafe { read_bstr(device_path.as_ptr()) };
        self.engine.record(format!("add_capture_filter {path}"));
        self.engine.code("add_capture_filter")
    }

    fn reset_capture_graph(&self) -> i32 {
        self.engine.record("reset_capture_graph");
        self.engine.code("reset_capture_graph")
    }

    fn start(&self) -> i32 {
        self.engine.record("start");
        self.engine.code("start")
    }

    fn stop(&self) -> i32 {
        self.engine.record("stop");
        self.engine.code("stop")
    }

    fn current_image(&self) -> Result<Option<NativeBuffer>, i32> {
        self.engine.record("current_image");
        match self.engine.code("current_image") {
            code if code < 0 => Err(code),
            _ => Ok(Some(NativeBuffer::from_boxed(dib(2, 2, 32).into_boxed_slice()))),
        }
    }

    fn video_size(&self) -> Result<(u32, u32), i32> {
        self.engine.record("video_size");
        match self.engine.code("video_size") {
            code if code < 0 => Err(code),
            _ => Ok((1280, 720)),
        }
    }

    fn destroy_capture_graph(&self) {
        self.engine.record("destroy_capture_graph");
    }
}

impl Drop for FakeCapture {
    fn drop(&mut self) {
        self.engine.record("unload");
    }
}
