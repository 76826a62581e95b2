use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use webeye_core::EngineState::{Active, Initialized, Stopped, Uninitialized};
use webeye_core::{DeviceIdentity, EngineError, EngineEvent, EngineState, Frame, FrameDecodeError, FrameSize, WindowHandle};
use webeye_native::{hresult, CallbackBridge, CaptureApi, NativeCapture, PayloadSet, WideBstr};

use crate::catalog::DeviceCatalog;
use crate::events::EventHub;
use crate::shared::Shared;
use crate::VideoSource;

/// What the capture graph currently holds. Guarded by the call lock.
#[derive(Debug, Default)]
struct Session {
    /// Path of the capture filter in the graph, if any.
    filter: Option<String>,
    /// Device whose filter is in the graph, when added by identity.
    device: Option<DeviceIdentity>,
}

/// Host-side proxy for the capture-graph engine.
///
/// Results from the engine are HRESULTs; failures carry the system's text
/// for the code. Dropping the camera stops capture, destroys the graph, and
/// unloads the module, in that order.
pub struct WebCamera<A: CaptureApi = NativeCapture> {
    api: Option<A>,
    bridge: Option<CallbackBridge>,
    shared: Arc<Shared>,
    session: Mutex<Session>,
}

impl WebCamera<NativeCapture> {
    pub fn load(payloads: &PayloadSet) -> Result<Self, EngineError> {
        Self::with_api(NativeCapture::load(payloads.for_current()?)?)
    }
}

impl<A: CaptureApi> WebCamera<A> {
    pub fn with_api(api: A) -> Result<Self, EngineError> {
        let shared = Arc::new(Shared::default());
        let bridge = CallbackBridge::register(shared.clone())?;
        Ok(Self {
            api: Some(api),
            bridge: Some(bridge),
            shared,
            session: Mutex::new(Session::default()),
        })
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// The device being captured, when capture was started by identity.
    pub fn current_device(&self) -> Option<DeviceIdentity> {
        self.lock_session().device.clone()
    }

    pub(crate) fn catalog(&self) -> Result<DeviceCatalog<'_, A>, EngineError> {
        let (api, bridge) = self.parts("list_devices")?;
        Ok(DeviceCatalog::new(api, bridge, &self.shared.devices))
    }

    /// Capture devices currently attached. Enumerates afresh on each call.
    pub fn list_devices(&self) -> Result<Vec<DeviceIdentity>, EngineError> {
        let _session = self.lock_session();
        Ok(self.catalog()?.enumerate())
    }

    /// Builds the capture graph with a renderer targeting `window`.
    pub fn initialize(&self, window: WindowHandle) -> Result<(), EngineError> {
        let _session = self.lock_session();
        self.shared.require("initialize", &[Uninitialized])?;
        let (api, _) = self.parts("initialize")?;

        check(api.build_capture_graph(), "building the capture graph", init_failed)?;
        if let Err(e) = check(api.add_render_filter(window), "adding the render filter", init_failed) {
            api.destroy_capture_graph();
            return Err(e);
        }
        self.shared.set(Initialized);
        info!("Capture graph built");
        Ok(())
    }

    /// Puts the capture filter for `device_path` into the graph.
    pub fn add_capture_filter(&self, device_path: &str) -> Result<(), EngineError> {
        let mut session = self.lock_session();
        self.add_filter_locked(&mut session, device_path)?;
        session.device = None;
        Ok(())
    }

    /// Starts the graph with the capture filter already added.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut session = self.lock_session();
        self.start_locked(&mut session)
    }

    /// Captures from `device`, switching away from whatever device is
    /// running. Starting the device already running does nothing.
    pub fn start_capture(&self, device: &DeviceIdentity) -> Result<(), EngineError> {
        if device.device_path().trim().is_empty() {
            return Err(EngineError::InvalidArgument {
                reason: format!("device `{device}` has no path"),
            });
        }

        let mut session = self.lock_session();
        let state = self.shared.require("start_capture", &[Initialized, Active, Stopped])?;
        if state == Active {
            if session.device.as_ref() == Some(device) {
                return Ok(());
            }
            info!("Switching capture to {}", device);
            self.stop_locked(&mut session)?;
        }
        if session.filter.is_some() {
            self.reset_locked(&mut session)?;
        }

        self.add_filter_locked(&mut session, device.device_path())?;
        session.device = Some(device.clone());
        self.start_locked(&mut session)?;
        info!("Capturing from {}", device);
        Ok(())
    }

    pub fn current_frame(&self) -> Result<Frame, EngineError> {
        let _session = self.lock_session();
        self.shared.require("current_frame", &[Active])?;
        let (api, _) = self.parts("current_frame")?;

        match api.current_image() {
            Ok(Some(buffer)) => Ok(webeye_frame::decode(buffer)?),
            Ok(None) => Err(FrameDecodeError::NullBuffer.into()),
            Err(code) => Err(EngineError::FrameUnavailable {
                code,
                message: hresult::describe(code),
            }),
        }
    }

    pub fn frame_size(&self) -> Result<FrameSize, EngineError> {
        let _session = self.lock_session();
        self.shared.require("frame_size", &[Active])?;
        let (api, _) = self.parts("frame_size")?;

        api.video_size()
            .map(|(width, height)| FrameSize::new(width, height))
            .map_err(|code| EngineError::SizeUnavailable {
                code,
                message: hresult::describe(code),
            })
    }

    /// Stops capture and clears the graph's capture filter. The camera ends
    /// up `Stopped` even when the engine reports an error.
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut session = self.lock_session();
        self.stop_locked(&mut session)
    }

    /// Destroys the capture graph. A second call fails with `InvalidState`
    /// without reaching the engine.
    pub fn uninitialize(&self) -> Result<(), EngineError> {
        let mut session = self.lock_session();
        self.shared.require("uninitialize", &[Initialized, Active, Stopped])?;
        let (api, _) = self.parts("uninitialize")?;

        self.shared.set(Uninitialized);
        *session = Session::default();
        api.destroy_capture_graph();
        info!("Capture graph destroyed");
        Ok(())
    }

    /// Stops, destroys the graph, releases the callbacks, and unloads the
    /// engine. Every step runs; the first error is returned.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.teardown()
    }

    // ── Locked helpers ────────────────────────────────────────────────────────

    fn add_filter_locked(&self, session: &mut Session, device_path: &str) -> Result<(), EngineError> {
        if device_path.trim().is_empty() {
            return Err(EngineError::InvalidArgument {
                reason: "device path is empty".into(),
            });
        }
        self.shared.require("add_capture_filter", &[Initialized, Stopped])?;
        let (api, _) = self.parts("add_capture_filter")?;

        check(
            api.add_capture_filter(&WideBstr::new(device_path)),
            "adding the capture filter",
            start_failed,
        )?;
        session.filter = Some(device_path.to_string());
        Ok(())
    }

    fn start_locked(&self, session: &mut Session) -> Result<(), EngineError> {
        self.shared.require("start", &[Initialized, Stopped])?;
        let (api, _) = self.parts("start")?;
        if session.filter.is_none() {
            return Err(EngineError::InvalidArgument {
                reason: "no capture filter has been added".into(),
            });
        }

        if let Err(e) = check(api.start(), "starting the capture graph", start_failed) {
            // Leave the graph empty so another device can be tried.
            if let Err(reset) = self.reset_locked(session) {
                warn!("Graph reset after failed start also failed: {}", reset);
            }
            return Err(e);
        }
        self.shared.set(Active);
        self.shared.events.emit(EngineEvent::Started);
        Ok(())
    }

    fn stop_locked(&self, session: &mut Session) -> Result<(), EngineError> {
        self.shared.require("stop", &[Active])?;
        let (api, _) = self.parts("stop")?;

        // Stopped first: the old device is never reported active again.
        self.shared.set(Stopped);
        let stopped = check(api.stop(), "stopping the capture graph", stop_failed);
        self.shared.events.emit(EngineEvent::Stopped);
        let reset = self.reset_locked(session);
        stopped.and(reset)
    }

    fn reset_locked(&self, session: &mut Session) -> Result<(), EngineError> {
        let (api, _) = self.parts("reset_capture_graph")?;
        session.filter = None;
        session.device = None;
        check(api.reset_capture_graph(), "resetting the capture graph", reset_failed)
    }

    fn teardown(&mut self) -> Result<(), EngineError> {
        let mut first_error = None;
        if self.shared.state() == Active {
            if let Err(e) = self.stop() {
                warn!("Stop during shutdown failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        if self.api.is_some() && self.shared.state() != Uninitialized {
            if let Err(e) = self.uninitialize() {
                first_error.get_or_insert(e);
            }
        }
        drop(self.bridge.take());
        drop(self.api.take());
        first_error.map_or(Ok(()), Err)
    }

    fn parts(&self, operation: &'static str) -> Result<(&A, &CallbackBridge), EngineError> {
        match (&self.api, &self.bridge) {
            (Some(api), Some(bridge)) => Ok((api, bridge)),
            _ => Err(EngineError::InvalidState {
                operation,
                state: Uninitialized,
            }),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check(code: i32, context: &str, error: fn(i32, String) -> EngineError) -> Result<(), EngineError> {
    if hresult::succeeded(code) {
        Ok(())
    } else {
        Err(error(code, format!("{context}: {}", hresult::describe(code))))
    }
}

fn init_failed(code: i32, message: String) -> EngineError {
    EngineError::InitFailed { code, message }
}

fn start_failed(code: i32, message: String) -> EngineError {
    EngineError::StartFailed { code, message }
}

fn stop_failed(code: i32, message: String) -> EngineError {
    EngineError::StopFailed { code, message }
}

fn reset_failed(code: i32, message: String) -> EngineError {
    EngineError::ResetFailed { code, message }
}

impl<A: CaptureApi> VideoSource for WebCamera<A> {
    fn stop(&self) -> Result<(), EngineError> {
        WebCamera::stop(self)
    }

    fn current_frame(&self) -> Result<Frame, EngineError> {
        WebCamera::current_frame(self)
    }

    fn frame_size(&self) -> Result<FrameSize, EngineError> {
        WebCamera::frame_size(self)
    }

    fn is_active(&self) -> bool {
        self.shared.state().is_active()
    }

    fn events(&self) -> &EventHub {
        &self.shared.events
    }
}

impl<A: CaptureApi> Drop for WebCamera<A> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Capture engine shut down with errors: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCapture, FakeEngine};
    use webeye_core::PixelFormat;

    const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;

    fn camera() -> (WebCamera<FakeCapture>, Arc<FakeEngine>) {
        let (fake, engine) = FakeCapture::new();
        engine.add_device("Integrated Camera", r"\\?\usb#vid_0001");
        engine.add_device("Broken Camera", "");
        engine.add_device("USB Camera", r"\\?\usb#vid_0002");
        (WebCamera::with_api(fake).unwrap(), engine)
    }

    fn initialized() -> (WebCamera<FakeCapture>, Arc<FakeEngine>, Vec<DeviceIdentity>) {
        let (camera, engine) = camera();
        let devices = camera.list_devices().unwrap();
        camera.initialize(WindowHandle(0x10)).unwrap();
        engine.clear();
        (camera, engine, devices)
    }

    #[test]
    fn enumeration_skips_pathless_devices_and_repeats_from_scratch() {
        let (camera, engine) = camera();

        let first = camera.list_devices().unwrap();
        let second = camera.list_devices().unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0], DeviceIdentity::new("Integrated Camera", r"\\?\usb#vid_0001"));
        assert_eq!(first, second);
        assert_ne!(first.as_ptr(), second.as_ptr());
        assert_eq!(engine.count("enum_video_input_devices"), 2);
    }

    #[test]
    fn calls_before_initialize_are_rejected_without_engine_calls() {
        let (camera, engine) = camera();
        let device = DeviceIdentity::new("USB Camera", r"\\?\usb#vid_0002");

        assert!(matches!(camera.start_capture(&device), Err(EngineError::InvalidState { .. })));
        assert!(matches!(camera.stop(), Err(EngineError::InvalidState { .. })));
        assert!(matches!(camera.current_frame(), Err(EngineError::InvalidState { .. })));
        assert!(matches!(camera.frame_size(), Err(EngineError::InvalidState { .. })));
        assert!(matches!(camera.uninitialize(), Err(EngineError::InvalidState { .. })));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn initialize_builds_graph_with_renderer() {
        let (camera, engine) = camera();
        camera.initialize(WindowHandle(0x2a)).unwrap();
        assert_eq!(engine.calls(), ["build_capture_graph", "add_render_filter 0x2a"]);
        assert_eq!(camera.state(), Initialized);
    }

    #[test]
    fn failed_render_filter_tears_graph_down() {
        let (camera, engine) = camera();
        engine.set_code("add_render_filter", E_ACCESSDENIED);

        match camera.initialize(WindowHandle::NONE) {
            Err(EngineError::InitFailed { code, message }) => {
                assert_eq!(code, E_ACCESSDENIED);
                assert!(message.contains("0x80070005"), "{message}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(engine.calls().last().map(String::as_str), Some("destroy_capture_graph"));
        assert_eq!(camera.state(), Uninitialized);
    }

    #[test]
    fn switching_devices_stops_resets_and_restarts() {
        let (camera, engine, devices) = initialized();
        let (_, mut rx) = camera.events().channel();

        camera.start_capture(&devices[0]).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (shared, log) = (camera.shared.clone(), seen.clone());
        engine.on_call(move |call| {
            if matches!(call, "stop" | "reset_capture_graph") || call.starts_with("add_capture_filter") {
                log.lock().unwrap().push(shared.state());
            }
        });
        camera.start_capture(&devices[1]).unwrap();

        // The old device is never reported active once the switch begins.
        assert_eq!(*seen.lock().unwrap(), [Stopped, Stopped, Stopped]);
        assert_eq!(
            engine.calls(),
            [
                r"add_capture_filter \\?\usb#vid_0001",
                "start",
                "stop",
                "reset_capture_graph",
                r"add_capture_filter \\?\usb#vid_0002",
                "start",
            ]
        );
        assert_eq!(camera.current_device().as_ref(), Some(&devices[1]));
        assert!(camera.is_active());
        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events, [EngineEvent::Started, EngineEvent::Stopped, EngineEvent::Started]);
    }

    #[test]
    fn restarting_the_running_device_is_a_no_op() {
        let (camera, engine, devices) = initialized();
        camera.start_capture(&devices[0]).unwrap();
        engine.clear();

        camera.start_capture(&devices[0]).unwrap();

        assert!(engine.calls().is_empty());
    }

    #[test]
    fn failed_start_resets_graph_for_retry() {
        let (camera, engine, devices) = initialized();
        engine.set_code("start", E_ACCESSDENIED);

        assert!(matches!(
            camera.start_capture(&devices[0]),
            Err(EngineError::StartFailed { code: E_ACCESSDENIED, .. })
        ));
        assert_eq!(engine.calls().last().map(String::as_str), Some("reset_capture_graph"));
        assert_eq!(camera.state(), Initialized);
        assert_eq!(camera.current_device(), None);

        engine.set_code("start", 0);
        camera.start_capture(&devices[1]).unwrap();
        assert!(camera.is_active());
    }

    #[test]
    fn start_requires_a_capture_filter() {
        let (camera, engine, _) = initialized();
        assert!(matches!(camera.start(), Err(EngineError::InvalidArgument { .. })));
        assert!(engine.calls().is_empty());

        camera.add_capture_filter(r"\\?\usb#vid_0002").unwrap();
        camera.start().unwrap();
        assert!(camera.is_active());
        assert_eq!(camera.current_device(), None);
    }

    #[test]
    fn pathless_device_is_rejected() {
        let (camera, engine, _) = initialized();
        let device = DeviceIdentity::new("Broken Camera", " ");
        assert!(matches!(camera.start_capture(&device), Err(EngineError::InvalidArgument { .. })));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn frames_and_sizes_while_capturing() {
        let (camera, _, devices) = initialized();
        camera.start_capture(&devices[0]).unwrap();

        let frame = camera.current_frame().unwrap();
        assert_eq!(frame.format, PixelFormat::Rgb32);
        assert_eq!(frame.height, 2);
        assert!(frame.row(0).unwrap().iter().all(|&b| b == 2));
        assert_eq!(camera.frame_size().unwrap(), FrameSize::new(1280, 720));
    }

    #[test]
    fn stop_failure_still_stops_and_resets() {
        let (camera, engine, devices) = initialized();
        camera.start_capture(&devices[0]).unwrap();
        engine.set_code("stop", E_ACCESSDENIED);

        assert!(matches!(camera.stop(), Err(EngineError::StopFailed { .. })));
        assert_eq!(camera.state(), Stopped);
        assert_eq!(engine.count("reset_capture_graph"), 1);
    }

    #[test]
    fn uninitialize_reaches_the_engine_once() {
        let (camera, engine, _) = initialized();
        camera.uninitialize().unwrap();
        assert!(camera.uninitialize().is_err());
        assert_eq!(engine.count("destroy_capture_graph"), 1);
    }

    #[test]
    fn drop_stops_destroys_then_unloads_even_when_stop_fails() {
        let (camera, engine, devices) = initialized();
        camera.start_capture(&devices[0]).unwrap();
        engine.set_code("stop", E_ACCESSDENIED);
        engine.clear();

        drop(camera);

        assert_eq!(engine.calls(), ["stop", "reset_capture_graph", "destroy_capture_graph", "unload"]);
    }
}
