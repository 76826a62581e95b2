//! Native-to-host callback plumbing.
//!
//! The engine takes bare function pointers with no user-data argument, so
//! every registration gets a slot from a fixed pool and the pointers handed
//! to the engine are that slot's trampolines. A trampoline looks up the sink
//! registered in its slot and forwards the decoded notification.

use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, trace};
use webeye_core::{DeviceIdentity, EngineError};

use crate::marshal;
use crate::params::{DeviceCallback, MessageCallback, VideoInputDeviceInfo, VoidCallback};

/// Receives engine notifications. Called on engine threads.
pub trait CallbackSink: Send + Sync {
    fn on_started(&self);
    fn on_stopped(&self);
    fn on_failed(&self, message: Option<String>);
    fn on_device(&self, _device: DeviceIdentity) {}
}

/// Number of bridges that can be registered at the same time.
pub const SLOT_COUNT: usize = 64;

type Slot = RwLock<Option<Arc<dyn CallbackSink>>>;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Slot = RwLock::new(None);

static SLOTS: [Slot; SLOT_COUNT] = [EMPTY_SLOT; SLOT_COUNT];

/// Where the next free-slot search starts. Rotating keeps a just-released
/// slot out of reuse for as long as possible.
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

enum Notification {
    Started,
    Stopped,
    Failed(Option<String>),
    Device(DeviceIdentity),
}

fn dispatch(slot: usize, notification: Notification) {
    let sink = SLOTS[slot].read().unwrap_or_else(PoisonError::into_inner).clone();
    let Some(sink) = sink else {
        trace!("Engine callback on released slot {} dropped", slot);
        return;
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match notification {
        Notification::Started => sink.on_started(),
        Notification::Stopped => sink.on_stopped(),
        Notification::Failed(message) => sink.on_failed(message),
        Notification::Device(device) => sink.on_device(device),
    }));
    if outcome.is_err() {
        error!("Callback sink panicked (slot {})", slot);
    }
}

unsafe fn dispatch_message(slot: usize, message: *const c_char) {
    let message = unsafe { marshal::read_ansi(message) };
    dispatch(slot, Notification::Failed(message));
}

unsafe fn dispatch_device(slot: usize, info: *const VideoInputDeviceInfo) {
    let Some(info) = (unsafe { info.as_ref() }) else { return };
    let name = unsafe { marshal::read_bstr(info.friendly_name) };
    let path = unsafe { marshal::read_bstr(info.device_path) };
    dispatch(slot, Notification::Device(DeviceIdentity::new(name, path)));
}

// ── Trampolines ───────────────────────────────────────────────────────────────

/// Entry points bound to one slot.
#[derive(Clone, Copy)]
pub struct Trampolines {
    pub started: VoidCallback,
    pub stopped: VoidCallback,
    pub failed: VoidCallback,
    pub failed_with_message: MessageCallback,
    pub device: DeviceCallback,
}

macro_rules! trampoline_table {
    ($($slot:literal)*) => {
        [$(
            Trampolines {
                started: {
                    unsafe extern "system" fn started() {
                        dispatch($slot, Notification::Started)
                    }
                    started
                },
                stopped: {
                    unsafe extern "system" fn stopped() {
                        dispatch($slot, Notification::Stopped)
                    }
                    stopped
                },
                failed: {
                    unsafe extern "system" fn failed() {
                        dispatch($slot, Notification::Failed(None))
                    }
                    failed
                },
                failed_with_message: {
                    unsafe extern "system" fn failed_with_message(message: *const c_char) {
                        unsafe { dispatch_message($slot, message) }
                    }
                    failed_with_message
                },
                device: {
                    unsafe extern "system" fn device(info: *const VideoInputDeviceInfo) {
                        unsafe { dispatch_device($slot, info) }
                    }
                    device
                },
            },
        )*]
    };
}

static TRAMPOLINES: [Trampolines; SLOT_COUNT] = trampoline_table!(
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
    48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
);

// ── CallbackBridge ────────────────────────────────────────────────────────────

/// A registered sink. The slot is freed when the bridge is dropped, so drop
/// it only once the engine can no longer call back.
pub struct CallbackBridge {
    slot: usize,
}

impl CallbackBridge {
    pub fn register(sink: Arc<dyn CallbackSink>) -> Result<Self, EngineError> {
        let start = NEXT_SLOT.load(Ordering::Relaxed);
        for slot in (0..SLOT_COUNT).map(|i| (start + i) % SLOT_COUNT) {
            let mut guard = SLOTS[slot].write().unwrap_or_else(PoisonError::into_inner);
            if guard.is_none() {
                *guard = Some(sink);
                NEXT_SLOT.store((slot + 1) % SLOT_COUNT, Ordering::Relaxed);
                debug!("Callback bridge registered in slot {}", slot);
                return Ok(Self { slot });
            }
        }
        Err(EngineError::CallbackSlotsExhausted { capacity: SLOT_COUNT })
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn trampolines(&self) -> &'static Trampolines {
        &TRAMPOLINES[self.slot]
    }
}

impl Drop for CallbackBridge {
    fn drop(&mut self) {
        *SLOTS[self.slot].write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Callback bridge slot {} released", self.slot);
    }
}

impl std::fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBridge").field("slot", &self.slot).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::WideBstr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl CallbackSink for Recorder {
        fn on_started(&self) {
            self.seen.lock().unwrap().push("started".into());
        }
        fn on_stopped(&self) {
            self.seen.lock().unwrap().push("stopped".into());
        }
        fn on_failed(&self, message: Option<String>) {
            self.seen.lock().unwrap().push(format!("failed:{}", message.unwrap_or_default()));
        }
        fn on_device(&self, device: DeviceIdentity) {
            self.seen.lock().unwrap().push(format!("device:{}|{}", device.name(), device.device_path()));
        }
    }

    #[test]
    fn trampolines_reach_the_registered_sink() {
        let sink = Arc::new(Recorder::default());
        let bridge = CallbackBridge::register(sink.clone()).expect("free slot");
        let t = bridge.trampolines();

        unsafe {
            (t.started)();
            (t.failed)();
            (t.failed_with_message)(b"no route to host\0".as_ptr().cast());
            (t.stopped)();
        }

        assert_eq!(sink.seen(), ["started", "failed:", "failed:no route to host", "stopped"]);
    }

    #[test]
    fn callbacks_from_engine_threads_are_delivered() {
        let sink = Arc::new(Recorder::default());
        let bridge = CallbackBridge::register(sink.clone()).expect("free slot");
        let started = bridge.trampolines().started;

        std::thread::spawn(move || unsafe { started() }).join().expect("engine thread");

        assert_eq!(sink.seen(), ["started"]);
    }

    #[test]
    fn device_trampoline_decodes_bstrs() {
        let sink = Arc::new(Recorder::default());
        let bridge = CallbackBridge::register(sink.clone()).expect("free slot");
        let name = WideBstr::new("HD Webcam");
        let path = WideBstr::new(r"\\?\usb#vid_046d");
        let info = VideoInputDeviceInfo {
            friendly_name: name.as_ptr(),
            device_path: path.as_ptr(),
        };

        unsafe { (bridge.trampolines().device)(&info) };

        assert_eq!(sink.seen(), [r"device:HD Webcam|\\?\usb#vid_046d"]);
    }

    #[test]
    fn released_slot_ignores_late_callbacks() {
        let sink = Arc::new(Recorder::default());
        let bridge = CallbackBridge::register(sink.clone()).expect("free slot");
        let started = bridge.trampolines().started;
        drop(bridge);

        unsafe { started() };

        assert!(sink.seen().is_empty());
    }

    #[test]
    fn distinct_bridges_get_distinct_slots() {
        let a = CallbackBridge::register(Arc::new(Recorder::default())).expect("free slot");
        let b = CallbackBridge::register(Arc::new(Recorder::default())).expect("free slot");
        assert_ne!(a.slot(), b.slot());
        assert_ne!(a.trampolines().started as usize, b.trampolines().started as usize);
    }
}
