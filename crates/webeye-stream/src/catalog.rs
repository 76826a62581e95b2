use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};
use webeye_core::DeviceIdentity;
use webeye_native::{CallbackBridge, CaptureApi};

/// Buffer the per-device callback fills during one enumeration.
#[derive(Debug, Default)]
pub(crate) struct DeviceCollector {
    entries: Mutex<Option<Vec<DeviceIdentity>>>,
}

impl DeviceCollector {
    /// Runs `enumerate` with a fresh buffer and returns what it collected.
    pub(crate) fn collect(&self, enumerate: impl FnOnce()) -> Vec<DeviceIdentity> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = Some(Vec::new());
        // The lock is released here: the callback needs it.
        enumerate();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default()
    }

    pub(crate) fn push(&self, device: DeviceIdentity) {
        if device.device_path().is_empty() {
            trace!("Skipping device without a path: {}", device);
            return;
        }
        match self.entries.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            Some(entries) => entries.push(device),
            None => debug!("Device reported outside an enumeration: {}", device),
        }
    }
}

/// Lists the capture devices the engine can see.
pub struct DeviceCatalog<'a, A: CaptureApi> {
    api: &'a A,
    bridge: &'a CallbackBridge,
    collector: &'a DeviceCollector,
}

impl<'a, A: CaptureApi> DeviceCatalog<'a, A> {
    pub(crate) fn new(api: &'a A, bridge: &'a CallbackBridge, collector: &'a DeviceCollector) -> Self {
        Self { api, bridge, collector }
    }

    /// Enumerates from scratch on every call. Devices reported without a
    /// path are left out.
    pub fn enumerate(&self) -> Vec<DeviceIdentity> {
        let callback = self.bridge.trampolines().device;
        let devices = self.collector.collect(|| self.api.enum_video_input_devices(callback));
        debug!("Enumerated {} capture device(s)", devices.len());
        devices
    }
}
