use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use webeye_core::{DeviceIdentity, EngineError, EngineEvent, EngineState};
use webeye_native::CallbackSink;

use crate::catalog::DeviceCollector;
use crate::events::EventHub;

/// State shared between a proxy and the engine threads calling back into
/// it. `state` is the only place the lifecycle state lives.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: Mutex<EngineState>,
    pub(crate) events: EventHub,
    pub(crate) devices: DeviceCollector,
}

impl Shared {
    pub(crate) fn state(&self) -> EngineState {
        *self.lock()
    }

    /// Fails with `InvalidState` unless the current state is one of `allowed`.
    pub(crate) fn require(&self, operation: &'static str, allowed: &[EngineState]) -> Result<EngineState, EngineError> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(EngineError::InvalidState { operation, state })
        }
    }

    /// Sets the state, returning the previous one.
    pub(crate) fn set(&self, state: EngineState) -> EngineState {
        std::mem::replace(&mut *self.lock(), state)
    }

    /// Moves `from` → `to` atomically; false if the state was not `from`.
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        let mut state = self.lock();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallbackSink for Shared {
    fn on_started(&self) {
        if self.state().is_active() {
            self.events.emit(EngineEvent::Started);
        } else {
            debug!("Ignoring stale started notification ({})", self.state());
        }
    }

    fn on_stopped(&self) {
        if self.transition(EngineState::Active, EngineState::Stopped) {
            self.events.emit(EngineEvent::Stopped);
        }
    }

    fn on_failed(&self, message: Option<String>) {
        if self.transition(EngineState::Active, EngineState::Stopped) {
            warn!("Stream failed: {}", message.as_deref().unwrap_or("no details"));
            self.events.emit(EngineEvent::Failed { message });
        } else {
            debug!("Ignoring failure notification outside an active session");
        }
    }

    fn on_device(&self, device: DeviceIdentity) {
        self.devices.push(device);
    }
}
