use std::ffi::CString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use webeye_core::{EngineError, EngineState, Frame, FrameDecodeError, FrameSize, PlayerConfig, StreamSource, WindowHandle};
use webeye_native::{CallbackBridge, EngineParams, NativePlayer, PayloadSet, PlayOptions, PlayerApi};

use crate::events::EventHub;
use crate::shared::Shared;
use crate::VideoSource;

use webeye_core::EngineState::{Active, Initialized, Stopped, Uninitialized};

/// Host-side proxy for the streaming engine.
///
/// Calls are serialized per instance; the engine reports progress through
/// [`events`](Self::events) from its own threads. Dropping the player stops
/// the stream, uninitializes the engine, and unloads the module, in that
/// order.
pub struct StreamPlayer<A: PlayerApi = NativePlayer> {
    // Teardown releases these in order: bridge after uninitialize, api last.
    api: Option<A>,
    bridge: Option<CallbackBridge>,
    shared: Arc<Shared>,
    calls: Mutex<()>,
    config: PlayerConfig,
}

impl StreamPlayer<NativePlayer> {
    /// Loads the payload matching this process and binds the engine.
    pub fn load(payloads: &PayloadSet, config: PlayerConfig) -> Result<Self, EngineError> {
        let api = NativePlayer::load(payloads.for_current()?)?;
        Self::with_api(api, config)
    }
}

impl<A: PlayerApi> StreamPlayer<A> {
    pub fn with_api(api: A, config: PlayerConfig) -> Result<Self, EngineError> {
        let shared = Arc::new(Shared::default());
        let bridge = CallbackBridge::register(shared.clone())?;
        Ok(Self {
            api: Some(api),
            bridge: Some(bridge),
            shared,
            calls: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn initialize(&self, window: WindowHandle) -> Result<(), EngineError> {
        let _calls = self.lock_calls();
        self.shared.require("initialize", &[Uninitialized])?;
        let (api, bridge) = self.parts("initialize")?;

        let params = EngineParams::build(self.config.params_layout, window, bridge.trampolines());
        match api.initialize(params) {
            0 => {
                self.shared.set(Initialized);
                info!("Streaming engine initialized ({:?} params)", self.config.params_layout);
                Ok(())
            }
            code => Err(EngineError::InitFailed {
                code,
                message: "the engine rejected its initialization parameters".into(),
            }),
        }
    }

    /// Opens `source` and starts playing it.
    pub fn start(&self, source: impl Into<StreamSource>) -> Result<(), EngineError> {
        let source = source.into();
        if source.is_blank() {
            return Err(EngineError::InvalidArgument {
                reason: "stream source is empty".into(),
            });
        }
        let locator = CString::new(source.locator()).map_err(|_| EngineError::InvalidArgument {
            reason: "stream source contains a NUL character".into(),
        })?;

        let _calls = self.lock_calls();
        let previous = self.shared.require("start", &[Initialized, Stopped])?;
        let (api, _) = self.parts("start")?;

        // Active before the call: the engine may report `started` before
        // `StartPlay` returns.
        self.shared.set(Active);
        match api.start_play(&locator, &PlayOptions::from(&self.config)) {
            0 => {
                info!("Playing {}", source);
                Ok(())
            }
            code => {
                self.shared.set(previous);
                Err(EngineError::StartFailed {
                    code,
                    message: format!("failed to play {source}"),
                })
            }
        }
    }

    pub fn current_frame(&self) -> Result<Frame, EngineError> {
        let _calls = self.lock_calls();
        self.shared.require("current_frame", &[Active])?;
        let (api, _) = self.parts("current_frame")?;

        match api.current_frame() {
            Ok(Some(buffer)) => Ok(webeye_frame::decode(buffer)?),
            Ok(None) => Err(FrameDecodeError::NullBuffer.into()),
            Err(code) => Err(EngineError::FrameUnavailable {
                code,
                message: "the engine has no frame to hand out".into(),
            }),
        }
    }

    pub fn frame_size(&self) -> Result<FrameSize, EngineError> {
        let _calls = self.lock_calls();
        self.shared.require("frame_size", &[Active])?;
        let (api, _) = self.parts("frame_size")?;

        api.frame_size()
            .map(|(width, height)| FrameSize::new(width, height))
            .map_err(|code| EngineError::SizeUnavailable {
                code,
                message: "the engine did not report a frame size".into(),
            })
    }

    /// Stops the stream. The player ends up `Stopped` even when the engine
    /// reports an error.
    pub fn stop(&self) -> Result<(), EngineError> {
        let _calls = self.lock_calls();
        self.shared.require("stop", &[Active])?;
        let (api, _) = self.parts("stop")?;

        let code = api.stop();
        self.shared.set(Stopped);
        match code {
            0 => {
                info!("Stream stopped");
                Ok(())
            }
            code => Err(EngineError::StopFailed {
                code,
                message: "the engine failed to stop the stream".into(),
            }),
        }
    }

    /// Releases the engine's resources. A second call fails with
    /// `InvalidState` without reaching the engine.
    pub fn uninitialize(&self) -> Result<(), EngineError> {
        let _calls = self.lock_calls();
        self.shared.require("uninitialize", &[Initialized, Active, Stopped])?;
        let (api, _) = self.parts("uninitialize")?;

        self.shared.set(Uninitialized);
        match api.uninitialize() {
            0 => {
                info!("Streaming engine uninitialized");
                Ok(())
            }
            code => Err(EngineError::UninitializeFailed {
                code,
                message: "the engine failed to release its resources".into(),
            }),
        }
    }

    /// Stops, uninitializes, releases the callbacks, and unloads the
    /// engine. Every step runs; the first error is returned.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.teardown()
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
                warn!("Uninitialize during shutdown failed: {}", e);
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

    fn lock_calls(&self) -> MutexGuard<'_, ()> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: PlayerApi> VideoSource for StreamPlayer<A> {
    fn stop(&self) -> Result<(), EngineError> {
        StreamPlayer::stop(self)
    }

    fn current_frame(&self) -> Result<Frame, EngineError> {
        StreamPlayer::current_frame(self)
    }

    fn frame_size(&self) -> Result<FrameSize, EngineError> {
        StreamPlayer::frame_size(self)
    }

    fn is_active(&self) -> bool {
        self.shared.state().is_active()
    }

    fn events(&self) -> &EventHub {
        &self.shared.events
    }
}

impl<A: PlayerApi> Drop for StreamPlayer<A> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Streaming engine shut down with errors: {}", e);
        }
    }
}
