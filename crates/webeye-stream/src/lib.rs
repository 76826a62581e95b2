//! webeye-stream: what a host application talks to.
//!
//! Two proxies share one lifecycle:
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──start──▶ Active ──stop──▶ Stopped
//!       ▲                                                 ▲                │
//!       └───────────────────── uninitialize ──────────────┼────────────────┤
//!                                                         └────start───────┘
//! ```
//!
//! * [`StreamPlayer`] plays network and file streams (RTSP, HTTP, files,
//!   local devices by name) and reports progress through engine callbacks.
//! * [`WebCamera`] drives a capture graph over the local devices returned by
//!   [`WebCamera::list_devices`].

pub mod capture;
mod catalog;
pub mod events;
pub mod player;
mod shared;

#[cfg(test)]
mod testing;

pub use capture::WebCamera;
pub use events::{EventHub, SubscriptionId};
pub use player::StreamPlayer;

use webeye_core::{EngineError, EngineEvent, Frame, FrameSize};

/// Operations both proxies offer once a source is running.
pub trait VideoSource {
    fn stop(&self) -> Result<(), EngineError>;
    fn current_frame(&self) -> Result<Frame, EngineError>;
    fn frame_size(&self) -> Result<FrameSize, EngineError>;
    fn is_active(&self) -> bool;
    fn events(&self) -> &EventHub;

    /// Frame size for layout purposes: zero while nothing is playing.
    fn display_size(&self) -> Result<FrameSize, EngineError> {
        if self.is_active() {
            self.frame_size()
        } else {
            Ok(FrameSize::ZERO)
        }
    }

    fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
        Self: Sized,
    {
        self.events().subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events().unsubscribe(id)
    }
}
