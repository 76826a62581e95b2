//! webeye-native: loads an engine build at runtime and talks to it.
//!
//! ```text
//! PayloadSet::for_current()            (x86 / x64 build bytes)
//!   │  NativeLibrary::load → <temp>/webeye-<uuid>.dll, LoadLibrary / dlopen
//!   ▼
//! NativePlayer / NativeCapture         (typed extern "system" exports)
//!   │  PlayerApi / CaptureApi          (raw result codes)
//!   ▼
//! engine threads ──▶ Trampolines[slot] ──▶ CallbackSink (host)
//! ```
//!
//! Unloading closes the module first and deletes the temp file afterwards.

pub mod api;
pub mod bridge;
pub mod capture;
pub mod hresult;
pub mod loader;
pub mod marshal;
mod memory;
pub mod params;
pub mod payload;
pub mod player;

pub use api::{CaptureApi, PlayOptions, PlayerApi};
pub use bridge::{CallbackBridge, CallbackSink, Trampolines};
pub use capture::NativeCapture;
pub use loader::NativeLibrary;
pub use marshal::WideBstr;
pub use params::{DeviceCallback, EngineParams, MessageCallback, ParamsV1, ParamsV2, VideoInputDeviceInfo, VoidCallback};
pub use payload::{PayloadArch, PayloadSet};
pub use player::NativePlayer;
