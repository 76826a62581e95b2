use std::ffi::{c_char, CStr};
use std::ptr::{self, NonNull};

use tracing::debug;
use webeye_core::EngineError;
use webeye_frame::NativeBuffer;

use crate::api::{PlayOptions, PlayerApi};
use crate::loader::NativeLibrary;
use crate::memory::release_with_system_allocator;
use crate::params::{EngineParams, ParamsV1, ParamsV2};

/// Export names of the streaming engine.
pub mod symbol {
    pub const INITIALIZE: &str = "Initialize";
    pub const START_PLAY: &str = "StartPlay";
    pub const GET_CURRENT_FRAME: &str = "GetCurrentFrame";
    pub const GET_FRAME_SIZE: &str = "GetFrameSize";
    pub const STOP: &str = "Stop";
    pub const UNINITIALIZE: &str = "Uninitialize";
    pub const FREE_FRAME: &str = "FreeFrame";
}

// `Initialize` takes the params record by value; which record depends on the
// engine build, so the export is bound untyped and cast per call.
type UntypedFn = unsafe extern "system" fn();
type InitializeV1Fn = unsafe extern "system" fn(params: ParamsV1) -> i32;
type InitializeV2Fn = unsafe extern "system" fn(params: ParamsV2) -> i32;
type StartPlayFn = unsafe extern "system" fn(
    url: *const c_char,
    connection_timeout_ms: i32,
    stream_timeout_ms: i32,
    transport: i32,
    flags: i32,
) -> i32;
type GetCurrentFrameFn = unsafe extern "system" fn(dib: *mut *mut u8) -> i32;
type GetFrameSizeFn = unsafe extern "system" fn(width: *mut u32, height: *mut u32) -> i32;
type ControlFn = unsafe extern "system" fn() -> i32;
type FreeFrameFn = unsafe extern "system" fn(dib: *mut u8);

#[derive(Clone, Copy)]
struct PlayerFunctions {
    initialize: UntypedFn,
    start_play: StartPlayFn,
    get_current_frame: GetCurrentFrameFn,
    get_frame_size: GetFrameSizeFn,
    stop: ControlFn,
    uninitialize: ControlFn,
    free_frame: Option<FreeFrameFn>,
}

/// The streaming engine, bound over a loaded module.
pub struct NativePlayer {
    functions: PlayerFunctions,
    library: NativeLibrary,
}

impl NativePlayer {
    pub fn load(payload: &[u8]) -> Result<Self, EngineError> {
        Self::bind(NativeLibrary::load(payload)?)
    }

    /// Resolves every export. Fails on the first missing required one.
    pub fn bind(library: NativeLibrary) -> Result<Self, EngineError> {
        // SAFETY: the types mirror the streaming engine's exports.
        let functions = unsafe {
            PlayerFunctions {
                initialize: library.resolve(symbol::INITIALIZE)?,
                start_play: library.resolve(symbol::START_PLAY)?,
                get_current_frame: library.resolve(symbol::GET_CURRENT_FRAME)?,
                get_frame_size: library.resolve(symbol::GET_FRAME_SIZE)?,
                stop: library.resolve(symbol::STOP)?,
                uninitialize: library.resolve(symbol::UNINITIALIZE)?,
                free_frame: library.resolve_optional(symbol::FREE_FRAME),
            }
        };
        debug!(
            "Bound streaming engine exports (FreeFrame {})",
            if functions.free_frame.is_some() { "exported" } else { "absent" }
        );
        Ok(Self { functions, library })
    }

    pub fn library(&self) -> &NativeLibrary {
        &self.library
    }
}

impl PlayerApi for NativePlayer {
    fn initialize(&self, params: EngineParams) -> i32 {
        // SAFETY: `Initialize` accepts the record layout the configuration
        // selected for this engine build.
        unsafe {
            match params {
                EngineParams::V1(p) => {
                    let f: InitializeV1Fn = std::mem::transmute(self.functions.initialize);
                    f(p)
                }
                EngineParams::V2(p) => {
                    let f: InitializeV2Fn = std::mem::transmute(self.functions.initialize);
                    f(p)
                }
            }
        }
    }

    fn start_play(&self, url: &CStr, options: &PlayOptions) -> i32 {
        unsafe {
            (self.functions.start_play)(
                url.as_ptr(),
                options.connection_timeout_ms,
                options.stream_timeout_ms,
                options.transport,
                options.flags,
            )
        }
    }

    fn current_frame(&self) -> Result<Option<NativeBuffer>, i32> {
        let mut dib: *mut u8 = ptr::null_mut();
        let code = unsafe { (self.functions.get_current_frame)(&mut dib) };
        if code != 0 {
            return Err(code);
        }
        let free_frame = self.functions.free_frame;
        // SAFETY: on success the engine hands out a complete DIB it no
        // longer touches.
        Ok(unsafe {
            NativeBuffer::from_raw(dib, move |ptr: NonNull<u8>| match free_frame {
                Some(free) => free(ptr.as_ptr()),
                None => release_with_system_allocator(ptr),
            })
        })
    }

    fn frame_size(&self) -> Result<(u32, u32), i32> {
        let (mut width, mut height) = (0u32, 0u32);
        match unsafe { (self.functions.get_frame_size)(&mut width, &mut height) } {
            0 => Ok((width, height)),
            code => Err(code),
        }
    }

    fn stop(&self) -> i32 {
        unsafe { (self.functions.stop)() }
    }

    fn uninitialize(&self) -> i32 {
        unsafe { (self.functions.uninitialize)() }
    }
}
