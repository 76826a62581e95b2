use std::ffi::c_void;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// MARK: - FrameSize

/// Dimensions of the video the engine is currently producing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const ZERO: Self = Self { width: 0, height: 0 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - PixelFormat

/// Pixel layouts a DIB frame may carry, keyed by bits per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Indexed1,
    Indexed4,
    Indexed8,
    Rgb555,
    Rgb24,
    Rgb32,
}

impl PixelFormat {
    pub fn from_bit_count(bits: u16) -> Option<Self> {
        match bits {
            1 => Some(Self::Indexed1),
            4 => Some(Self::Indexed4),
            8 => Some(Self::Indexed8),
            16 => Some(Self::Rgb555),
            24 => Some(Self::Rgb24),
            32 => Some(Self::Rgb32),
            _ => None,
        }
    }

    pub fn bits_per_pixel(self) -> u16 {
        match self {
            Self::Indexed1 => 1,
            Self::Indexed4 => 4,
            Self::Indexed8 => 8,
            Self::Rgb555 => 16,
            Self::Rgb24 => 24,
            Self::Rgb32 => 32,
        }
    }

    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Indexed1 | Self::Indexed4 | Self::Indexed8)
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Indexed1 => write!(f, "1bpp indexed"),
            Self::Indexed4 => write!(f, "4bpp indexed"),
            Self::Indexed8 => write!(f, "8bpp indexed"),
            Self::Rgb555 => write!(f, "RGB555"),
            Self::Rgb24 => write!(f, "RGB24"),
            Self::Rgb32 => write!(f, "RGB32"),
        }
    }
}

// MARK: - WindowHandle

/// Raw native window handle (HWND) the engine renders into. `NONE` means
/// the engine renders nowhere and frames are only pulled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub usize);

impl WindowHandle {
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

// MARK: - Frame

/// A decoded frame owned by the caller. Rows are stored top-down, each
/// `stride` bytes long (4-byte aligned, trailing padding included).
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
}

impl Frame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Returns row `y` (0 = top), padding included.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.data.get(start..start + self.stride)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.stride.max(1))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

// MARK: - DeviceIdentity

/// A capture device as reported by enumeration. Two identities are the same
/// device only when both the name and the path match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    name: String,
    device_path: String,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, device_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_path: device_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque path handed back to the engine when selecting the device.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// MARK: - StreamSource

/// What the streaming engine should open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamSource {
    /// Network or file URL (`rtsp://`, `http://`, `file://`, plain path).
    Url(String),
    /// Local capture device opened by friendly name.
    LocalDevice(String),
}

impl StreamSource {
    /// Human-readable name of the source.
    pub fn name(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::LocalDevice(name) => name,
        }
    }

    /// The string passed to the engine's open call.
    pub fn locator(&self) -> String {
        match self {
            Self::Url(url) => match url.strip_prefix("file://") {
                Some(path) => local_path(path).to_string(),
                None => url.clone(),
            },
            Self::LocalDevice(name) => format!("video={name}"),
        }
    }

    /// True when the engine would be handed nothing to open: an empty or
    /// whitespace-only name, or a `file://` URL without a path.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Url(_) => matches!(self.locator().trim(), "" | "/"),
            Self::LocalDevice(name) => name.trim().is_empty(),
        }
    }
}

// `file:///C:/clip.mp4` → `C:/clip.mp4`, `file:///tmp/clip.mp4` → `/tmp/clip.mp4`
fn local_path(path: &str) -> &str {
    let bytes = path.as_bytes();
    let drive_letter = bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':';
    if drive_letter {
        &path[1..]
    } else {
        path
    }
}

impl From<&str> for StreamSource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for StreamSource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl std::fmt::Display for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// MARK: - EngineState

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initialized,
    Active,
    Stopped,
}

impl EngineState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Active => write!(f, "active"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// MARK: - EngineEvent

/// Notifications delivered to host subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Stopped,
    Failed { message: Option<String> },
}
