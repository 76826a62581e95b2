use std::borrow::Cow;

use webeye_core::EngineError;

/// Architecture a payload build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadArch {
    X86,
    X64,
}

impl PayloadArch {
    /// The build the running process can load.
    pub const fn current() -> Self {
        if cfg!(target_pointer_width = "32") {
            Self::X86
        } else {
            Self::X64
        }
    }
}

impl std::fmt::Display for PayloadArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::X64 => write!(f, "x64"),
        }
    }
}

/// Engine payload builds, one per architecture. Usually `include_bytes!`
/// data, but owned bytes read at runtime work too.
#[derive(Clone, Default)]
pub struct PayloadSet {
    x86: Option<Cow<'static, [u8]>>,
    x64: Option<Cow<'static, [u8]>>,
}

impl PayloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, arch: PayloadArch, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        let slot = match arch {
            PayloadArch::X86 => &mut self.x86,
            PayloadArch::X64 => &mut self.x64,
        };
        *slot = Some(bytes.into());
        self
    }

    pub fn select(&self, arch: PayloadArch) -> Result<&[u8], EngineError> {
        let bytes = match arch {
            PayloadArch::X86 => self.x86.as_deref(),
            PayloadArch::X64 => self.x64.as_deref(),
        };
        bytes.ok_or_else(|| EngineError::PayloadMissing { arch: arch.to_string() })
    }

    pub fn for_current(&self) -> Result<&[u8], EngineError> {
        self.select(PayloadArch::current())
    }
}

impl std::fmt::Debug for PayloadSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSet")
            .field("x86", &self.x86.as_ref().map(|b| b.len()))
            .field("x64", &self.x64.as_ref().map(|b| b.len()))
            .finish()
    }
}
