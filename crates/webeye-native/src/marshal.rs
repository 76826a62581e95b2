//! String marshaling across the engine boundary: BSTR device strings in both
//! directions, ANSI error messages inbound.

use std::ffi::{c_char, CStr};

use widestring::{U16Str, U16String};

/// A BSTR-compatible string owned by Rust: a 32-bit byte-length prefix,
/// UTF-16 code units, and a NUL terminator. Valid for as long as it lives.
#[derive(Clone, PartialEq, Eq)]
pub struct WideBstr {
    // u32 storage keeps the prefix aligned.
    words: Vec<u32>,
    units: usize,
}

impl WideBstr {
    pub fn new(text: &str) -> Self {
        let wide = U16String::from_str(text);
        let units = wide.len();
        // prefix + units + terminator, rounded up to whole words
        let mut words = vec![0u32; 1 + (units + 2) / 2];
        words[0] = u32::try_from(units * 2).unwrap_or(u32::MAX);
        // SAFETY: `words[1..]` spans at least `units + 1` u16 slots.
        let data = unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr().add(1).cast::<u16>(), units) };
        data.copy_from_slice(wide.as_slice());
        Self { words, units }
    }

    /// Pointer to the first code unit, as BSTR parameters expect.
    pub fn as_ptr(&self) -> *const u16 {
        // SAFETY: `words` always holds the prefix word.
        unsafe { self.words.as_ptr().add(1).cast::<u16>() }
    }

    /// Length in UTF-16 code units.
    pub fn len(&self) -> usize {
        self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units == 0
    }
}

impl std::fmt::Debug for WideBstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SAFETY: `as_ptr` points at a valid BSTR owned by `self`.
        f.debug_tuple("WideBstr").field(&unsafe { read_bstr(self.as_ptr()) }).finish()
    }
}

/// Reads a BSTR using its length prefix. Null reads as empty.
///
/// # Safety
///
/// `ptr` must be null or point at a live BSTR.
pub unsafe fn read_bstr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let byte_len = unsafe { ptr.cast::<u32>().sub(1).read_unaligned() } as usize;
    unsafe { U16Str::from_ptr(ptr, byte_len / 2) }.to_string_lossy()
}

/// Reads a NUL-terminated message in the engine's narrow encoding: the
/// active ANSI code page on Windows, UTF-8 elsewhere. Null reads as `None`.
///
/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string.
pub unsafe fn read_ansi(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Some(decode_narrow(bytes))
}

#[cfg(target_os = "windows")]
fn decode_narrow(bytes: &[u8]) -> String {
    use windows::Win32::Globalization::{MultiByteToWideChar, CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS};

    if bytes.is_empty() {
        return String::new();
    }
    // SAFETY: both slices are valid for their full length.
    let needed = unsafe { MultiByteToWideChar(CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0), bytes, None) };
    if needed <= 0 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut wide = vec![0u16; needed as usize];
    let written = unsafe { MultiByteToWideChar(CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0), bytes, Some(&mut wide)) };
    wide.truncate(written.max(0) as usize);
    String::from_utf16_lossy(&wide)
}

#[cfg(not(target_os = "windows"))]
fn decode_narrow(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
