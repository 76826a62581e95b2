use std::ptr::NonNull;

use webeye_core::FrameDecodeError;

type Release = Box<dyn FnOnce(NonNull<u8>) + Send>;

/// A frame buffer handed out by the engine. Dropping it hands the memory
/// back to whoever allocated it, exactly once.
pub struct NativeBuffer {
    ptr: NonNull<u8>,
    /// Known extent of the allocation. `None` for engine memory, whose
    /// extent is only described by the frame header.
    len: Option<usize>,
    release: Option<Release>,
}

// SAFETY: the buffer is exclusively owned once the engine hands it out and
// the release routine is `Send`.
unsafe impl Send for NativeBuffer {}

impl NativeBuffer {
    /// Wraps an engine-allocated frame. Returns `None` for a null pointer,
    /// in which case `release` is never called.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a frame header followed by the pixel data the
    /// header describes, valid until `release` runs.
    pub unsafe fn from_raw<F>(ptr: *mut u8, release: F) -> Option<Self>
    where
        F: FnOnce(NonNull<u8>) + Send + 'static,
    {
        NonNull::new(ptr).map(|ptr| Self {
            ptr,
            len: None,
            release: Some(Box::new(release)),
        })
    }

    /// Wraps a buffer owned by Rust; reads past its end are refused.
    pub fn from_boxed(bytes: Box<[u8]>) -> Self {
        let len = bytes.len();
        let raw = Box::into_raw(bytes).cast::<u8>();
        let ptr = NonNull::new(raw).unwrap_or(NonNull::dangling());
        Self {
            ptr,
            len: Some(len),
            release: Some(Box::new(move |ptr: NonNull<u8>| {
                // SAFETY: `ptr` and `len` describe the slice leaked by
                // `Box::into_raw` above, reclaimed only here.
                let slice = std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len);
                drop(unsafe { Box::from_raw(slice) });
            })),
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Views the first `len` bytes.
    ///
    /// # Safety
    ///
    /// For engine buffers the caller must have derived `len` from the frame
    /// header the engine wrote.
    pub(crate) unsafe fn bytes(&self, len: usize) -> Result<&[u8], FrameDecodeError> {
        if let Some(known) = self.len {
            if len > known {
                return Err(FrameDecodeError::InvalidHeader {
                    reason: format!("header describes {len} bytes but buffer holds {known}"),
                });
            }
        }
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), len) })
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.ptr);
        }
    }
}

impl std::fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
