use std::ptr::NonNull;

/// Frees a frame buffer with the allocator the engines use when they do not
/// export their own release routine: the COM task allocator.
#[cfg(target_os = "windows")]
pub(crate) fn release_with_system_allocator(ptr: NonNull<u8>) {
    // SAFETY: engine frames come from CoTaskMemAlloc and are freed once.
    unsafe { windows::Win32::System::Com::CoTaskMemFree(Some(ptr.as_ptr() as *const std::ffi::c_void)) }
}

/// Frees a frame buffer with `free`, which engine builds off Windows use
/// when they do not export their own release routine.
#[cfg(not(target_os = "windows"))]
pub(crate) fn release_with_system_allocator(ptr: NonNull<u8>) {
    // SAFETY: engine frames come from `malloc` and are freed once.
    unsafe { libc::free(ptr.as_ptr().cast()) }
}
