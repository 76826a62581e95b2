use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webeye_core::EngineError;

// ── PayloadFile ───────────────────────────────────────────────────────────────

/// A payload written to a private temp file. Deleted on drop unless kept.
pub(crate) struct PayloadFile {
    path: Option<PathBuf>,
}

impl PayloadFile {
    pub(crate) fn extract(payload: &[u8]) -> io::Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "webeye-{}{}",
            Uuid::new_v4().simple(),
            std::env::consts::DLL_SUFFIX
        ));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        let guard = Self { path: Some(path) };

        file.write_all(payload)?;
        file.sync_all()?;
        Ok(guard)
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PayloadFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove_payload(&path);
        }
    }
}

fn remove_payload(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed engine payload {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove engine payload {}: {}", path.display(), e),
    }
}

// ── NativeLibrary ─────────────────────────────────────────────────────────────

/// A loaded engine module plus the temp file it was loaded from.
pub struct NativeLibrary {
    library: Option<Library>,
    path: PathBuf,
}

impl NativeLibrary {
    /// Writes `payload` to a fresh temp file and loads it.
    pub fn load(payload: &[u8]) -> Result<Self, EngineError> {
        let file = PayloadFile::extract(payload)?;
        // SAFETY: loading runs the module's initializers; the payload is the
        // engine build this process ships with.
        let library = unsafe { Library::new(file.path()) }.map_err(load_failed)?;
        let path = file.keep();
        info!("Loaded native engine from {} ({} bytes)", path.display(), payload.len());
        Ok(Self {
            library: Some(library),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up `symbol` as a value of type `T`.
    ///
    /// # Safety
    ///
    /// `T` must be the function pointer type matching the export's real
    /// signature and calling convention.
    pub unsafe fn resolve<T: Copy>(&self, symbol: &str) -> Result<T, EngineError> {
        unsafe { self.resolve_optional(symbol) }.ok_or_else(|| EngineError::BindFailed {
            symbol: symbol.to_string(),
        })
    }

    /// Like [`resolve`](Self::resolve) for exports older builds may lack.
    ///
    /// # Safety
    ///
    /// Same contract as [`resolve`](Self::resolve).
    pub unsafe fn resolve_optional<T: Copy>(&self, symbol: &str) -> Option<T> {
        let library = self.library.as_ref()?;
        match unsafe { library.get::<T>(symbol.as_bytes()) } {
            Ok(found) => Some(*found),
            Err(e) => {
                debug!("Symbol `{}` not found: {}", symbol, e);
                None
            }
        }
    }

    /// Unloads the module, then deletes the temp file.
    pub fn unload(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(library) = self.library.take() else { return };
        if let Err(e) = library.close() {
            warn!("Native engine did not unload cleanly: {}", e);
        }
        remove_payload(&self.path);
        info!("Unloaded native engine {}", self.path.display());
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("loaded", &self.library.is_some())
            .finish()
    }
}

fn load_failed(err: libloading::Error) -> EngineError {
    let code = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .and_then(io::Error::raw_os_error);
    EngineError::LoadFailed {
        code,
        reason: err.to_string(),
    }
}
