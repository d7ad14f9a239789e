//! Per-run scratch directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};

/// RAII wrapper for the directory holding downloads and extracted members
///
/// The directory is recreated empty on construction and removed when the
/// guard is dropped, on success, error return or unwinding alike.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `path` fresh, removing a stale directory of the same name first.
    pub fn create(path: PathBuf) -> Result<Self> {
        match fs::remove_dir_all(&path) {
            Ok(()) => debug!("Removed stale scratch directory {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::io(format!("failed to remove {}", path.display()), e));
            }
        }
        fs::create_dir_all(&path)
            .map_err(|e| Error::io(format!("failed to create {}", path.display()), e))?;
        Ok(Self { path })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove scratch directory {}: {e}", self.path.display());
        }
    }
}
