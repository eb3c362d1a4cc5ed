//! Working-directory helpers.
//!
//! Several passes of the updater depend on the process working directory as
//! implicit context and must restore it on every exit path, including
//! errors. [`CwdGuard`] implements the open-dot/fchdir discipline as a
//! scoped guard.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use crate::error::WaaError;

/// Longest supported working-directory path.
const CWD_MAX: usize = 8 << 10;

/// Returns the current working directory.
///
/// If the cwd has been removed we get `ENOENT`, but returning that would
/// not necessarily signal a fatal error to all callers, so it is mapped to
/// the dedicated [`WaaError::CwdRemoved`].
pub fn save_cwd() -> Result<PathBuf, WaaError> {
    let cwd = std::env::current_dir().map_err(|err| {
        if err.raw_os_error() == Some(libc::ENOENT) {
            WaaError::CwdRemoved
        } else {
            WaaError::io("getcwd", PathBuf::new(), err)
        }
    })?;
    if cwd.as_os_str().len() > CWD_MAX {
        return Err(WaaError::PathTooLong(CWD_MAX));
    }
    Ok(cwd)
}

/// Scoped guard that restores the working directory on drop.
///
/// Created *before* a `chdir`, it holds an open handle on `.` and issues
/// `fchdir` when dropped, so even a cwd whose path has meanwhile been
/// renamed or unlinked is restored correctly.
#[derive(Debug)]
pub struct CwdGuard {
    dir: File,
}

impl CwdGuard {
    /// Opens the current directory for later restoration.
    pub fn new() -> Result<Self, WaaError> {
        let dir = File::open(".").map_err(|err| WaaError::io("open", ".", err))?;
        Ok(Self { dir })
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        // SAFETY: fchdir only reads the descriptor, which stays open until
        // self.dir is dropped afterwards.
        let rc = unsafe { libc::fchdir(self.dir.as_raw_fd()) };
        if rc == -1 {
            tracing::warn!(
                "cannot fchdir() back to the saved directory: {}",
                io::Error::last_os_error()
            );
        }
    }
}
