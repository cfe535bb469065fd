//! Path and handle resolution.
//!
//! Pure request/response queries against the host OS: existence checks,
//! canonical paths for open handles and running processes, shortcut-target
//! resolution, and environment probes. No state is retained across calls;
//! every OS handle opened here is scoped to the single call and released on
//! all exit paths.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

#[cfg(not(windows))]
use crate::error::HostError;
use crate::error::Result;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Raw handle of the window that owns any resolver UI; null for none.
pub type WindowHandle = *mut std::ffi::c_void;

/// True iff `path` names an existing non-directory file. A path that cannot
/// be queried at all yields false.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path).map(|meta| !meta.is_dir()).unwrap_or(false)
}

/// True iff `path` names an existing directory. A path that cannot be
/// queried at all yields false.
pub fn directory_exists<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path).map(|meta| meta.is_dir()).unwrap_or(false)
}

/// Resolves the filesystem path backing an already-open file handle.
///
/// Fails when the platform cannot supply one, e.g. a handle to a
/// non-path-backed object.
pub fn path_from_handle(file: &fs::File) -> Result<PathBuf> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        unix::path_from_fd(file.as_raw_fd())
    }
    #[cfg(windows)]
    {
        use std::os::windows::io::AsRawHandle;
        windows::path_from_handle(file.as_raw_handle())
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = file;
        Err(HostError::Unsupported("path from handle"))
    }
}

/// Resolves the backing executable path of the running process `pid`.
///
/// On Windows this is a two-step resolution: the image path is obtained in
/// device-namespace form and then translated to a drive-letter path; failure
/// at either step is propagated, never a partial result.
pub fn path_from_process(pid: u32) -> Result<PathBuf> {
    #[cfg(unix)]
    {
        unix::path_from_process(pid)
    }
    #[cfg(windows)]
    {
        windows::path_from_process(pid)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        Err(HostError::Unsupported("path from process"))
    }
}

/// Resolves a shortcut/link file to its target path.
///
/// The shell may search standard locations if the original target moved;
/// `owner_window` (nullable) owns any UI that search shows. Component
/// initialization is scoped to this single call. Only meaningful on Windows;
/// elsewhere the operation reports [`HostError::Unsupported`].
pub fn resolve_shortcut<P: AsRef<Path>>(
    owner_window: WindowHandle,
    shortcut_path: P,
) -> Result<PathBuf> {
    #[cfg(windows)]
    {
        windows::resolve_shortcut(owner_window, shortcut_path.as_ref())
    }
    #[cfg(not(windows))]
    {
        let _ = (owner_window, shortcut_path.as_ref());
        Err(HostError::Unsupported("shortcut resolution"))
    }
}

/// Whether the current process is a 32-bit process on a 64-bit host.
///
/// An environment probe, not a correctness-critical path: a failed query is
/// treated as not Wow64.
pub fn is_wow64() -> bool {
    #[cfg(windows)]
    {
        windows::is_wow64()
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Blocks until the referenced thread terminates, then releases the handle.
///
/// The wait is unbounded; callers needing a timeout must not use this. A
/// panic in the target thread still counts as termination.
pub fn wait_for_thread<T>(handle: JoinHandle<T>) {
    let _ = handle.join();
}
