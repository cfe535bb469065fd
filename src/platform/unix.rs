//! procfs-backed resolution for Unix hosts.

use std::fs;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{HostError, Result};

pub(crate) fn path_from_fd(fd: RawFd) -> Result<PathBuf> {
    let link = format!("/proc/self/fd/{fd}");
    fs::read_link(&link).map_err(|err| {
        debug!(fd, %err, "fd does not resolve to a filesystem path");
        HostError::PathResolution(format!("fd {fd}: {err}"))
    })
}

pub(crate) fn path_from_process(pid: u32) -> Result<PathBuf> {
    let link = format!("/proc/{pid}/exe");
    fs::read_link(&link).map_err(|err| {
        debug!(pid, %err, "process image path query failed");
        HostError::PathResolution(format!("pid {pid}: {err}"))
    })
}
