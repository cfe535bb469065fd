//! Windows implementations of handle, process, shortcut, and Wow64 queries.
//!
//! Every OS handle and COM resource acquired here is owned by a guard type,
//! so teardown happens on all exit paths, early returns included.

use std::ffi::{c_void, OsString};
use std::iter::once;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::os::windows::io::RawHandle;
use std::path::{Path, PathBuf};
use std::ptr;

use tracing::debug;
use winapi::shared::guiddef::GUID;
use winapi::shared::minwindef::{DWORD, FALSE, MAX_PATH};
use winapi::shared::windef::HWND;
use winapi::shared::winerror::FAILED;
use winapi::shared::wtypesbase::CLSCTX_INPROC_SERVER;
use winapi::um::combaseapi::{CoCreateInstance, CoUninitialize};
use winapi::um::fileapi::{GetFinalPathNameByHandleW, QueryDosDeviceW};
use winapi::um::handleapi::CloseHandle;
use winapi::um::objbase::{CoInitialize, STGM_READ};
use winapi::um::objidl::IPersistFile;
use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcess};
use winapi::um::psapi::GetProcessImageFileNameW;
use winapi::um::shobjidl_core::{IShellLinkW, SLGP_SHORTPATH};
use winapi::um::unknwnbase::IUnknown;
use winapi::um::winbase::VOLUME_NAME_DOS;
use winapi::um::winnt::{HANDLE, PROCESS_QUERY_LIMITED_INFORMATION};
use winapi::um::wow64apiset::IsWow64Process;
use winapi::Interface;

use crate::error::{HostError, Result};

// CLSID_ShellLink {00021401-0000-0000-C000-000000000046}
const CLSID_SHELL_LINK: GUID = GUID {
    Data1: 0x0002_1401,
    Data2: 0x0000,
    Data3: 0x0000,
    Data4: [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
};

// Closes the wrapped OS handle when the scope ends.
struct HandleGuard(HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        // SAFETY: the guard owns a handle that was checked non-null.
        unsafe { CloseHandle(self.0) };
    }
}

// Pairs CoInitialize with CoUninitialize around a single operation. S_FALSE
// (already initialized on this thread) still requires the balancing call.
struct ComScope;

impl ComScope {
    fn enter() -> Self {
        // SAFETY: balanced by the CoUninitialize in Drop.
        unsafe { CoInitialize(ptr::null_mut()) };
        Self
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

// Releases a COM interface pointer when the scope ends.
struct ComPtr<T>(*mut T);

impl<T> ComPtr<T> {
    fn as_ptr(&self) -> *mut T {
        self.0
    }
}

impl<T> Drop for ComPtr<T> {
    fn drop(&mut self) {
        // SAFETY: every COM interface pointer is also an IUnknown.
        unsafe { (*(self.0 as *mut IUnknown)).Release() };
    }
}

fn wide_until_nul(buf: &[u16]) -> &[u16] {
    let len = buf.iter().position(|&w| w == 0).unwrap_or(buf.len());
    &buf[..len]
}

pub(crate) fn path_from_handle(raw: RawHandle) -> Result<PathBuf> {
    let mut buf = [0u16; MAX_PATH];
    // SAFETY: the capacity passed matches the buffer length.
    let len = unsafe {
        GetFinalPathNameByHandleW(raw as HANDLE, buf.as_mut_ptr(), buf.len() as DWORD, VOLUME_NAME_DOS)
    } as usize;
    if len == 0 || len >= buf.len() {
        debug!(len, "final path query failed for handle");
        return Err(HostError::PathResolution(
            "handle does not resolve to a filesystem path".into(),
        ));
    }
    let path = OsString::from_wide(&buf[..len]);
    // The query prepends the extended-length prefix.
    let lossy = path.to_string_lossy();
    let trimmed = lossy.strip_prefix(r"\\?\").unwrap_or(&lossy);
    Ok(PathBuf::from(trimmed))
}

pub(crate) fn path_from_process(pid: u32) -> Result<PathBuf> {
    // SAFETY: the result is checked non-null before the guard takes it.
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) };
    if handle.is_null() {
        return Err(HostError::PathResolution(format!(
            "pid {pid}: process could not be opened for query"
        )));
    }
    let guard = HandleGuard(handle);

    let mut device = [0u16; MAX_PATH];
    // SAFETY: the capacity passed matches the buffer length.
    let len = unsafe {
        GetProcessImageFileNameW(guard.0, device.as_mut_ptr(), device.len() as DWORD)
    } as usize;
    if len == 0 {
        return Err(HostError::PathResolution(format!(
            "pid {pid}: image path query failed"
        )));
    }

    device_path_to_drive_path(&device[..len])
}

// Translates a device-namespace image path (\Device\HarddiskVolumeN\...)
// into a conventional drive-letter path by matching the device name behind
// each drive letter.
fn device_path_to_drive_path(device_path: &[u16]) -> Result<PathBuf> {
    for letter in b'A'..=b'Z' {
        let drive: [u16; 3] = [letter as u16, u16::from(b':'), 0];
        let mut device = [0u16; MAX_PATH];
        // SAFETY: the capacity passed matches the buffer length.
        let len = unsafe {
            QueryDosDeviceW(drive.as_ptr(), device.as_mut_ptr(), device.len() as DWORD)
        } as usize;
        if len == 0 {
            continue;
        }
        // The result is a multi-string; only the first entry matters.
        let device_name = wide_until_nul(&device);
        if device_name.is_empty() || device_path.len() <= device_name.len() {
            continue;
        }
        let (prefix, rest) = device_path.split_at(device_name.len());
        if prefix == device_name && rest[0] == u16::from(b'\\') {
            let mut path = OsString::from_wide(&drive[..2]);
            path.push(OsString::from_wide(rest));
            return Ok(PathBuf::from(path));
        }
    }
    Err(HostError::PathResolution(
        "device-namespace path has no drive-letter mapping".into(),
    ))
}

pub(crate) fn resolve_shortcut(owner_window: *mut c_void, shortcut_path: &Path) -> Result<PathBuf> {
    let _com = ComScope::enter();

    let wide_path: Vec<u16> = shortcut_path
        .as_os_str()
        .encode_wide()
        .chain(once(0))
        .collect();

    unsafe {
        let mut raw_link: *mut c_void = ptr::null_mut();
        let hr = CoCreateInstance(
            &CLSID_SHELL_LINK,
            ptr::null_mut(),
            CLSCTX_INPROC_SERVER,
            &IShellLinkW::uuidof(),
            &mut raw_link,
        );
        if FAILED(hr) {
            return Err(HostError::ShortcutResolution(format!(
                "shell link instantiation failed: {hr:#010x}"
            )));
        }
        let link = ComPtr(raw_link as *mut IShellLinkW);

        let mut raw_file: *mut c_void = ptr::null_mut();
        let hr = (*link.as_ptr()).QueryInterface(&IPersistFile::uuidof(), &mut raw_file);
        if FAILED(hr) {
            return Err(HostError::ShortcutResolution(format!(
                "persist-file interface unavailable: {hr:#010x}"
            )));
        }
        let file = ComPtr(raw_file as *mut IPersistFile);

        let hr = (*file.as_ptr()).Load(wide_path.as_ptr(), STGM_READ);
        if FAILED(hr) {
            return Err(HostError::ShortcutResolution(format!(
                "shortcut load failed: {hr:#010x}"
            )));
        }

        // Resolve may search standard locations if the original target moved.
        let hr = (*link.as_ptr()).Resolve(owner_window as HWND, 0);
        if FAILED(hr) {
            return Err(HostError::ShortcutResolution(format!(
                "shortcut resolve failed: {hr:#010x}"
            )));
        }

        let mut target = [0u16; MAX_PATH];
        let hr = (*link.as_ptr()).GetPath(
            target.as_mut_ptr(),
            target.len() as i32,
            ptr::null_mut(),
            SLGP_SHORTPATH,
        );
        if FAILED(hr) {
            return Err(HostError::ShortcutResolution(format!(
                "target path extraction failed: {hr:#010x}"
            )));
        }

        Ok(PathBuf::from(OsString::from_wide(wide_until_nul(&target))))
    }
}

pub(crate) fn is_wow64() -> bool {
    let mut flag = FALSE;
    // SAFETY: the current-process pseudo handle needs no cleanup.
    let ok = unsafe { IsWow64Process(GetCurrentProcess(), &mut flag) };
    ok != 0 && flag != 0
}
