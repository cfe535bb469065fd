//! Tracked allocation arena.
//!
//! A thin accounting wrapper over the host allocator: every buffer is
//! zero-initialized and counted, and the live count must be back to zero at
//! orderly shutdown. A non-zero [`Arena::leak_count`] at that point is
//! evidence of a leak in some caller.
//!
//! Each buffer is preceded by a hidden header slot recording the requested
//! size, so [`Arena::release`] can reconstruct the layout from the pointer
//! alone. The C-style JSON allocator hooks ([`json_allocate`],
//! [`json_release`]) depend on this: the C side frees by pointer only.
//!
//! Allocator exhaustion is fatal. The arena prints a notification and aborts
//! rather than returning null, because every downstream consumer assumes
//! allocation cannot fail observably.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ffi::c_void;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use tracing::{debug, error, warn};

/// Alignment of every buffer returned by the arena.
pub const ALLOC_ALIGN: usize = 16;

// One aligned slot ahead of the user buffer, holding the requested size.
const HEADER_SIZE: usize = ALLOC_ALIGN;

/// A tracked allocation arena.
///
/// The process-wide instance is reachable through [`global`] and the
/// module-level convenience functions; separate instances can be constructed
/// for isolated lifetimes (a dropped arena warns if buffers are still live).
pub struct Arena {
    live: AtomicIsize,
    next_event: AtomicU64,
    trace_path: OnceCell<PathBuf>,
}

impl Arena {
    pub const fn new() -> Self {
        Self {
            live: AtomicIsize::new(0),
            next_event: AtomicU64::new(0),
            trace_path: OnceCell::new(),
        }
    }

    /// Allocates a zero-initialized buffer of exactly `size` bytes.
    ///
    /// `size` must be non-zero; a zero size is a contract violation and
    /// panics. On host-allocator failure the process is terminated after a
    /// notification; this function never returns null. `reason` is a
    /// free-form diagnostic tag recorded in the optional trace log.
    pub fn allocate(&self, size: usize, reason: &str) -> *mut u8 {
        assert!(size != 0, "zero-size allocation ({reason})");

        let total = match size.checked_add(HEADER_SIZE) {
            Some(total) => total,
            None => oom_abort(size, reason),
        };
        let layout = match Layout::from_size_align(total, ALLOC_ALIGN) {
            Ok(layout) => layout,
            Err(_) => oom_abort(size, reason),
        };
        // SAFETY: layout has non-zero size and a valid power-of-two alignment.
        let base = unsafe { alloc_zeroed(layout) };
        if base.is_null() {
            oom_abort(size, reason);
        }
        // SAFETY: the header slot is within the allocation and usize-aligned.
        unsafe { (base as *mut usize).write(size) };

        let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        // SAFETY: HEADER_SIZE is within the allocation.
        let ptr = unsafe { base.add(HEADER_SIZE) };
        self.trace_event(EventKind::Alloc, live, ptr, reason, size);
        ptr
    }

    /// Releases a buffer previously obtained from this arena and allocates a
    /// fresh zero-initialized buffer of `new_size` bytes.
    ///
    /// This is a strict free-then-allocate, not an in-place resize: the old
    /// contents are not carried over and the returned buffer is all zeros.
    /// A null `ptr` behaves as a plain [`Arena::allocate`]. Net effect on the
    /// live count when `ptr` was tracked is zero.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have come from this arena's `allocate` or
    /// `reallocate` and must not have been released already.
    pub unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize, reason: &str) -> *mut u8 {
        assert!(new_size != 0, "zero-size reallocation ({reason})");

        if !ptr.is_null() {
            self.release(ptr, reason);
        }
        self.allocate(new_size, reason)
    }

    /// Returns a buffer to the host allocator and decrements the live count.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from this arena's `allocate` or `reallocate` and
    /// must not have been released already. Neither condition is detected.
    pub unsafe fn release(&self, ptr: *mut u8, reason: &str) {
        let base = ptr.sub(HEADER_SIZE);
        let size = (base as *const usize).read();

        let live = self.live.fetch_sub(1, Ordering::AcqRel) - 1;
        self.trace_event(EventKind::Free, live, ptr, reason, size);

        let layout = Layout::from_size_align_unchecked(size + HEADER_SIZE, ALLOC_ALIGN);
        dealloc(base, layout);
    }

    /// Current number of live allocations.
    ///
    /// Meaningful as a leak check only at or after orderly shutdown, once all
    /// tracked buffers are expected to have been released.
    pub fn leak_count(&self) -> isize {
        self.live.load(Ordering::Acquire)
    }

    /// Sets the append-only allocation trace file. Set-once: returns false
    /// (and leaves the original) if a path was already configured.
    pub fn set_trace_path<P: AsRef<Path>>(&self, path: P) -> bool {
        self.trace_path.set(path.as_ref().to_path_buf()).is_ok()
    }

    // Appends one line per allocate/release event when a trace path is
    // configured. Diagnostics must never affect the allocation path, so
    // write failures are logged and swallowed.
    fn trace_event(&self, kind: EventKind, live: isize, ptr: *mut u8, reason: &str, size: usize) {
        let Some(path) = self.trace_path.get() else {
            return;
        };
        let index = self.next_event.fetch_add(1, Ordering::Relaxed) + 1;
        let addr = ptr as usize;
        let line = match kind {
            EventKind::Alloc => {
                format!("DBG{index:05}: live={live}: alloc:{addr:#x}:{reason}:{size:#x}\n")
            }
            EventKind::Free => {
                format!("DBG{index:05}: live={live}:  free:{addr:#x}:{reason}\n")
            }
        };
        let written = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = written {
            debug!(%err, path = %path.display(), "allocation trace write failed");
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let live = *self.live.get_mut();
        if live != 0 {
            warn!(live, "arena torn down with live allocations");
        }
    }
}

#[derive(Clone, Copy)]
enum EventKind {
    Alloc,
    Free,
}

fn oom_abort(size: usize, reason: &str) -> ! {
    // Notify, then terminate. Downstream code assumes allocation never fails
    // observably, so an invalid pointer must never escape.
    eprintln!("dbghost: could not allocate {size} bytes ({reason})");
    error!(size, reason, "host allocator exhausted, terminating");
    process::abort();
}

static GLOBAL: Arena = Arena::new();

/// The process-wide arena backing the convenience functions and the JSON
/// allocator hooks.
pub fn global() -> &'static Arena {
    &GLOBAL
}

/// Allocates from the process-wide arena. See [`Arena::allocate`].
pub fn allocate(size: usize, reason: &str) -> *mut u8 {
    GLOBAL.allocate(size, reason)
}

/// Reallocates in the process-wide arena. See [`Arena::reallocate`].
///
/// # Safety
///
/// Same contract as [`Arena::reallocate`].
pub unsafe fn reallocate(ptr: *mut u8, new_size: usize, reason: &str) -> *mut u8 {
    GLOBAL.reallocate(ptr, new_size, reason)
}

/// Releases into the process-wide arena. See [`Arena::release`].
///
/// # Safety
///
/// Same contract as [`Arena::release`].
pub unsafe fn release(ptr: *mut u8, reason: &str) {
    GLOBAL.release(ptr, reason)
}

/// Live-allocation count of the process-wide arena.
pub fn leak_count() -> isize {
    GLOBAL.leak_count()
}

/// Sets the allocation trace file of the process-wide arena (set-once).
pub fn set_alloc_trace<P: AsRef<Path>>(path: P) -> bool {
    GLOBAL.set_trace_path(path)
}

/// Allocator hook matching a C JSON library's malloc signature.
///
/// Forwards to the process-wide arena with a fixed diagnostic tag.
///
/// # Safety
///
/// Callable from C; the returned buffer must be released through
/// [`json_release`].
pub unsafe extern "C" fn json_allocate(size: usize) -> *mut c_void {
    GLOBAL.allocate(size, "json:ptr").cast()
}

/// Allocator hook matching a C JSON library's free signature.
///
/// # Safety
///
/// `ptr` must be null or a pointer obtained from [`json_allocate`] that has
/// not been released yet.
pub unsafe extern "C" fn json_release(ptr: *mut c_void) {
    // The C allocator contract makes free(NULL) a no-op.
    if ptr.is_null() {
        return;
    }
    GLOBAL.release(ptr.cast(), "json:ptr");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::slice;

    #[test]
    fn test_matched_pairs_are_net_zero() {
        let arena = Arena::new();
        let before = arena.leak_count();
        let mut ptrs = Vec::new();
        for i in 1..=32usize {
            ptrs.push(arena.allocate(i * 8, "test:pair"));
        }
        assert_eq!(arena.leak_count(), before + 32);
        for ptr in ptrs {
            unsafe { arena.release(ptr, "test:pair") };
        }
        assert_eq!(arena.leak_count(), before);
    }

    #[test]
    fn test_allocations_are_zero_initialized() {
        let arena = Arena::new();
        let ptr = arena.allocate(256, "test:zeroed");
        let bytes = unsafe { slice::from_raw_parts(ptr, 256) };
        assert!(bytes.iter().all(|&b| b == 0));
        unsafe { arena.release(ptr, "test:zeroed") };
    }

    #[test]
    fn test_reallocate_discards_old_contents() {
        let arena = Arena::new();
        let ptr = arena.allocate(64, "test:realloc");
        unsafe {
            slice::from_raw_parts_mut(ptr, 64).fill(0xAA);
            // Same size on purpose: the allocator may hand back the same
            // address, which is exactly the case the contract covers.
            let fresh = arena.reallocate(ptr, 64, "test:realloc");
            assert!(slice::from_raw_parts(fresh, 64).iter().all(|&b| b == 0));
            arena.release(fresh, "test:realloc");
        }
        assert_eq!(arena.leak_count(), 0);
    }

    #[test]
    fn test_reallocate_from_null_is_plain_allocate() {
        let arena = Arena::new();
        let ptr = unsafe { arena.reallocate(std::ptr::null_mut(), 16, "test:realloc-null") };
        assert!(!ptr.is_null());
        assert_eq!(arena.leak_count(), 1);
        unsafe { arena.release(ptr, "test:realloc-null") };
        assert_eq!(arena.leak_count(), 0);
    }

    #[test]
    fn test_reallocate_is_counter_neutral() {
        let arena = Arena::new();
        let mut ptr = arena.allocate(8, "test:neutral");
        for size in [24usize, 4096, 1] {
            ptr = unsafe { arena.reallocate(ptr, size, "test:neutral") };
            assert_eq!(arena.leak_count(), 1);
        }
        unsafe { arena.release(ptr, "test:neutral") };
        assert_eq!(arena.leak_count(), 0);
    }

    #[test]
    #[should_panic(expected = "zero-size allocation")]
    fn test_zero_size_allocate_panics() {
        let arena = Arena::new();
        arena.allocate(0, "test:zero");
    }

    #[test]
    fn test_concurrent_pairs_keep_count_exact() {
        let arena = Arena::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let ptr = arena.allocate(32, "test:mt");
                        unsafe { arena.release(ptr, "test:mt") };
                    }
                });
            }
        });
        assert_eq!(arena.leak_count(), 0);
    }

    #[test]
    fn test_trace_path_is_set_once() {
        let arena = Arena::new();
        assert!(arena.set_trace_path("/tmp/first.log"));
        assert!(!arena.set_trace_path("/tmp/second.log"));
    }

    #[test]
    fn test_drop_with_live_allocation_only_warns() {
        let arena = Arena::new();
        let _leaked = arena.allocate(16, "test:leak");
        assert_eq!(arena.leak_count(), 1);
        // Teardown with a live buffer warns and leaks; it must not fault.
        drop(arena);
    }

    #[test]
    fn test_json_hooks_balance_global_count() {
        let before = leak_count();
        let ptr = unsafe { json_allocate(48) };
        assert!(!ptr.is_null());
        unsafe { json_release(ptr) };
        unsafe { json_release(std::ptr::null_mut()) };
        assert_eq!(leak_count(), before);
    }
}
