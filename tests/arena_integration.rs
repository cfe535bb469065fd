use std::slice;

use dbghost::arena::{self, Arena};

#[test]
fn global_arena_net_zero_across_mixed_traffic() {
    // All global-arena traffic stays inside this one test so concurrent
    // test threads cannot skew the before/after comparison.
    let before = arena::leak_count();

    let a = arena::allocate(128, "test:cmdline");
    let b = arena::allocate(1, "test:byte");
    let a = unsafe { arena::reallocate(a, 4096, "test:cmdline") };
    unsafe {
        arena::release(b, "test:byte");
        arena::release(a, "test:cmdline");
    }

    assert_eq!(arena::leak_count(), before);
}

#[test]
fn reallocate_never_preserves_prior_contents() {
    let arena = Arena::new();
    let mut ptr = arena.allocate(512, "test:scratch");
    for new_size in [512usize, 64, 2048] {
        unsafe {
            slice::from_raw_parts_mut(ptr, 16).fill(0x5A);
            ptr = arena.reallocate(ptr, new_size, "test:scratch");
            let fresh = slice::from_raw_parts(ptr, new_size);
            assert!(fresh.iter().all(|&byte| byte == 0));
        }
    }
    unsafe { arena.release(ptr, "test:scratch") };
    assert_eq!(arena.leak_count(), 0);
}

#[test]
fn trace_log_records_alloc_and_free_events() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("alloctrace.log");

    let arena = Arena::new();
    assert!(arena.set_trace_path(&trace));
    // Second configuration attempt must not redirect the log.
    assert!(!arena.set_trace_path(dir.path().join("other.log")));

    let ptr = arena.allocate(0x40, "test:traced");
    unsafe { arena.release(ptr, "test:traced") };

    let log = std::fs::read_to_string(&trace).unwrap();
    let mut lines = log.lines();

    let alloc_line = lines.next().unwrap();
    assert!(alloc_line.starts_with("DBG00001:"));
    assert!(alloc_line.contains("alloc:"));
    assert!(alloc_line.contains(":test:traced:0x40"));
    assert!(alloc_line.contains("live=1"));

    let free_line = lines.next().unwrap();
    assert!(free_line.starts_with("DBG00002:"));
    assert!(free_line.contains("free:"));
    assert!(free_line.contains(":test:traced"));
    assert!(free_line.contains("live=0"));

    assert!(lines.next().is_none());
}

#[test]
fn unset_trace_path_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let arena = Arena::new();
    let ptr = arena.allocate(8, "test:untraced");
    unsafe { arena.release(ptr, "test:untraced") };
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn contended_arena_count_stays_exact() {
    let arena = Arena::new();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for round in 0..100usize {
                    let ptr = arena.allocate(round % 96 + 1, "test:contended");
                    let ptr = unsafe { arena.reallocate(ptr, 64, "test:contended") };
                    unsafe { arena.release(ptr, "test:contended") };
                }
            });
        }
    });
    assert_eq!(arena.leak_count(), 0);
}
