//! C ABI over the counter handle.
//!
//! ```c
//! typedef struct perf_handle perf_handle;
//! struct perf_counters { uint64_t cycles, branches, missed_branches, instructions; };
//!
//! perf_handle *perf_handle_create(void);
//! void perf_handle_destroy(perf_handle *h);
//! int32_t perf_handle_read(const perf_handle *h, struct perf_counters *out); // 1 on success
//! uint64_t perf_handle_now(void);
//! ```

use crate::handle::{self, CounterHandle};
use crate::{clock, CounterSnapshot};
use log::debug;

/// Set up counters for the calling thread.
///
/// Returns null when the platform refuses counter access.
#[no_mangle]
pub extern "C" fn perf_handle_create() -> *mut CounterHandle {
    match handle::create() {
        Some(h) => Box::into_raw(Box::new(h)),
        None => std::ptr::null_mut(),
    }
}

/// Release a handle returned by [`perf_handle_create`]. Null is ignored.
///
/// # Safety
///
/// `h` must be null or a pointer returned by `perf_handle_create` that was not destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn perf_handle_destroy(h: *mut CounterHandle) {
    if h.is_null() {
        return;
    }
    handle::destroy(Some(*Box::from_raw(h)));
}

/// Read the counters of `h` into `out`.
///
/// Returns 1 on success and 0 on failure, in which case `out` is left untouched.
///
/// # Safety
///
/// `h` must be null or a live handle, `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn perf_handle_read(
    h: *const CounterHandle,
    out: *mut CounterSnapshot,
) -> i32 {
    let out = match out.as_mut() {
        Some(out) => out,
        None => return 0,
    };
    match handle::read_into(h.as_ref(), out) {
        Ok(()) => 1,
        Err(e) => {
            debug!("perf_handle_read failed - {}", e);
            0
        }
    }
}

/// Monotonic nanoseconds, or 0 when the clock cannot be read.
#[no_mangle]
pub extern "C" fn perf_handle_now() -> u64 {
    clock::now().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        let mut out = CounterSnapshot::from([1, 2, 3, 4]);
        assert_eq!(unsafe { perf_handle_read(std::ptr::null(), &mut out) }, 0);
        assert_eq!(out, CounterSnapshot::from([1, 2, 3, 4]));
        unsafe { perf_handle_destroy(std::ptr::null_mut()) };
    }

    #[test]
    fn test_lifecycle() {
        let h = perf_handle_create();
        let mut out = CounterSnapshot::from([9, 9, 9, 9]);
        if h.is_null() {
            assert_eq!(unsafe { perf_handle_read(h, &mut out) }, 0);
            assert_eq!(out, CounterSnapshot::from([9, 9, 9, 9]));
        } else {
            assert_eq!(unsafe { perf_handle_read(h, std::ptr::null_mut()) }, 0);
            if unsafe { perf_handle_read(h, &mut out) } == 1 {
                assert!(out.missed_branches <= out.branches);
            } else {
                // The group may exist without ever being scheduled.
                assert_eq!(out, CounterSnapshot::from([9, 9, 9, 9]));
            }
        }
        unsafe { perf_handle_destroy(h) };
    }

    #[test]
    fn test_now() {
        let a = perf_handle_now();
        let b = perf_handle_now();
        assert!(a > 0);
        assert!(b >= a);
    }
}
