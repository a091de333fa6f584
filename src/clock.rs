//! Monotonic time sources.

use crate::{Error, Result};
use nix::time::{clock_gettime, ClockId};
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u64 = 1_000_000_000;

// Unlike CLOCK_MONOTONIC, the raw clock is not slewed by NTP.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "ios"))]
fn monotonic() -> ClockId {
    ClockId::from_raw(nix::libc::CLOCK_MONOTONIC_RAW)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "ios")))]
fn monotonic() -> ClockId {
    ClockId::CLOCK_MONOTONIC
}

/// Nanoseconds on a clock that never moves backwards and ignores wall-clock adjustments.
///
/// The epoch is unspecified, only differences between two readings are meaningful.
pub fn now() -> Result<u64> {
    let ts = clock_gettime(monotonic()).map_err(Error::ClockUnavailable)?;
    Ok(ts.tv_sec() as u64 * NANOS_PER_SEC + ts.tv_nsec() as u64)
}

/// Verify the monotonic clock can be read.
///
/// Meant to be called once at startup, an error here should abort the program.
pub fn check() -> Result<()> {
    now().map(|_| ())
}

/// Raw value of the architectural tick counter.
#[cfg(target_arch = "aarch64")]
#[inline]
pub fn ticks() -> u64 {
    let ticks: u64;
    unsafe {
        std::arch::asm!("isb", "mrs {t}, cntvct_el0", t = out(reg) ticks, options(nostack));
    }
    ticks
}

/// Raw value of the architectural tick counter.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn ticks() -> u64 {
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Raw value of the architectural tick counter.
///
/// Targets without a user readable counter fall back to monotonic nanoseconds.
#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
#[inline]
pub fn ticks() -> u64 {
    now().unwrap_or(0)
}

/// Frequency of [`ticks`] in Hz.
///
/// aarch64 reports it in `cntfrq_el0` and `max_estimation` is unused.
#[cfg(target_arch = "aarch64")]
pub fn tick_frequency(_max_estimation: Duration) -> u64 {
    let freq: u64;
    unsafe {
        std::arch::asm!("mrs {f}, cntfrq_el0", f = out(reg) freq, options(nomem, nostack));
    }
    freq
}

/// Frequency of [`ticks`] in Hz, estimated by spinning for `max_estimation`.
#[cfg(not(target_arch = "aarch64"))]
pub fn tick_frequency(max_estimation: Duration) -> u64 {
    estimate_frequency(max_estimation)
}

#[cfg_attr(target_arch = "aarch64", allow(dead_code))]
fn estimate_frequency(max_estimation: Duration) -> u64 {
    let start_ticks = ticks();
    let start = Instant::now();
    while start.elapsed() < max_estimation {}
    let elapsed = start.elapsed();
    let delta = ticks().wrapping_sub(start_ticks);
    (delta as f64 / elapsed.as_secs_f64()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_available() {
        assert!(check().is_ok());
    }

    #[test]
    fn test_now_never_goes_backwards() -> crate::Result<()> {
        let mut last = now()?;
        for _ in 0..100_000 {
            let t = now()?;
            assert!(t >= last);
            last = t;
        }
        Ok(())
    }

    #[test]
    fn test_now_advances() -> crate::Result<()> {
        let start = now()?;
        std::thread::sleep(Duration::from_millis(2));
        let end = now()?;
        assert!(end - start >= 1_000_000);
        Ok(())
    }

    #[test]
    fn test_ticks_monotonic() {
        let a = ticks();
        let b = ticks();
        assert!(b >= a);
    }

    #[test]
    fn test_tick_frequency() {
        assert!(tick_frequency(Duration::from_millis(20)) > 0);
        assert!(estimate_frequency(Duration::from_millis(20)) > 0);
    }
}
