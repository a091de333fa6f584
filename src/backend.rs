//! Platform facilities able to hand out the counter group.

use crate::{CounterConfig, CounterSnapshot, Error, Result};

/// A privileged facility that grants access to the counter group.
///
/// A backend value only exists once setup succeeded, so there is no state in which a read could
/// silently return zeros. Dropping the backend releases whatever setup acquired.
pub trait CounterBackend: Sized {
    /// Negotiate counter access with the platform.
    fn setup(config: &CounterConfig) -> Result<Self>;

    /// Sample all counters of the group at a single instant.
    fn read(&self) -> Result<CounterSnapshot>;
}

/// Backend compiled for the current target.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub type Platform = crate::kperf::KperfBackend;

/// Backend compiled for the current target.
#[cfg(target_os = "linux")]
pub type Platform = crate::perf::PerfBackend;

/// Backend compiled for the current target.
#[cfg(not(any(all(target_os = "macos", target_arch = "aarch64"), target_os = "linux")))]
pub type Platform = Unsupported;

/// Backend for targets without a counter facility. Setup always fails.
#[derive(Debug)]
pub struct Unsupported {
    _private: (),
}

impl CounterBackend for Unsupported {
    fn setup(_config: &CounterConfig) -> Result<Self> {
        log::warn!("no performance counter facility for this target");
        Err(Error::Unsupported)
    }

    fn read(&self) -> Result<CounterSnapshot> {
        Err(Error::Unsupported)
    }
}
