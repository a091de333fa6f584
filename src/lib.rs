//! Read the fixed hardware counter group (cycles, branches, missed branches, instructions) of the
//! calling thread, plus a monotonic nanosecond clock.
//!
//! ```no_run
//! use perf_handle::CounterHandle;
//!
//! fn main() -> perf_handle::Result<()> {
//!     let handle: CounterHandle = CounterHandle::create()?;
//!     let start = handle.read()?;
//!     // ... workload ...
//!     let elapsed = handle.read()? - start;
//!     println!("{}", elapsed);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs, missing_debug_implementations)]

mod errors;
pub use errors::{Error, Result};

pub mod config;
pub use config::CounterConfig;

mod counters;
pub use counters::{CounterSnapshot, NUM_COUNTERS};

pub mod backend;
pub use backend::{CounterBackend, Platform};

pub mod handle;
pub use handle::CounterHandle;

pub mod clock;

pub mod capi;

/// Counter backend for macOS on Apple silicon.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod kperf;

/// Counter backend for Linux.
#[cfg(target_os = "linux")]
pub mod perf;
