//! Utilities dealing with error handling in this crate.

use failure::Fail;

/// Errors produced by this crate.
#[derive(Debug, Fail)]
pub enum Error {
    /// Errors originating from calls to `std::io::*`.
    #[fail(display = "IO Error - {}", _0)]
    IO(#[cause] std::io::Error),
    /// Errors originating from calls to `std::env::*`.
    #[fail(display = "Env Error - {}", _0)]
    Env(#[cause] std::env::VarError),
    /// Errors originating from calls to `libc` or other system utilties.
    #[fail(display = "System Error - {}", _0)]
    System(#[cause] nix::Error),
    /// Errors caused by capability checks on the kernel.
    #[fail(display = "Not allowed by kernel")]
    PerfNotCapable,
    /// No counter facility is available for the current target.
    #[fail(display = "Performance counters are not supported on this platform")]
    Unsupported,
    /// A platform library providing counter access could not be loaded.
    #[fail(display = "Could not load {} - {}", path, reason)]
    LibraryLoad {
        /// Path handed to the dynamic loader.
        path: String,
        /// Message reported by the dynamic loader.
        reason: String,
    },
    /// A platform library was loaded but lacks a required function.
    #[fail(display = "Missing symbol {}", _0)]
    MissingSymbol(&'static str),
    /// None of the platform names for a counter event are known.
    #[fail(display = "No platform event found for {}", _0)]
    EventNotFound(&'static str),
    /// Errors reported by the `kperfdata` event database.
    #[fail(display = "{} failed - {} ({})", call, reason, code)]
    Kpep {
        /// Function that reported the error.
        call: &'static str,
        /// Raw error code.
        code: i32,
        /// Human readable description of `code`.
        reason: &'static str,
    },
    /// Errors reported by the `kperf` counter interface.
    #[fail(display = "{} failed with code {}", call, code)]
    Kpc {
        /// Function that reported the error.
        call: &'static str,
        /// Raw return value.
        code: i32,
    },
    /// The platform ran out of memory while preparing counters.
    #[fail(display = "Out of memory while configuring counters")]
    OutOfMemory,
    /// A counter read was attempted through a handle that does not exist.
    #[fail(display = "Invalid counter handle")]
    InvalidHandle,
    /// The platform reported more mispredicted branches than branches.
    #[fail(
        display = "Inconsistent counter reading - {} missed branches out of {} branches",
        missed_branches, branches
    )]
    InconsistentSnapshot {
        /// Retired branches in the rejected reading.
        branches: u64,
        /// Mispredicted branches in the rejected reading.
        missed_branches: u64,
    },
    /// A counter read returned less data than the counter group holds.
    #[fail(display = "Short counter read - expected {} got {}", expected, actual)]
    ShortRead {
        /// Number of values expected.
        expected: usize,
        /// Number of values delivered.
        actual: usize,
    },
    /// The kernel never scheduled the counter group, so no value was counted.
    #[fail(display = "Counters enabled for {} ns but never running", time_enabled)]
    NotCounting {
        /// Time the group was enabled.
        time_enabled: u64,
    },
    /// Malformed configuration value.
    #[fail(display = "Config Error - {}={:?}", key, value)]
    Config {
        /// Environment variable holding the value.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// The monotonic clock source cannot be read.
    #[fail(display = "Clock Error - {}", _0)]
    ClockUnavailable(#[cause] nix::Error),
}

impl Error {
    /// Create a new instance of error from the `errno` variable.
    #[inline]
    pub fn from_errno() -> Self {
        Error::System(nix::errno::Errno::last())
    }

    /// Check if this error stops a counter handle from being created.
    ///
    /// Setup failures are terminal for one creation attempt; a fresh attempt starts from scratch.
    pub fn is_setup_failure(&self) -> bool {
        match self {
            Error::InvalidHandle
            | Error::InconsistentSnapshot { .. }
            | Error::ShortRead { .. }
            | Error::NotCounting { .. }
            | Error::ClockUnavailable(_) => false,
            _ => true,
        }
    }
}

macro_rules! error_from {
    ($et: ty => $cet: expr) => {
        impl From<$et> for Error {
            #[inline]
            fn from(err: $et) -> Self {
                $cet(err)
            }
        }
    };
}

error_from!(std::io::Error => Error::IO);
error_from!(std::env::VarError => Error::Env);
error_from!(nix::Error => Error::System);

/// Result type used in this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_failure_classification() {
        assert!(Error::PerfNotCapable.is_setup_failure());
        assert!(Error::OutOfMemory.is_setup_failure());
        assert!(Error::MissingSymbol("kpc_set_counting").is_setup_failure());
        assert!(!Error::InvalidHandle.is_setup_failure());
        assert!(!Error::ShortRead {
            expected: 4,
            actual: 2
        }
        .is_setup_failure());
        assert!(!Error::NotCounting { time_enabled: 10 }.is_setup_failure());
    }

    #[test]
    fn test_display() {
        let err = Error::Kpep {
            call: "kpep_db_create",
            code: 7,
            reason: "database not found",
        };
        assert_eq!(
            err.to_string(),
            "kpep_db_create failed - database not found (7)"
        );
        assert_eq!(Error::InvalidHandle.to_string(), "Invalid counter handle");
    }
}
