//! Values read from the fixed counter group.

use crate::{Error, Result};
use derive_more::Display;

/// Number of events in the counter group.
pub const NUM_COUNTERS: usize = 4;

/// Point in time reading of the counter group.
///
/// Every field accumulates from the moment the backend was set up. An interval is measured by
/// taking two snapshots and calling [`CounterSnapshot::delta`] (or subtracting them).
#[repr(C)]
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[display(
    fmt = "cycles={} instructions={} branches={} missed_branches={}",
    cycles,
    instructions,
    branches,
    missed_branches
)]
pub struct CounterSnapshot {
    /// Elapsed processor cycles.
    pub cycles: u64,
    /// Retired branch instructions.
    pub branches: u64,
    /// Mispredicted branches.
    pub missed_branches: u64,
    /// Retired instructions.
    pub instructions: u64,
}

impl CounterSnapshot {
    /// Reject readings in which more branches were missed than retired.
    pub fn validate(&self) -> Result<()> {
        if self.missed_branches > self.branches {
            return Err(Error::InconsistentSnapshot {
                branches: self.branches,
                missed_branches: self.missed_branches,
            });
        }
        Ok(())
    }

    /// Counts accumulated between `earlier` and `self`.
    ///
    /// Uses wrapping arithmetic so a counter that rolls over still yields the elapsed count.
    pub fn delta(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            cycles: self.cycles.wrapping_sub(earlier.cycles),
            branches: self.branches.wrapping_sub(earlier.branches),
            missed_branches: self.missed_branches.wrapping_sub(earlier.missed_branches),
            instructions: self.instructions.wrapping_sub(earlier.instructions),
        }
    }

    /// Instructions retired per cycle.
    pub fn ipc(&self) -> Option<f64> {
        if self.cycles == 0 {
            None
        } else {
            Some(self.instructions as f64 / self.cycles as f64)
        }
    }

    /// Fraction of branches that were mispredicted.
    pub fn branch_miss_ratio(&self) -> Option<f64> {
        if self.branches == 0 {
            None
        } else {
            Some(self.missed_branches as f64 / self.branches as f64)
        }
    }
}

/// Build a snapshot from values ordered `[cycles, branches, missed_branches, instructions]`.
impl From<[u64; NUM_COUNTERS]> for CounterSnapshot {
    fn from(values: [u64; NUM_COUNTERS]) -> Self {
        CounterSnapshot {
            cycles: values[0],
            branches: values[1],
            missed_branches: values[2],
            instructions: values[3],
        }
    }
}

impl std::ops::Sub for CounterSnapshot {
    type Output = CounterSnapshot;

    fn sub(self, earlier: CounterSnapshot) -> CounterSnapshot {
        self.delta(&earlier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let ok = CounterSnapshot::from([100, 10, 10, 80]);
        assert!(ok.validate().is_ok());
        let bad = CounterSnapshot::from([100, 10, 11, 80]);
        match bad.validate() {
            Err(Error::InconsistentSnapshot {
                branches,
                missed_branches,
            }) => {
                assert_eq!(branches, 10);
                assert_eq!(missed_branches, 11);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_delta() {
        let start = CounterSnapshot::from([1_000, 50, 5, 2_000]);
        let end = CounterSnapshot::from([3_500, 80, 7, 6_000]);
        let diff = end - start;
        assert_eq!(diff, CounterSnapshot::from([2_500, 30, 2, 4_000]));
        assert_eq!(diff.ipc(), Some(1.6));
    }

    #[test]
    fn test_delta_wraps() {
        let start = CounterSnapshot::from([u64::MAX - 1, 0, 0, 0]);
        let end = CounterSnapshot::from([3, 0, 0, 0]);
        assert_eq!(end.delta(&start).cycles, 5);
    }

    #[test]
    fn test_ratios_on_zero() {
        let zero = CounterSnapshot::default();
        assert_eq!(zero.ipc(), None);
        assert_eq!(zero.branch_miss_ratio(), None);
        let some = CounterSnapshot::from([10, 8, 2, 20]);
        assert_eq!(some.branch_miss_ratio(), Some(0.25));
    }

    #[test]
    fn test_display() {
        let snap = CounterSnapshot::from([1, 2, 3, 4]);
        assert_eq!(
            snap.to_string(),
            "cycles=1 instructions=4 branches=2 missed_branches=3"
        );
    }
}
