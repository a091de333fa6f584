//! Counter backend built on the Linux perf subsystem.
//!
//! The four events are opened as one group led by the cycle counter, so the kernel schedules
//! them together and a single `read(2)` on the leader returns all of them at once.

mod ffi;

mod group;
pub use group::GroupReading;

use crate::backend::CounterBackend;
use crate::counters::NUM_COUNTERS;
use crate::{CounterConfig, CounterSnapshot, Error, Result};
use log::{debug, trace, warn};
use nix::errno::Errno;
use std::io::Read;
use std::os::unix::io::AsRawFd;

/// Generic hardware events in snapshot order.
const EVENTS: [(&str, u32); NUM_COUNTERS] = [
    ("cycles", ffi::PERF_COUNT_HW_CPU_CYCLES),
    ("branches", ffi::PERF_COUNT_HW_BRANCH_INSTRUCTIONS),
    ("missed_branches", ffi::PERF_COUNT_HW_BRANCH_MISSES),
    ("instructions", ffi::PERF_COUNT_HW_INSTRUCTIONS),
];

/// Counter group of the calling thread, opened through `perf_event_open`.
#[derive(Debug)]
pub struct PerfBackend {
    /// Group leader counting cycles. Reads go through this file.
    leader: std::fs::File,
    /// Remaining members, kept open for the lifetime of the group.
    _members: Vec<std::fs::File>,
}

impl PerfBackend {
    /// Read the raw group, including enabled and running times.
    pub fn read_group(&self) -> Result<GroupReading> {
        let mut buf = [0u8; group::GROUP_READ_SIZE];
        let len = (&self.leader).read(&mut buf)?;
        GroupReading::from_bytes(&buf[..len])
    }
}

fn event_attr(config: &CounterConfig, hw_id: u32, leader: bool) -> ffi::perf_event_attr {
    let mut attr = ffi::perf_event_attr::default();
    attr.size = std::mem::size_of::<ffi::perf_event_attr>() as u32;
    attr.type_ = ffi::PERF_TYPE_HARDWARE;
    attr.config = hw_id as u64;
    attr.read_format = (ffi::PERF_FORMAT_GROUP
        | ffi::PERF_FORMAT_TOTAL_TIME_ENABLED
        | ffi::PERF_FORMAT_TOTAL_TIME_RUNNING) as u64;
    if leader {
        attr.set_disabled(1);
    }
    if !config.count_kernel() {
        attr.set_exclude_kernel(1);
    }
    if !config.count_hypervisor() {
        attr.set_exclude_hv(1);
    }
    attr
}

fn classify_open_error(err: Error, event: &'static str) -> Error {
    match err {
        Error::System(Errno::EACCES) | Error::System(Errno::EPERM) => {
            warn!("perf_event_open denied for {}, check perf_event_paranoid", event);
            Error::PerfNotCapable
        }
        Error::System(Errno::ENOENT) | Error::System(Errno::EOPNOTSUPP) => {
            Error::EventNotFound(event)
        }
        Error::System(Errno::ENODEV) => Error::Unsupported,
        other => other,
    }
}

impl CounterBackend for PerfBackend {
    fn setup(config: &CounterConfig) -> Result<Self> {
        let (leader_name, leader_id) = EVENTS[0];
        let leader = ffi::perf_event_open(&mut event_attr(config, leader_id, true), 0, -1, -1)
            .map_err(|e| classify_open_error(e, leader_name))?;

        // Members already opened are closed on drop if a later one fails.
        let mut members = Vec::with_capacity(NUM_COUNTERS - 1);
        for &(name, hw_id) in EVENTS[1..].iter() {
            let file = ffi::perf_event_open(
                &mut event_attr(config, hw_id, false),
                0,
                -1,
                leader.as_raw_fd(),
            )
            .map_err(|e| classify_open_error(e, name))?;
            members.push(file);
        }
        debug!("opened perf group of {} events", NUM_COUNTERS);

        unsafe {
            ffi::perf_event_ioc_reset(leader.as_raw_fd(), ffi::PERF_IOC_FLAG_GROUP)?;
            ffi::perf_event_ioc_enable(leader.as_raw_fd(), ffi::PERF_IOC_FLAG_GROUP)?;
        }

        Ok(PerfBackend {
            leader,
            _members: members,
        })
    }

    fn read(&self) -> Result<CounterSnapshot> {
        snapshot(&self.read_group()?)
    }
}

/// Counter values of `reading`, rejected if the group never ran.
fn snapshot(reading: &GroupReading) -> Result<CounterSnapshot> {
    if reading.time_running == 0 {
        return Err(Error::NotCounting {
            time_enabled: reading.time_enabled,
        });
    }
    if reading.multiplexed() {
        trace!(
            "perf group multiplexed - running {} of {}",
            reading.time_running,
            reading.time_enabled
        );
    }
    Ok(CounterSnapshot::from(reading.values))
}

impl Drop for PerfBackend {
    fn drop(&mut self) {
        let rc = unsafe {
            ffi::perf_event_ioc_disable(self.leader.as_raw_fd(), ffi::PERF_IOC_FLAG_GROUP)
        };
        if let Err(e) = rc {
            debug!("disabling perf group failed - {}", e);
        }
    }
}
