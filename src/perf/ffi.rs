//! Linux `perf_event_open` system call and the ioctls used on its file descriptors.

use crate::{Error, Result};
use nix::libc;
use nix::{ioctl_write_int_bad, request_code_none};
use std::os::unix::io::FromRawFd;

pub use perf_event_open_sys::bindings::{
    perf_event_attr, PERF_COUNT_HW_BRANCH_INSTRUCTIONS, PERF_COUNT_HW_BRANCH_MISSES,
    PERF_COUNT_HW_CPU_CYCLES, PERF_COUNT_HW_INSTRUCTIONS, PERF_FLAG_FD_CLOEXEC, PERF_FORMAT_GROUP,
    PERF_FORMAT_TOTAL_TIME_ENABLED, PERF_FORMAT_TOTAL_TIME_RUNNING, PERF_TYPE_HARDWARE,
};

/// Apply an ioctl to every event in the leader's group.
pub const PERF_IOC_FLAG_GROUP: libc::c_int = 1;

// The ioctls take a flags argument even though they are encoded without a payload.
// Details at https://elixir.bootlin.com/linux/v5.3.10/source/include/uapi/linux/perf_event.h#L456
ioctl_write_int_bad!(perf_event_ioc_enable, request_code_none!(b'$', 0));
ioctl_write_int_bad!(perf_event_ioc_disable, request_code_none!(b'$', 1));
ioctl_write_int_bad!(perf_event_ioc_reset, request_code_none!(b'$', 3));

/// Rust wrapper for the `perf_event_open` system call.
///
/// The returned file owns the event's descriptor.
pub fn perf_event_open(
    attr: &mut perf_event_attr,
    pid: libc::pid_t,
    cpu: libc::c_int,
    group_fd: libc::c_int,
) -> Result<std::fs::File> {
    let fd = unsafe {
        perf_event_open_sys::perf_event_open(
            attr,
            pid,
            cpu,
            group_fd,
            PERF_FLAG_FD_CLOEXEC as libc::c_ulong,
        )
    };
    match fd {
        rc if rc < 0 => Err(Error::from_errno()),
        rc => Ok(unsafe { std::fs::File::from_raw_fd(rc) }),
    }
}
