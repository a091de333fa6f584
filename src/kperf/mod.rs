//! Counter backend for Apple silicon, built on the private `kperf` frameworks.
//!
//! `kperfdata` translates event names into register programming for the running CPU and `kperf`
//! applies it. Programming the counters requires root privileges.

mod ffi;
mod events;

use crate::backend::CounterBackend;
use crate::counters::NUM_COUNTERS;
use crate::{CounterConfig, CounterSnapshot, Error, Result};
use ffi::{check_kpc, check_kpep, Kpc, Kpep, KpepConfig, KpepDb, Library};
use ffi::{kpc_config_t, KPC_CLASS_CONFIGURABLE_MASK, KPC_MAX_COUNTERS};
use log::{debug, warn};

/// Register programming computed by `kperfdata` for the counter group.
struct Program {
    classes: u32,
    reg_count: usize,
    counter_map: [usize; NUM_COUNTERS],
    regs: [kpc_config_t; KPC_MAX_COUNTERS],
}

fn program(kpep: &Kpep) -> Result<Program> {
    let db = KpepDb::for_current_cpu(kpep)?;
    let cfg = KpepConfig::new(kpep, &db)?;
    check_kpep("kpep_config_force_counters", unsafe {
        (kpep.kpep_config_force_counters)(cfg.ptr)
    })?;

    for &(event, aliases) in events::EVENT_ALIASES.iter() {
        let mut ev = events::find_event(kpep, &db, event, aliases)?;
        check_kpep("kpep_config_add_event", unsafe {
            (kpep.kpep_config_add_event)(cfg.ptr, &mut ev, 0, std::ptr::null_mut())
        })?;
    }

    let mut classes = 0u32;
    let mut reg_count = 0usize;
    let mut map = [0usize; KPC_MAX_COUNTERS];
    let mut regs = [0 as kpc_config_t; KPC_MAX_COUNTERS];
    unsafe {
        check_kpep(
            "kpep_config_kpc_classes",
            (kpep.kpep_config_kpc_classes)(cfg.ptr, &mut classes),
        )?;
        check_kpep(
            "kpep_config_kpc_count",
            (kpep.kpep_config_kpc_count)(cfg.ptr, &mut reg_count),
        )?;
        check_kpep(
            "kpep_config_kpc_map",
            (kpep.kpep_config_kpc_map)(cfg.ptr, map.as_mut_ptr(), std::mem::size_of_val(&map)),
        )?;
        check_kpep(
            "kpep_config_kpc",
            (kpep.kpep_config_kpc)(cfg.ptr, regs.as_mut_ptr(), std::mem::size_of_val(&regs)),
        )?;
    }

    let mut counter_map = [0usize; NUM_COUNTERS];
    counter_map.copy_from_slice(&map[..NUM_COUNTERS]);
    if let Some(&idx) = counter_map.iter().find(|&&idx| idx >= KPC_MAX_COUNTERS) {
        return Err(Error::Kpep {
            call: "kpep_config_kpc_map",
            code: idx as i32,
            reason: "counter index out of range",
        });
    }
    Ok(Program {
        classes,
        reg_count,
        counter_map,
        regs,
    })
}

/// Thread counters of the calling thread, programmed through `kperf`.
#[derive(Debug)]
pub struct KperfBackend {
    kpc: Kpc,
    classes: u32,
    counter_map: [usize; NUM_COUNTERS],
    forced: bool,
    counting: bool,
    _kperfdata: Library,
    _kperf: Library,
}

impl CounterBackend for KperfBackend {
    fn setup(config: &CounterConfig) -> Result<Self> {
        let kperf = Library::open(config.kperf_path())?;
        let kperfdata = Library::open(config.kperfdata_path())?;
        let kpc = Kpc::load(&kperf)?;
        let kpep = Kpep::load(&kperfdata)?;

        let mut force_state = 0;
        if unsafe { (kpc.kpc_force_all_ctrs_get)(&mut force_state) } != 0 {
            warn!("kpc_force_all_ctrs_get failed, counters require root privileges");
            return Err(Error::PerfNotCapable);
        }

        let mut prog = program(&kpep)?;
        debug!(
            "kpep classes {:#x}, {} registers, map {:?}",
            prog.classes, prog.reg_count, prog.counter_map
        );

        // From here on `Drop` undoes whatever was switched on.
        let mut backend = KperfBackend {
            kpc,
            classes: prog.classes,
            counter_map: prog.counter_map,
            forced: false,
            counting: false,
            _kperfdata: kperfdata,
            _kperf: kperf,
        };
        unsafe {
            if config.force_counters() {
                check_kpc("kpc_force_all_ctrs_set", (kpc.kpc_force_all_ctrs_set)(1))?;
                backend.forced = true;
            }
            if prog.classes & KPC_CLASS_CONFIGURABLE_MASK != 0 && prog.reg_count > 0 {
                check_kpc(
                    "kpc_set_config",
                    (kpc.kpc_set_config)(prog.classes, prog.regs.as_mut_ptr()),
                )?;
            }
            backend.counting = true;
            check_kpc("kpc_set_counting", (kpc.kpc_set_counting)(prog.classes))?;
            check_kpc(
                "kpc_set_thread_counting",
                (kpc.kpc_set_thread_counting)(prog.classes),
            )?;
        }
        Ok(backend)
    }

    fn read(&self) -> Result<CounterSnapshot> {
        let mut counters = [0u64; KPC_MAX_COUNTERS];
        check_kpc("kpc_get_thread_counters", unsafe {
            (self.kpc.kpc_get_thread_counters)(0, KPC_MAX_COUNTERS as u32, counters.as_mut_ptr())
        })?;
        let mut values = [0u64; NUM_COUNTERS];
        for (value, &idx) in values.iter_mut().zip(self.counter_map.iter()) {
            *value = counters[idx];
        }
        Ok(CounterSnapshot::from(values))
    }
}

impl Drop for KperfBackend {
    fn drop(&mut self) {
        unsafe {
            if self.counting {
                (self.kpc.kpc_set_thread_counting)(0);
                (self.kpc.kpc_set_counting)(0);
            }
            if self.forced {
                (self.kpc.kpc_force_all_ctrs_set)(0);
            }
        }
        debug!("kperf counters released (classes {:#x})", self.classes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_framework_fails_setup() {
        let config = CounterConfig::default().kperf_path_from(PathBuf::from("/nonexistent/kperf"));
        match KperfBackend::setup(&config) {
            Err(Error::LibraryLoad { .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_kperf_read() {
        match KperfBackend::setup(&CounterConfig::default()) {
            Ok(backend) => {
                let before = backend.read().expect("read");
                let after = backend.read().expect("read");
                assert!(after.cycles >= before.cycles);
                assert!(after.instructions >= before.instructions);
            }
            // Not running as root.
            Err(err) => assert!(err.is_setup_failure(), "{}", err),
        }
    }
}
