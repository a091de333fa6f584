//! Dynamically loaded interfaces of the private `kperf` and `kperfdata` frameworks.
//!
//! Neither framework ships headers, so the function tables below are resolved by name with
//! `dlsym` once the framework binary is loaded.

#![allow(non_camel_case_types)]

use crate::{Error, Result};
use nix::libc;
use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Maximum number of counters a `kpc_get_thread_counters` buffer needs to hold.
pub const KPC_MAX_COUNTERS: usize = 32;

/// Configurable counters.
pub const KPC_CLASS_CONFIGURABLE_MASK: u32 = 1 << 1;

/// Value programmed into a configurable counter register.
pub type kpc_config_t = u64;

/// Opaque event database.
#[repr(C)]
pub struct kpep_db {
    _private: [u8; 0],
}

/// Opaque event configuration.
#[repr(C)]
pub struct kpep_config {
    _private: [u8; 0],
}

/// Opaque event reference owned by the database.
#[repr(C)]
pub struct kpep_event {
    _private: [u8; 0],
}

/// Description of a `kpep_*` error code.
pub fn kpep_error_name(code: i32) -> &'static str {
    match code {
        0 => "none",
        1 => "invalid argument",
        2 => "out of memory",
        3 => "I/O",
        4 => "buffer too small",
        5 => "current system unknown",
        6 => "database path invalid",
        7 => "database not found",
        8 => "database architecture unsupported",
        9 => "database version unsupported",
        10 => "database corrupt",
        11 => "event not found",
        12 => "conflicting events",
        13 => "all counters must be forced",
        14 => "event unavailable",
        15 => "check errno",
        _ => "unknown error",
    }
}

/// Map the return value of a `kpep_*` call to a result.
pub fn check_kpep(call: &'static str, code: i32) -> Result<()> {
    match code {
        0 => Ok(()),
        2 => Err(Error::OutOfMemory),
        code => Err(Error::Kpep {
            call,
            code,
            reason: kpep_error_name(code),
        }),
    }
}

/// Map the return value of a `kpc_*` call to a result.
pub fn check_kpc(call: &'static str, code: i32) -> Result<()> {
    match code {
        0 => Ok(()),
        code => match nix::errno::Errno::last() {
            nix::errno::Errno::EPERM | nix::errno::Errno::EACCES => Err(Error::PerfNotCapable),
            _ => Err(Error::Kpc { call, code }),
        },
    }
}

fn last_dl_error() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        String::from("unknown error")
    } else {
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}

/// A framework binary loaded with `dlopen`. Unloaded on drop.
#[derive(Debug)]
pub struct Library {
    handle: *mut libc::c_void,
}

impl Library {
    /// Load the binary at `path`.
    pub fn open(path: &Path) -> Result<Library> {
        let load_error = |reason: String| Error::LibraryLoad {
            path: path.display().to_string(),
            reason,
        };
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| load_error(String::from("path contains a NUL byte")))?;
        let handle = unsafe { libc::dlopen(cpath.as_ptr(), libc::RTLD_LAZY) };
        if handle.is_null() {
            return Err(load_error(last_dl_error()));
        }
        Ok(Library { handle })
    }

    /// Address of the exported function `name`.
    pub fn symbol(&self, name: &'static str) -> Result<*mut libc::c_void> {
        let cname = CString::new(name).map_err(|_| Error::MissingSymbol(name))?;
        let sym = unsafe { libc::dlsym(self.handle, cname.as_ptr()) };
        if sym.is_null() {
            log::debug!("dlsym {} - {}", name, last_dl_error());
            return Err(Error::MissingSymbol(name));
        }
        Ok(sym)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

macro_rules! symbol_table {
    ($(#[$outer:meta])* $table: ident {
        $($name: ident : fn($($arg: ty),*) -> $ret: ty;)*
    }) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy)]
        pub struct $table {
            $(pub $name: unsafe extern "C" fn($($arg),*) -> $ret,)*
        }

        impl $table {
            /// Resolve every function of the table in `lib`.
            pub fn load(lib: &Library) -> Result<Self> {
                Ok($table {
                    $($name: unsafe {
                        std::mem::transmute::<*mut libc::c_void, unsafe extern "C" fn($($arg),*) -> $ret>(
                            lib.symbol(stringify!($name))?,
                        )
                    },)*
                })
            }
        }
    };
}

symbol_table!(
    /// Counter control functions exported by `kperf`.
    Kpc {
        kpc_force_all_ctrs_get: fn(*mut libc::c_int) -> libc::c_int;
        kpc_force_all_ctrs_set: fn(libc::c_int) -> libc::c_int;
        kpc_set_counting: fn(u32) -> libc::c_int;
        kpc_set_thread_counting: fn(u32) -> libc::c_int;
        kpc_set_config: fn(u32, *mut kpc_config_t) -> libc::c_int;
        kpc_get_thread_counters: fn(u32, u32, *mut u64) -> libc::c_int;
    }
);

symbol_table!(
    /// Event database functions exported by `kperfdata`.
    Kpep {
        kpep_db_create: fn(*const libc::c_char, *mut *mut kpep_db) -> libc::c_int;
        kpep_db_free: fn(*mut kpep_db) -> ();
        kpep_db_event: fn(*mut kpep_db, *const libc::c_char, *mut *mut kpep_event) -> libc::c_int;
        kpep_config_create: fn(*mut kpep_db, *mut *mut kpep_config) -> libc::c_int;
        kpep_config_free: fn(*mut kpep_config) -> ();
        kpep_config_force_counters: fn(*mut kpep_config) -> libc::c_int;
        kpep_config_add_event: fn(*mut kpep_config, *mut *mut kpep_event, u32, *mut u32) -> libc::c_int;
        kpep_config_kpc_classes: fn(*mut kpep_config, *mut u32) -> libc::c_int;
        kpep_config_kpc_count: fn(*mut kpep_config, *mut usize) -> libc::c_int;
        kpep_config_kpc_map: fn(*mut kpep_config, *mut usize, usize) -> libc::c_int;
        kpep_config_kpc: fn(*mut kpep_config, *mut kpc_config_t, usize) -> libc::c_int;
    }
);

/// Event database, freed on drop.
pub struct KpepDb<'a> {
    kpep: &'a Kpep,
    pub ptr: *mut kpep_db,
}

impl<'a> KpepDb<'a> {
    /// Open the database describing the running CPU.
    pub fn for_current_cpu(kpep: &'a Kpep) -> Result<Self> {
        let mut ptr = std::ptr::null_mut();
        check_kpep("kpep_db_create", unsafe {
            (kpep.kpep_db_create)(std::ptr::null(), &mut ptr)
        })?;
        Ok(KpepDb { kpep, ptr })
    }
}

impl Drop for KpepDb<'_> {
    fn drop(&mut self) {
        unsafe { (self.kpep.kpep_db_free)(self.ptr) }
    }
}

/// Event configuration, freed on drop.
pub struct KpepConfig<'a> {
    kpep: &'a Kpep,
    pub ptr: *mut kpep_config,
}

impl<'a> KpepConfig<'a> {
    /// Start an empty configuration for events of `db`.
    pub fn new(kpep: &'a Kpep, db: &KpepDb<'_>) -> Result<Self> {
        let mut ptr = std::ptr::null_mut();
        check_kpep("kpep_config_create", unsafe {
            (kpep.kpep_config_create)(db.ptr, &mut ptr)
        })?;
        Ok(KpepConfig { kpep, ptr })
    }
}

impl Drop for KpepConfig<'_> {
    fn drop(&mut self) {
        unsafe { (self.kpep.kpep_config_free)(self.ptr) }
    }
}
