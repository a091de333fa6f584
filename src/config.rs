//! Settings used while acquiring counter access.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Default location of the framework exposing `kpc_*` functions.
pub const DEFAULT_KPERF_PATH: &str = "/System/Library/PrivateFrameworks/kperf.framework/kperf";

/// Default location of the framework exposing the `kpep_*` event database.
pub const DEFAULT_KPERFDATA_PATH: &str =
    "/System/Library/PrivateFrameworks/kperfdata.framework/kperfdata";

/// Environment variable overriding `kperf_path`.
pub const ENV_KPERF: &str = "PERF_HANDLE_KPERF";
/// Environment variable overriding `kperfdata_path`.
pub const ENV_KPERFDATA: &str = "PERF_HANDLE_KPERFDATA";
/// Environment variable overriding `count_kernel`.
pub const ENV_KERNEL: &str = "PERF_HANDLE_KERNEL";
/// Environment variable overriding `count_hypervisor`.
pub const ENV_HYPERVISOR: &str = "PERF_HANDLE_HYPERVISOR";
/// Environment variable overriding `force_counters`.
pub const ENV_FORCE: &str = "PERF_HANDLE_FORCE";

/// Configuration handed to a counter backend during setup.
///
/// Settings that do not apply to the backend compiled for the current target are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    /// Path to the `kperf` framework binary.
    kperf_path: PathBuf,
    /// Path to the `kperfdata` framework binary.
    kperfdata_path: PathBuf,
    /// Count events while executing kernel code.
    ///
    /// Defaults to `false`.
    count_kernel: bool,
    /// Count events while executing hypervisor code.
    ///
    /// Defaults to `false`.
    count_hypervisor: bool,
    /// Take ownership of all counters, including the ones reserved by the OS.
    ///
    /// Defaults to `true`.
    force_counters: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        CounterConfig {
            kperf_path: PathBuf::from(DEFAULT_KPERF_PATH),
            kperfdata_path: PathBuf::from(DEFAULT_KPERFDATA_PATH),
            count_kernel: false,
            count_hypervisor: false,
            force_counters: true,
        }
    }
}

macro_rules! builder_pattern {
    ($(#[$outer:meta])* $name: ident => $var_name: ident : $var_type: ty) => {
        $(#[$outer])*
        pub fn $name(mut self, $var_name: $var_type) -> Self {
            self.$var_name = $var_name;
            self
        }
    };
}

macro_rules! builder_pattern_bool {
    ($(#[$outer:meta])* $name: ident => $var_name: ident) => {
        $(#[$outer])*
        pub fn $name(mut self) -> Self {
            self.$var_name = true;
            self
        }
    };
}

impl CounterConfig {
    /// Defaults overridden by any `PERF_HANDLE_*` environment variables that are set.
    pub fn from_env() -> Result<Self> {
        CounterConfig::from_lookup(env_value)
    }

    /// Defaults overridden by the values `lookup` returns for the `PERF_HANDLE_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Result<Option<String>>,
    {
        let mut config = CounterConfig::default();
        if let Some(path) = lookup(ENV_KPERF)? {
            config.kperf_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_KPERFDATA)? {
            config.kperfdata_path = PathBuf::from(path);
        }
        if let Some(flag) = flag(ENV_KERNEL, lookup(ENV_KERNEL)?)? {
            config.count_kernel = flag;
        }
        if let Some(flag) = flag(ENV_HYPERVISOR, lookup(ENV_HYPERVISOR)?)? {
            config.count_hypervisor = flag;
        }
        if let Some(flag) = flag(ENV_FORCE, lookup(ENV_FORCE)?)? {
            config.force_counters = flag;
        }
        Ok(config)
    }

    builder_pattern!(
        /// Load `kperf` from `kperf_path`.
        kperf_path_from => kperf_path: PathBuf
    );
    builder_pattern!(
        /// Load `kperfdata` from `kperfdata_path`.
        kperfdata_path_from => kperfdata_path: PathBuf
    );
    builder_pattern!(
        /// Choose whether all counters are forced on.
        set_force_counters => force_counters: bool
    );
    builder_pattern_bool!(
        /// Count kernel code as well.
        include_kernel => count_kernel
    );
    builder_pattern_bool!(
        /// Count hypervisor code as well.
        include_hypervisor => count_hypervisor
    );

    /// Path of the `kperf` framework.
    #[inline]
    pub fn kperf_path(&self) -> &Path {
        &self.kperf_path
    }

    /// Path of the `kperfdata` framework.
    #[inline]
    pub fn kperfdata_path(&self) -> &Path {
        &self.kperfdata_path
    }

    /// Whether kernel code is counted.
    #[inline]
    pub fn count_kernel(&self) -> bool {
        self.count_kernel
    }

    /// Whether hypervisor code is counted.
    #[inline]
    pub fn count_hypervisor(&self) -> bool {
        self.count_hypervisor
    }

    /// Whether all counters are forced on during setup.
    #[inline]
    pub fn force_counters(&self) -> bool {
        self.force_counters
    }
}

fn env_value(key: &'static str) -> Result<Option<String>> {
    match std::env::var(key) {
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn flag(key: &'static str, value: Option<String>) -> Result<Option<bool>> {
    match value {
        Some(v) => parse_flag(&v)
            .map(Some)
            .ok_or_else(|| Error::Config { key, value: v }),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CounterConfig::default();
        assert_eq!(config.kperf_path(), Path::new(DEFAULT_KPERF_PATH));
        assert_eq!(config.kperfdata_path(), Path::new(DEFAULT_KPERFDATA_PATH));
        assert!(!config.count_kernel());
        assert!(!config.count_hypervisor());
        assert!(config.force_counters());
    }

    #[test]
    fn test_builder() {
        let config = CounterConfig::default()
            .kperf_path_from(PathBuf::from("/tmp/kperf"))
            .include_kernel()
            .set_force_counters(false);
        assert_eq!(config.kperf_path(), Path::new("/tmp/kperf"));
        assert!(config.count_kernel());
        assert!(!config.count_hypervisor());
        assert!(!config.force_counters());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("2"), None);
    }

    fn lookup_in<'a>(
        vars: &'a HashMap<&'static str, &'static str>,
    ) -> impl Fn(&'static str) -> crate::Result<Option<String>> + 'a {
        move |key| Ok(vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_from_lookup() -> crate::Result<()> {
        let mut vars = HashMap::new();
        vars.insert(ENV_HYPERVISOR, "true");
        vars.insert(ENV_KPERFDATA, "/opt/kperfdata");
        vars.insert(ENV_FORCE, "off");
        let config = CounterConfig::from_lookup(lookup_in(&vars))?;
        assert!(config.count_hypervisor());
        assert!(!config.count_kernel());
        assert!(!config.force_counters());
        assert_eq!(config.kperfdata_path(), Path::new("/opt/kperfdata"));
        assert_eq!(config.kperf_path(), Path::new(DEFAULT_KPERF_PATH));
        Ok(())
    }

    #[test]
    fn test_from_lookup_empty() -> crate::Result<()> {
        let vars = HashMap::new();
        assert_eq!(
            CounterConfig::from_lookup(lookup_in(&vars))?,
            CounterConfig::default()
        );
        Ok(())
    }

    #[test]
    fn test_from_lookup_bad_flag() {
        let mut vars = HashMap::new();
        vars.insert(ENV_KERNEL, "sometimes");
        match CounterConfig::from_lookup(lookup_in(&vars)) {
            Err(Error::Config { key, value }) => {
                assert_eq!(key, ENV_KERNEL);
                assert_eq!(value, "sometimes");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
