//! Owning handle over one set up counter backend.

use crate::backend::{CounterBackend, Platform};
use crate::{CounterConfig, CounterSnapshot, Error, Result};
use log::{debug, trace, warn};
use std::marker::PhantomData;

/// Exclusive owner of one counter backend.
///
/// A handle only exists for a backend whose setup succeeded. It cannot be cloned and is neither
/// `Send` nor `Sync`: the counters it reads belong to the thread that created it. Concurrent
/// reads and several handles sharing the same counter hardware are not supported.
pub struct CounterHandle<B: CounterBackend = Platform> {
    backend: B,
    _owner_thread: PhantomData<*mut ()>,
}

impl<B: CounterBackend> CounterHandle<B> {
    /// Set up a backend configured from the environment.
    pub fn create() -> Result<Self> {
        Self::create_with(&CounterConfig::from_env()?)
    }

    /// Set up a backend with an explicit configuration.
    pub fn create_with(config: &CounterConfig) -> Result<Self> {
        let backend = B::setup(config)?;
        debug!("counter handle created");
        Ok(CounterHandle {
            backend,
            _owner_thread: PhantomData,
        })
    }

    /// Read the counter group.
    ///
    /// Readings where the platform reports more missed branches than branches are rejected.
    pub fn read(&self) -> Result<CounterSnapshot> {
        let snapshot = self.backend.read()?;
        snapshot.validate()?;
        trace!("counter read {}", snapshot);
        Ok(snapshot)
    }

    /// Release the backend.
    pub fn destroy(self) {
        drop(self)
    }
}

impl<B: CounterBackend> Drop for CounterHandle<B> {
    fn drop(&mut self) {
        debug!("counter handle destroyed");
    }
}

impl<B: CounterBackend> std::fmt::Debug for CounterHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterHandle")
            .field("backend", &std::any::type_name::<B>())
            .finish()
    }
}

/// Create a handle, yielding `None` when the platform refuses counter access.
pub fn create<B: CounterBackend>() -> Option<CounterHandle<B>> {
    match CounterHandle::create() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("counter setup failed - {}", err);
            None
        }
    }
}

/// Release a handle. Passing `None` does nothing.
pub fn destroy<B: CounterBackend>(handle: Option<CounterHandle<B>>) {
    if let Some(handle) = handle {
        handle.destroy();
    }
}

/// Read through a possibly absent handle.
pub fn read<B: CounterBackend>(handle: Option<&CounterHandle<B>>) -> Result<CounterSnapshot> {
    handle.ok_or(Error::InvalidHandle)?.read()
}

/// Read through a possibly absent handle into `out`.
///
/// `out` is only written when the read succeeds.
pub fn read_into<B: CounterBackend>(
    handle: Option<&CounterHandle<B>>,
    out: &mut CounterSnapshot,
) -> Result<()> {
    *out = read(handle)?;
    Ok(())
}
