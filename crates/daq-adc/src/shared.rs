use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// A device handle that can be cloned across threads.
///
/// Each acquisition call rewrites device configuration and is not atomic on the bus, so
/// only one caller at a time may hold the driver. Every clone shares the same lock.
#[derive(Debug)]
pub struct SharedDevice<D> {
    inner: Arc<Mutex<D>>,
}

impl<D> SharedDevice<D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Blocks until the handle is free and returns exclusive access to the driver.
    pub fn lock(&self) -> MutexGuard<'_, D> {
        self.inner.lock()
    }

    /// Runs `f` with exclusive access to the driver.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Returns the driver if this is the last clone of the handle.
    pub fn try_unwrap(self) -> Result<D, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<D> Clone for SharedDevice<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> From<D> for SharedDevice<D> {
    fn from(device: D) -> Self {
        Self::new(device)
    }
}
