// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Cross-platform named counting semaphore.
// Delegates to platform::PlatformSemaphore (POSIX or Windows).

use std::io;
use std::time::Duration;

use crate::platform::PlatformSemaphore;

/// A named, kernel-persistent counting semaphore.
///
/// `create_or_open` matches the named-synchronization-primitive contract:
/// if the name already exists, its current count is left untouched and
/// `initial_count` is ignored. `wait`/`post` are the only operations the
/// channel protocol needs.
pub struct IpcSemaphore {
    inner: PlatformSemaphore,
}

impl IpcSemaphore {
    /// Create the named semaphore if absent, or open the existing one.
    pub fn create_or_open(name: &str, initial_count: u32) -> io::Result<Self> {
        let inner = PlatformSemaphore::create_or_open(name, initial_count)?;
        Ok(Self { inner })
    }

    /// Open an existing named semaphore. Fails if it does not exist.
    pub fn open_existing(name: &str) -> io::Result<Self> {
        let inner = PlatformSemaphore::open_existing(name)?;
        Ok(Self { inner })
    }

    /// Decrement, blocking while the count is zero.
    ///
    /// `None` blocks indefinitely. `Some(d)` returns `Ok(false)` once `d`
    /// elapses without the count becoming positive, rather than blocking
    /// forever; `Some(Duration::ZERO)` polls once without sleeping.
    pub fn wait(&self, timeout: Option<Duration>) -> io::Result<bool> {
        self.inner.wait(timeout)
    }

    /// Increment the count by `n`, waking up to `n` waiters.
    pub fn post(&self, n: u32) -> io::Result<()> {
        self.inner.post(n)
    }

    /// Remove `name` from the OS namespace. Existing handles remain valid
    /// until closed. Not an error if the name is already gone.
    pub fn clear_storage(name: &str) {
        PlatformSemaphore::clear_storage(name);
    }
}
