//! Scoped lock acquisition.
//!
//! [`acquire`] returns a [`LockGuard`] whether or not the lock was taken. The
//! guard releases on every exit path: explicitly through
//! [`LockGuard::release`], or best-effort on drop when the enclosing scope
//! bails out with an error.

use std::time::Duration;

use log::{info, warn};

use crate::coordination::{LockHandle, LockService};
use crate::Result;

pub struct LockGuard<'a, L: LockService + ?Sized> {
    locks: &'a L,
    handle: LockHandle,
}

/// Attempts to take `key`, waiting up to `wait` (zero means try once).
///
/// # Errors
///
/// Only transport or protocol failures are errors. Losing the race returns a
/// guard with `held() == false`.
pub fn acquire<'a, L: LockService + ?Sized>(
    locks: &'a L,
    key: &str,
    wait: Duration,
) -> Result<LockGuard<'a, L>> {
    let handle = locks.acquire(key, wait)?;
    if handle.held {
        info!("got lock for '{key}'");
    } else {
        info!("lock acquisition for '{key}' failed");
    }
    Ok(LockGuard { locks, handle })
}

impl<'a, L: LockService + ?Sized> LockGuard<'a, L> {
    pub fn held(&self) -> bool {
        self.handle.held
    }

    pub fn key(&self) -> &str {
        &self.handle.key
    }

    /// Releases the lock now, surfacing any failure.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if !self.handle.is_live() {
            return Ok(());
        }
        let was_held = self.handle.held;
        let res = self.locks.release(&mut self.handle);
        // Never retry a release from drop, even if this one failed.
        self.handle.held = false;
        self.handle.token = None;
        res?;
        if was_held {
            info!("released lock '{}'", self.handle.key);
        }
        Ok(())
    }
}

impl<'a, L: LockService + ?Sized> Drop for LockGuard<'a, L> {
    fn drop(&mut self) {
        if let Err(err) = self.release_inner() {
            warn!("failed to release lock '{}': {err}", self.handle.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Event, MemoryCluster};
    use crate::Error;

    #[test]
    fn test_explicit_release() {
        let cluster = MemoryCluster::new();
        let agent = cluster.agent("node-a");

        let guard = acquire(&agent, "check-q-web", Duration::ZERO).unwrap();
        assert!(guard.held());
        assert_eq!(cluster.lock_holder("check-q-web").as_deref(), Some("node-a"));

        guard.release().unwrap();
        assert_eq!(cluster.lock_holder("check-q-web"), None);
        assert_eq!(cluster.count_events(|e| matches!(e, Event::Release { .. })), 1);
    }

    #[test]
    fn test_release_on_error_path() {
        let cluster = MemoryCluster::new();
        let agent = cluster.agent("node-a");

        let failing = || -> Result<()> {
            let _guard = acquire(&agent, "master-q-web", Duration::ZERO)?;
            Err(Error::Backend("agent unreachable".to_string()))
        };
        assert!(failing().is_err());
        assert_eq!(cluster.lock_holder("master-q-web"), None);
    }

    #[test]
    fn test_unheld_release_is_noop() {
        let cluster = MemoryCluster::new();
        cluster.hold_lock("master-q-web", "node-b");
        let agent = cluster.agent("node-a");

        let guard = acquire(&agent, "master-q-web", Duration::ZERO).unwrap();
        assert!(!guard.held());
        guard.release().unwrap();

        assert_eq!(cluster.lock_holder("master-q-web").as_deref(), Some("node-b"));
        assert_eq!(cluster.count_events(|e| matches!(e, Event::Release { .. })), 0);
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let cluster = MemoryCluster::new();
        cluster.hold_lock("check-q-web", "node-b");
        let agent = cluster.agent("node-a");

        let guard = acquire(&agent, "check-q-web", Duration::from_millis(20)).unwrap();
        assert!(!guard.held());
    }
}
