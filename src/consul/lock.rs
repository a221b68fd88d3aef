//! Session-backed KV locks.
//!
//! Each acquisition creates its own session with `Behavior: release`, so a
//! crashed holder loses the lock once the session TTL runs out. A lock is
//! taken with `?acquire=<session>` on the key; waiting is a blocking query on
//! the key until its session clears.

use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::{Method, StatusCode};

use super::api::{self, Created, KvPair, SessionRequest};
use super::{check_status, consul_index, ConsulClient};
use crate::coordination::{LockHandle, LockService};
use crate::{Error, Result};

/// Flags value written on lock keys, shared with the Consul client libraries.
pub const LOCK_FLAG_VALUE: u64 = 0x2ddc_cbc0_58a5_0c18;

const LOCK_RETRY_TIME: Duration = Duration::from_secs(5);

struct KeyState {
    index: u64,
    locked: bool,
}

impl ConsulClient {
    fn create_session(&self, key: &str) -> Result<String> {
        let body = SessionRequest {
            name: format!("sentinel lock {key}"),
            ttl: api::duration(self.config.session_ttl),
            behavior: "release",
            lock_delay: self.config.lock_delay.map(api::duration),
        };
        let req = self.request(Method::PUT, "v1/session/create")?.json(&body);
        let created: Created = self.send("session create", req)?.json()?;
        debug!("created session {} for '{key}'", created.id);
        Ok(created.id)
    }

    fn destroy_session(&self, session: &str) -> Result<()> {
        let req = self.request(Method::PUT, &format!("v1/session/destroy/{session}"))?;
        self.send("session destroy", req)?;
        Ok(())
    }

    fn try_acquire(&self, key: &str, session: &str) -> Result<bool> {
        let req = self.request(Method::PUT, &kv_path(key))?.query(&[
            ("acquire", session.to_string()),
            ("flags", LOCK_FLAG_VALUE.to_string()),
        ]);
        Ok(self.send("lock acquire", req)?.json()?)
    }

    /// Reads the key, blocking server-side up to `wait` for a change past
    /// `index` when given.
    fn read_key(&self, key: &str, block: Option<(u64, Duration)>) -> Result<KeyState> {
        let mut req = self.request(Method::GET, &kv_path(key))?;
        if let Some((index, wait)) = block {
            // Consul adds up to wait/16 of jitter to blocking queries.
            req = req
                .query(&[("index", index.to_string()), ("wait", api::duration(wait))])
                .timeout(self.config.timeout + wait + wait / 16);
        }
        let resp = req.send()?;
        let index = consul_index(&resp);
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(KeyState {
                index,
                locked: false,
            });
        }
        let pairs: Vec<KvPair> = check_status("lock read", resp)?.json()?;
        let Some(pair) = pairs.first() else {
            return Ok(KeyState {
                index,
                locked: false,
            });
        };
        if pair.flags != LOCK_FLAG_VALUE {
            return Err(Error::Protocol {
                op: "lock read",
                message: format!("key '{key}' exists and is not a lock (flags {:#x})", pair.flags),
            });
        }
        Ok(KeyState {
            index,
            locked: pair.is_locked(),
        })
    }

    fn acquire_with_session(&self, key: &str, session: &str, wait: Duration) -> Result<bool> {
        let deadline = Instant::now() + wait;
        loop {
            if self.try_acquire(key, session)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let state = self.read_key(key, None)?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            if state.locked {
                self.read_key(key, Some((state.index, remaining)))?;
            } else {
                // Free but not acquirable: the key is inside its lock delay.
                std::thread::sleep(remaining.min(LOCK_RETRY_TIME));
            }
        }
    }
}

impl LockService for ConsulClient {
    fn acquire(&self, key: &str, wait: Duration) -> Result<LockHandle> {
        let session = self.create_session(key)?;
        match self.acquire_with_session(key, &session, wait) {
            Ok(true) => Ok(LockHandle::held(key, session)),
            Ok(false) => {
                self.destroy_session(&session)?;
                Ok(LockHandle::unheld(key))
            }
            Err(err) => {
                if let Err(destroy_err) = self.destroy_session(&session) {
                    warn!("failed to destroy session {session}: {destroy_err}");
                }
                Err(err)
            }
        }
    }

    fn release(&self, handle: &mut LockHandle) -> Result<()> {
        let Some(session) = handle.token.take() else {
            handle.held = false;
            return Ok(());
        };
        if handle.held {
            handle.held = false;
            let req = self
                .request(Method::PUT, &kv_path(&handle.key))?
                .query(&[("release", session.as_str())]);
            let released: bool = self.send("lock release", req)?.json()?;
            if !released {
                warn!("lock '{}' was no longer held by session {session}", handle.key);
            }
        }
        self.destroy_session(&session)
    }
}

fn kv_path(key: &str) -> String {
    format!("v1/kv/{}", key.trim_start_matches('/'))
}
