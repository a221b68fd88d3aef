//! The election loop.
//!
//! Each attempt runs under the decision lock:
//!
//! ```text
//! acquire decision lock ── timed out ──────────────────────────────► retry
//!   │
//! reconcile + execute master query
//!   ├─ empty      → try promotion lock ─ won ─► tag master ────────► Promoted
//!   │                                  └ lost ─► release, back off ► retry
//!   ├─ only self  ──────────────────────────────────────────────────► AlreadyMaster
//!   └─ otherwise  → tag slave ──────────────────────────────────────► Demoted
//! ```
//!
//! Both locks are released before an attempt returns, on every path. Running
//! out of attempts is an error, never a silent success.

use std::time::Duration;

use log::{info, warn};

use crate::coordination::Coordinator;
use crate::directory;
use crate::gate;
use crate::params::ElectionParameters;
use crate::role::Role;
use crate::tags;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionConfig {
    /// How long to block waiting for the decision lock per attempt.
    /// Default: 10s
    pub decision_wait: Duration,

    /// Attempts before giving up.
    /// Default: 5
    pub max_attempts: u32,

    /// Pause after losing the promotion race.
    /// Default: 1s
    pub backoff: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            decision_wait: Duration::from_secs(10),
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Terminal state of a successful election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Won the promotion lock and tagged this instance master.
    Promoted,
    /// This instance was already the only master; nothing was written.
    AlreadyMaster,
    /// Someone else is master (or several are); tagged slave.
    Demoted,
}

impl Outcome {
    pub fn role(self) -> Role {
        match self {
            Outcome::Promoted | Outcome::AlreadyMaster => Role::Master,
            Outcome::Demoted => Role::Slave,
        }
    }
}

/// Result of a single attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Decided(Outcome),
    /// The decision lock stayed busy for the whole wait.
    NoDecisionLock,
    /// No master existed but a peer won the promotion lock.
    LostPromotion,
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct Election<'a, C: Coordinator + ?Sized, S: Sleeper = ThreadSleeper> {
    coordinator: &'a C,
    params: &'a ElectionParameters,
    config: ElectionConfig,
    sleeper: S,
}

impl<'a, C: Coordinator + ?Sized> Election<'a, C> {
    pub fn new(coordinator: &'a C, params: &'a ElectionParameters, config: ElectionConfig) -> Self {
        Self {
            coordinator,
            params,
            config,
            sleeper: ThreadSleeper,
        }
    }
}

impl<'a, C: Coordinator + ?Sized, S: Sleeper> Election<'a, C, S> {
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> Election<'a, C, T> {
        Election {
            coordinator: self.coordinator,
            params: self.params,
            config: self.config,
            sleeper,
        }
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    /// Runs attempts until one decides a role.
    ///
    /// # Errors
    ///
    /// `Error::RetriesExhausted` once `max_attempts` attempts went by without a
    /// decision. Any coordination failure is returned as-is, after the locks
    /// held by the failing attempt have been released.
    pub fn run(&self) -> Result<Outcome> {
        let attempts = self.config.max_attempts;
        for n in 1..=attempts {
            info!("election attempt {n}/{attempts}");
            match self.attempt()? {
                Attempt::Decided(outcome) => {
                    match outcome {
                        Outcome::Promoted => info!("promoted to master"),
                        Outcome::AlreadyMaster => info!("already the current master"),
                        Outcome::Demoted => info!("demoted to slave"),
                    }
                    return Ok(outcome);
                }
                Attempt::NoDecisionLock => {
                    warn!("decision lock '{}' busy", self.params.decision_lock_key());
                }
                Attempt::LostPromotion => {
                    if n < attempts {
                        self.sleeper.sleep(self.config.backoff);
                    }
                }
            }
        }
        Err(Error::RetriesExhausted { attempts })
    }

    /// One pass through the decision sequence.
    pub fn attempt(&self) -> Result<Attempt> {
        let decision = gate::acquire(
            self.coordinator,
            &self.params.decision_lock_key(),
            self.config.decision_wait,
        )?;
        if !decision.held() {
            decision.release()?;
            return Ok(Attempt::NoDecisionLock);
        }

        let masters = directory::current_masters(self.coordinator, self.params)?;

        if masters.is_empty() {
            let promotion = gate::acquire(
                self.coordinator,
                &self.params.promotion_lock_key(),
                Duration::ZERO,
            )?;
            if !promotion.held() {
                promotion.release()?;
                decision.release()?;
                return Ok(Attempt::LostPromotion);
            }
            tags::apply_role_tag(self.coordinator, self.params.service_name(), Role::Master)?;
            promotion.release()?;
            decision.release()?;
            return Ok(Attempt::Decided(Outcome::Promoted));
        }

        let node = self.coordinator.local_node_name()?;
        if masters.is_sole(&node) {
            decision.release()?;
            return Ok(Attempt::Decided(Outcome::AlreadyMaster));
        }

        if masters.len() > 1 {
            warn!("{} masters registered: {:?}", masters.len(), masters.nodes());
        }
        tags::apply_role_tag(self.coordinator, self.params.service_name(), Role::Slave)?;
        decision.release()?;
        Ok(Attempt::Decided(Outcome::Demoted))
    }
}
