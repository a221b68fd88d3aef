//! Operations consumed from the coordination service.
//!
//! The election only talks to the coordination service through these traits.
//! [`crate::consul::ConsulClient`] implements them over the Consul HTTP API and
//! [`crate::memory::MemoryAgent`] implements them in-process.

use std::collections::HashMap;
use std::time::Duration;

use crate::Result;

/// Handle for one lock acquisition attempt.
///
/// A handle that was not acquired is still usable: releasing it is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub key: String,
    pub held: bool,
    /// Backend-specific owner token (a session id for Consul).
    pub token: Option<String>,
}

impl LockHandle {
    pub fn unheld(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            held: false,
            token: None,
        }
    }

    pub fn held(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            held: true,
            token: Some(token.into()),
        }
    }

    /// True while the handle still owns backend resources.
    pub fn is_live(&self) -> bool {
        self.held || self.token.is_some()
    }
}

/// Server-held prepared query definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryDefinition {
    /// Empty until the server assigns one.
    pub id: String,
    pub name: String,
    pub service: String,
    pub only_passing: bool,
    pub tags: Vec<String>,
}

/// A service registration as held by the local agent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub address: String,
    pub port: u16,
    pub enable_tag_override: bool,
}

pub trait LockService {
    /// Attempts to take `key`.
    ///
    /// A zero `wait` tries exactly once. A positive `wait` blocks up to that
    /// long for the current holder to let go. Timing out is not an error: the
    /// returned handle has `held == false`.
    fn acquire(&self, key: &str, wait: Duration) -> Result<LockHandle>;

    /// Releases whatever `handle` still owns and marks it unheld.
    ///
    /// Safe to call on handles that were never held.
    fn release(&self, handle: &mut LockHandle) -> Result<()>;
}

pub trait QueryService {
    fn list_queries(&self) -> Result<Vec<QueryDefinition>>;

    /// Stores `definition` and returns the id the server assigned.
    fn create_query(&self, definition: &QueryDefinition) -> Result<String>;

    fn delete_query(&self, id: &str) -> Result<()>;

    /// Runs the stored query and returns the node names of matching,
    /// health-passing instances.
    fn execute_query(&self, id: &str) -> Result<Vec<String>>;
}

pub trait AgentService {
    /// Services registered with the local agent, keyed by service id.
    fn services(&self) -> Result<HashMap<String, ServiceRecord>>;

    /// Registers `record`, replacing any registration with the same id.
    fn register_service(&self, record: &ServiceRecord) -> Result<()>;

    fn local_node_name(&self) -> Result<String>;
}

/// Everything the election needs from the coordination service.
pub trait Coordinator: LockService + QueryService + AgentService {}

impl<T: LockService + QueryService + AgentService + ?Sized> Coordinator for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_liveness() {
        assert!(!LockHandle::unheld("k").is_live());
        assert!(LockHandle::held("k", "s").is_live());

        let orphan_session = LockHandle {
            key: "k".to_string(),
            held: false,
            token: Some("s".to_string()),
        };
        assert!(orphan_session.is_live());
    }
}
