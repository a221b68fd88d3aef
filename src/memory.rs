//! In-process coordination cluster.
//!
//! [`MemoryCluster`] keeps locks, prepared queries and per-node service
//! registrations in shared memory. Each [`MemoryAgent`] sees the cluster from
//! one node, the way a local Consul agent does, so several peers can run the
//! election against the same cluster from different threads.
//!
//! Every operation is appended to an event journal for inspection.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::coordination::{AgentService, LockHandle, LockService, QueryDefinition, QueryService, ServiceRecord};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire { node: String, key: String, held: bool },
    Release { node: String, key: String },
    CreateQuery { id: String, name: String },
    DeleteQuery { id: String },
    ExecuteQuery { id: String },
    Register { node: String, service: String, tags: Vec<String> },
}

#[derive(Default)]
struct State {
    /// key -> owning node
    locks: HashMap<String, String>,
    queries: Vec<QueryDefinition>,
    next_query_id: u64,
    /// node -> service id -> record
    services: BTreeMap<String, HashMap<String, ServiceRecord>>,
    scripted: VecDeque<Vec<String>>,
    events: Vec<Event>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    lock_released: Condvar,
}

#[derive(Clone, Default)]
pub struct MemoryCluster {
    shared: Arc<Shared>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the cluster from `node`.
    pub fn agent(&self, node: impl Into<String>) -> MemoryAgent {
        MemoryAgent {
            cluster: self.clone(),
            node: node.into(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `record` on `node` without journaling it.
    pub fn register(&self, node: &str, record: ServiceRecord) {
        self.state()
            .services
            .entry(node.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn service(&self, node: &str, id: &str) -> Option<ServiceRecord> {
        self.state()
            .services
            .get(node)
            .and_then(|services| services.get(id))
            .cloned()
    }

    /// Marks `key` as held by `owner`, e.g. a peer that is mid-decision.
    pub fn hold_lock(&self, key: &str, owner: &str) {
        self.state().locks.insert(key.to_string(), owner.to_string());
    }

    /// Drops `key` regardless of owner, as a session expiry would.
    pub fn expire_lock(&self, key: &str) {
        self.state().locks.remove(key);
        self.shared.lock_released.notify_all();
    }

    pub fn lock_holder(&self, key: &str) -> Option<String> {
        self.state().locks.get(key).cloned()
    }

    /// Stores a query definition without journaling it and returns its id.
    pub fn store_query(&self, mut definition: QueryDefinition) -> String {
        let mut state = self.state();
        let id = state.next_id();
        definition.id = id.clone();
        state.queries.push(definition);
        id
    }

    pub fn queries(&self) -> Vec<QueryDefinition> {
        self.state().queries.clone()
    }

    /// Queues master-set answers returned by the next query executions, in
    /// order, before falling back to evaluating registrations.
    pub fn script_master_sets<I, S>(&self, answers: I)
    where
        I: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        let mut state = self.state();
        for answer in answers {
            state
                .scripted
                .push_back(answer.into_iter().map(Into::into).collect());
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn count_events(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.state().events.iter().filter(|e| predicate(e)).count()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_query_id += 1;
        format!("query-{}", self.next_query_id)
    }

    fn matching_nodes(&self, definition: &QueryDefinition) -> Vec<String> {
        self.services
            .iter()
            .filter(|(_, services)| {
                services.values().any(|record| {
                    record.name == definition.service
                        && definition.tags.iter().all(|tag| record.tags.contains(tag))
                })
            })
            .map(|(node, _)| node.clone())
            .collect()
    }
}

/// One node's view of a [`MemoryCluster`].
#[derive(Clone)]
pub struct MemoryAgent {
    cluster: MemoryCluster,
    node: String,
}

impl MemoryAgent {
    pub fn node(&self) -> &str {
        &self.node
    }
}

impl LockService for MemoryAgent {
    fn acquire(&self, key: &str, wait: Duration) -> Result<LockHandle> {
        let deadline = Instant::now() + wait;
        let mut state = self.cluster.state();
        loop {
            if !state.locks.contains_key(key) {
                state.locks.insert(key.to_string(), self.node.clone());
                state.events.push(Event::Acquire {
                    node: self.node.clone(),
                    key: key.to_string(),
                    held: true,
                });
                return Ok(LockHandle::held(key, self.node.clone()));
            }

            let now = Instant::now();
            if now >= deadline {
                state.events.push(Event::Acquire {
                    node: self.node.clone(),
                    key: key.to_string(),
                    held: false,
                });
                return Ok(LockHandle::unheld(key));
            }

            let (next, _) = self
                .cluster
                .shared
                .lock_released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
    }

    fn release(&self, handle: &mut LockHandle) -> Result<()> {
        if handle.held {
            let mut state = self.cluster.state();
            if state.locks.get(&handle.key) == handle.token.as_ref() {
                state.locks.remove(&handle.key);
                state.events.push(Event::Release {
                    node: self.node.clone(),
                    key: handle.key.clone(),
                });
                drop(state);
                self.cluster.shared.lock_released.notify_all();
            }
        }
        handle.held = false;
        handle.token = None;
        Ok(())
    }
}

impl QueryService for MemoryAgent {
    fn list_queries(&self) -> Result<Vec<QueryDefinition>> {
        Ok(self.cluster.queries())
    }

    fn create_query(&self, definition: &QueryDefinition) -> Result<String> {
        let mut state = self.cluster.state();
        let id = state.next_id();
        let mut stored = definition.clone();
        stored.id = id.clone();
        state.queries.push(stored);
        state.events.push(Event::CreateQuery {
            id: id.clone(),
            name: definition.name.clone(),
        });
        Ok(id)
    }

    fn delete_query(&self, id: &str) -> Result<()> {
        let mut state = self.cluster.state();
        let before = state.queries.len();
        state.queries.retain(|q| q.id != id);
        if state.queries.len() == before {
            return Err(Error::Backend(format!("query '{id}' not found")));
        }
        state.events.push(Event::DeleteQuery { id: id.to_string() });
        Ok(())
    }

    fn execute_query(&self, id: &str) -> Result<Vec<String>> {
        let mut state = self.cluster.state();
        state.events.push(Event::ExecuteQuery { id: id.to_string() });
        if let Some(answer) = state.scripted.pop_front() {
            return Ok(answer);
        }
        let definition = state
            .queries
            .iter()
            .find(|q| q.id == id)
            .ok_or_else(|| Error::Backend(format!("query '{id}' not found")))?;
        Ok(state.matching_nodes(definition))
    }
}

impl AgentService for MemoryAgent {
    fn services(&self) -> Result<HashMap<String, ServiceRecord>> {
        Ok(self
            .cluster
            .state()
            .services
            .get(&self.node)
            .cloned()
            .unwrap_or_default())
    }

    fn register_service(&self, record: &ServiceRecord) -> Result<()> {
        let mut state = self.cluster.state();
        state
            .services
            .entry(self.node.clone())
            .or_default()
            .insert(record.id.clone(), record.clone());
        state.events.push(Event::Register {
            node: self.node.clone(),
            service: record.id.clone(),
            tags: record.tags.clone(),
        });
        Ok(())
    }

    fn local_node_name(&self) -> Result<String> {
        Ok(self.node.clone())
    }
}
