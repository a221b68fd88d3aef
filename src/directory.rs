//! Master directory: the stored prepared query that answers "who is master".
//!
//! The query is owned by name. A stored definition whose service or tag set
//! disagrees with the election parameters is deleted and recreated rather than
//! patched.

use log::info;

use crate::coordination::{QueryDefinition, QueryService};
use crate::params::ElectionParameters;
use crate::Result;

/// Node names of the healthy instances currently carrying the master tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MasterSet {
    nodes: Vec<String>,
}

impl MasterSet {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    /// True when `node` is the one and only master.
    pub fn is_sole(&self, node: &str) -> bool {
        self.nodes.len() == 1 && self.nodes[0] == node
    }
}

/// Makes sure the stored query matches `params` and returns its id.
///
/// Tag sets are compared after sorting, so a stored definition that differs
/// only in tag order is reused.
pub fn reconcile<Q: QueryService + ?Sized>(queries: &Q, params: &ElectionParameters) -> Result<String> {
    let stored = queries
        .list_queries()?
        .into_iter()
        .find(|q| q.name == params.query_name());

    if let Some(existing) = stored {
        if matches_params(&existing, params) {
            info!("found query '{}' ({})", existing.name, existing.id);
            return Ok(existing.id);
        }
        info!(
            "deleting query '{}' ({}): configured for service '{}' with tags {:?}",
            existing.name, existing.id, existing.service, existing.tags
        );
        queries.delete_query(&existing.id)?;
    }

    info!("creating query '{}'", params.query_name());
    let definition = QueryDefinition {
        id: String::new(),
        name: params.query_name().to_string(),
        service: params.service_name().to_string(),
        only_passing: true,
        tags: params.required_tags().to_vec(),
    };
    let id = queries.create_query(&definition)?;
    info!("created query '{}' ({id})", definition.name);
    Ok(id)
}

pub fn execute<Q: QueryService + ?Sized>(queries: &Q, id: &str) -> Result<MasterSet> {
    Ok(MasterSet::new(queries.execute_query(id)?))
}

/// Reconciles the stored query, then executes it.
pub fn current_masters<Q: QueryService + ?Sized>(
    queries: &Q,
    params: &ElectionParameters,
) -> Result<MasterSet> {
    let id = reconcile(queries, params)?;
    execute(queries, &id)
}

fn matches_params(stored: &QueryDefinition, params: &ElectionParameters) -> bool {
    let mut tags = stored.tags.clone();
    tags.sort();
    stored.service == params.service_name() && tags == params.required_tags()
}
