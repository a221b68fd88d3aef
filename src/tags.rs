//! Role tag editing on the instance's own service registration.
//!
//! The agent API has no partial tag update, so a role change re-registers the
//! whole record with every other attribute untouched.

use log::info;

use crate::coordination::{AgentService, ServiceRecord};
use crate::role::Role;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    /// `role` was already present; nothing was written.
    Unchanged,
    /// The registration was rewritten. `previous` is the role tag removed, if any.
    Applied { previous: Option<Role> },
}

/// Returns `tags` with every role tag stripped and `role` appended, or `None`
/// if `role` is already present.
pub fn retag(tags: &[String], role: Role) -> Option<Vec<String>> {
    if tags.iter().any(|t| t == role.as_str()) {
        return None;
    }
    let mut next: Vec<String> = tags
        .iter()
        .filter(|t| Role::from_tag(t).is_none())
        .cloned()
        .collect();
    next.push(role.as_str().to_string());
    Some(next)
}

/// Finds the registration for `service` by id, falling back to service name.
///
/// The name fallback only succeeds when exactly one registration carries
/// that name; several matches are a `Config` error naming their ids.
pub fn find_service<A: AgentService + ?Sized>(agent: &A, service: &str) -> Result<ServiceRecord> {
    let mut services = agent.services()?;
    if let Some(record) = services.remove(service) {
        return Ok(record);
    }
    let mut matches: Vec<ServiceRecord> = services
        .into_values()
        .filter(|record| record.name == service)
        .collect();
    match matches.len() {
        0 => Err(Error::ServiceNotRegistered(service.to_string())),
        1 => Ok(matches.remove(0)),
        _ => {
            let mut ids: Vec<&str> = matches.iter().map(|r| r.id.as_str()).collect();
            ids.sort_unstable();
            Err(Error::Config(format!(
                "service name '{service}' matches several registrations ({}); pass a service id",
                ids.join(", ")
            )))
        }
    }
}

/// Publishes `role` on the local registration of `service`.
pub fn apply_role_tag<A: AgentService + ?Sized>(agent: &A, service: &str, role: Role) -> Result<TagChange> {
    let current = find_service(agent, service)?;
    let Some(tags) = retag(&current.tags, role) else {
        info!("tag '{role}' already present on service '{}'", current.name);
        return Ok(TagChange::Unchanged);
    };

    let previous = current.tags.iter().find_map(|t| Role::from_tag(t));
    info!("adding tag '{role}' to service '{}'", current.name);
    let record = ServiceRecord { tags, ..current };
    agent.register_service(&record)?;
    info!("service '{}' now tagged {:?}", record.name, record.tags);
    Ok(TagChange::Applied { previous })
}
