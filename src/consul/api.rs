//! Consul HTTP API wire types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordination::{QueryDefinition, ServiceRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AgentSelf {
    pub config: AgentSelfConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AgentSelfConfig {
    pub node_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub enable_tag_override: bool,
}

impl From<AgentService> for ServiceRecord {
    fn from(value: AgentService) -> Self {
        Self {
            id: value.id,
            name: value.service,
            tags: value.tags.unwrap_or_default(),
            address: value.address,
            port: value.port,
            enable_tag_override: value.enable_tag_override,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ServiceRegistration<'a> {
    #[serde(rename = "ID")]
    pub id: &'a str,
    pub name: &'a str,
    pub tags: &'a [String],
    pub port: u16,
    pub address: &'a str,
    pub enable_tag_override: bool,
}

impl<'a> From<&'a ServiceRecord> for ServiceRegistration<'a> {
    fn from(record: &'a ServiceRecord) -> Self {
        Self {
            id: &record.id,
            name: &record.name,
            tags: &record.tags,
            port: record.port,
            address: &record.address,
            enable_tag_override: record.enable_tag_override,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct PreparedQuery {
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub service: ServiceQuery,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ServiceQuery {
    pub service: String,
    #[serde(default)]
    pub only_passing: bool,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl From<PreparedQuery> for QueryDefinition {
    fn from(value: PreparedQuery) -> Self {
        Self {
            id: value.id,
            name: value.name,
            service: value.service.service,
            only_passing: value.service.only_passing,
            tags: value.service.tags.unwrap_or_default(),
        }
    }
}

impl From<&QueryDefinition> for PreparedQuery {
    fn from(value: &QueryDefinition) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            service: ServiceQuery {
                service: value.service.clone(),
                only_passing: value.only_passing,
                tags: Some(value.tags.clone()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct Created {
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct QueryExecution {
    #[serde(default)]
    pub nodes: Option<Vec<ServiceEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ServiceEntry {
    pub node: NodeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct NodeInfo {
    pub node: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct SessionRequest {
    pub name: String,
    #[serde(rename = "TTL")]
    pub ttl: String,
    pub behavior: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_delay: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct KvPair {
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub session: Option<String>,
}

impl KvPair {
    pub fn is_locked(&self) -> bool {
        self.session.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Formats `duration` the way Consul parses durations (`15s`, `1500ms`).
pub(super) fn duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis().max(1))
    }
}
