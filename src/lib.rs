//! Self-organizing master/slave role election for a fleet of service instances.
//!
//! Every instance runs the same short-lived election against a Consul agent.
//! Peers serialize through a distributed decision lock, read the current master
//! set from a stored prepared query, and either contend for a promotion lock or
//! demote themselves. The outcome is published as a `master` / `slave` tag on
//! the instance's own service registration, where the prepared query finds it.

pub mod config;
pub mod coordination;
pub mod directory;
pub mod election;
pub mod error;
pub mod gate;
pub mod memory;
pub mod params;
pub mod role;
pub mod tags;

#[cfg(feature = "consul")]
pub mod consul;

pub use config::ClientConfig;
pub use coordination::{
    AgentService, Coordinator, LockHandle, LockService, QueryDefinition, QueryService,
    ServiceRecord,
};
pub use directory::MasterSet;
pub use election::{Election, ElectionConfig, Outcome, Sleeper, ThreadSleeper};
pub use error::{Error, Result};
pub use params::ElectionParameters;
pub use role::Role;

#[cfg(feature = "consul")]
pub use consul::ConsulClient;
