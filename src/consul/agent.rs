use std::collections::HashMap;

use reqwest::Method;

use super::api::{AgentSelf, AgentService as WireService, ServiceRegistration};
use super::ConsulClient;
use crate::coordination::{AgentService, ServiceRecord};
use crate::Result;

impl AgentService for ConsulClient {
    fn services(&self) -> Result<HashMap<String, ServiceRecord>> {
        let req = self.request(Method::GET, "v1/agent/services")?;
        let services: HashMap<String, WireService> = self.send("agent services", req)?.json()?;
        Ok(services
            .into_iter()
            .map(|(id, service)| (id, ServiceRecord::from(service)))
            .collect())
    }

    fn register_service(&self, record: &ServiceRecord) -> Result<()> {
        let req = self
            .request(Method::PUT, "v1/agent/service/register")?
            .json(&ServiceRegistration::from(record));
        self.send("service register", req)?;
        Ok(())
    }

    fn local_node_name(&self) -> Result<String> {
        let req = self.request(Method::GET, "v1/agent/self")?;
        let agent: AgentSelf = self.send("agent self", req)?.json()?;
        Ok(agent.config.node_name)
    }
}
