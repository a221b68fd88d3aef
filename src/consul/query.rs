use reqwest::Method;

use super::api::{Created, PreparedQuery, QueryExecution};
use super::ConsulClient;
use crate::coordination::{QueryDefinition, QueryService};
use crate::{Error, Result};

impl QueryService for ConsulClient {
    fn list_queries(&self) -> Result<Vec<QueryDefinition>> {
        let req = self.request(Method::GET, "v1/query")?;
        let queries: Option<Vec<PreparedQuery>> = self.send("query list", req)?.json()?;
        Ok(queries
            .unwrap_or_default()
            .into_iter()
            .map(QueryDefinition::from)
            .collect())
    }

    fn create_query(&self, definition: &QueryDefinition) -> Result<String> {
        let req = self
            .request(Method::POST, "v1/query")?
            .json(&PreparedQuery::from(definition));
        let created: Created = self.send("query create", req)?.json()?;
        if created.id.is_empty() {
            return Err(Error::Protocol {
                op: "query create",
                message: "empty query id".to_string(),
            });
        }
        Ok(created.id)
    }

    fn delete_query(&self, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("v1/query/{id}"))?;
        self.send("query delete", req)?;
        Ok(())
    }

    fn execute_query(&self, id: &str) -> Result<Vec<String>> {
        let req = self.request(Method::GET, &format!("v1/query/{id}/execute"))?;
        let execution: QueryExecution = self.send("query execute", req)?.json()?;
        Ok(execution
            .nodes
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.node.node)
            .collect())
    }
}
