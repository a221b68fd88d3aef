//! Per-run election parameters.
//!
//! Built once at startup and passed by reference into every component. Lock
//! keys are derived from the query and service names:
//!
//! ```text
//! check-{query_name}-{service_name}    ← decision lock
//! master-{query_name}-{service_name}   ← promotion lock
//! ```

use crate::{Error, Result};

/// Tag always required on a qualifying instance.
pub const DEFAULT_QUERY_TAG: &str = "master";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionParameters {
    query_name: String,
    service_name: String,
    required_tags: Vec<String>,
}

impl ElectionParameters {
    /// Validates the names and sorts `required_tags` canonically.
    ///
    /// [`DEFAULT_QUERY_TAG`] is always required; `required_tags` are added to
    /// it and duplicates are dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `query_name` or `service_name` is empty.
    pub fn new(
        query_name: impl Into<String>,
        service_name: impl Into<String>,
        required_tags: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let query_name = query_name.into();
        let service_name = service_name.into();
        validate_name("query name", &query_name)?;
        validate_name("service name", &service_name)?;

        let mut required_tags: Vec<String> = std::iter::once(DEFAULT_QUERY_TAG.to_string())
            .chain(required_tags)
            .collect();
        required_tags.sort();
        required_tags.dedup();

        Ok(Self {
            query_name,
            service_name,
            required_tags,
        })
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Required tags in canonical (sorted) order.
    pub fn required_tags(&self) -> &[String] {
        &self.required_tags
    }

    pub fn decision_lock_key(&self) -> String {
        format!("check-{}-{}", self.query_name, self.service_name)
    }

    pub fn promotion_lock_key(&self) -> String {
        format!("master-{}-{}", self.query_name, self.service_name)
    }
}

fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{field} is not set")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_tags_sorted() {
        let params = ElectionParameters::new("q", "web", tags(&["zone-b", "master", "api"])).unwrap();
        assert_eq!(params.required_tags(), &tags(&["api", "master", "zone-b"])[..]);
    }

    #[test]
    fn test_default_tag() {
        let params = ElectionParameters::new("q", "web", Vec::new()).unwrap();
        assert_eq!(params.required_tags(), &tags(&["master"])[..]);
    }

    #[test]
    fn test_extra_tags_keep_default() {
        let params = ElectionParameters::new("q", "web", tags(&["zone-a"])).unwrap();
        assert_eq!(params.required_tags(), &tags(&["master", "zone-a"])[..]);

        let params = ElectionParameters::new("q", "web", tags(&["master", "zone-a", "master"])).unwrap();
        assert_eq!(params.required_tags(), &tags(&["master", "zone-a"])[..]);
    }

    #[test]
    fn test_empty_names_rejected() {
        let err = ElectionParameters::new("", "web", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "query name is not set"));

        let err = ElectionParameters::new("q", "  ", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "service name is not set"));
    }

    #[test]
    fn test_lock_keys() {
        let params = ElectionParameters::new("redis-master", "redis", Vec::new()).unwrap();
        assert_eq!(params.decision_lock_key(), "check-redis-master-redis");
        assert_eq!(params.promotion_lock_key(), "master-redis-master-redis");
    }
}
