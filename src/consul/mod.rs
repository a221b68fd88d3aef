//! Consul HTTP backend.
//!
//! One blocking client implements every collaborator trait: agent
//! registrations, prepared queries, and session-backed KV locks.

mod agent;
mod api;
mod lock;
mod query;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use url::Url;

use crate::config::ClientConfig;
use crate::{Error, Result};

pub use lock::LOCK_FLAG_VALUE;

const TOKEN_HEADER: &str = "X-Consul-Token";
const INDEX_HEADER: &str = "X-Consul-Index";

pub struct ConsulClient {
    http: Client,
    base: Url,
    config: ClientConfig,
}

impl ConsulClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url()).map_err(|err| {
            Error::Config(format!("invalid consul address '{}': {err}", config.address))
        })?;
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, base, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|err| Error::Config(format!("invalid request path '{path}': {err}")))?;
        debug!("{method} {url}");
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.config.token {
            req = req.header(TOKEN_HEADER, token);
        }
        if let Some(dc) = &self.config.datacenter {
            req = req.query(&[("dc", dc)]);
        }
        Ok(req)
    }

    fn send(&self, op: &'static str, req: RequestBuilder) -> Result<Response> {
        check_status(op, req.send()?)
    }
}

fn check_status(op: &'static str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(Error::Status {
        op,
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

fn consul_index(resp: &Response) -> u64 {
    resp.headers()
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
