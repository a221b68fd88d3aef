use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use sentinel::{ClientConfig, ConsulClient, Election, ElectionConfig, ElectionParameters, Outcome};

const EXIT_FAILURE: u8 = 1;
const EXIT_EXHAUSTED: u8 = 2;

/// Elect a master among the instances of a Consul service and publish the
/// result as a `master` / `slave` tag on the local registration.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the prepared query that returns the current master
    #[arg(long)]
    consul_query_name: Option<String>,

    /// Service ID of the local registration to tag
    #[arg(long)]
    consul_service_name: Option<String>,

    /// Extra tag required on master instances (repeatable; "master" is always set)
    #[arg(long = "consul-query-tag")]
    consul_query_tags: Vec<String>,

    /// Consul agent address (overrides CONSUL_HTTP_ADDR)
    #[arg(long)]
    consul_addr: Option<String>,

    /// ACL token (overrides CONSUL_HTTP_TOKEN)
    #[arg(long)]
    consul_token: Option<String>,

    /// Datacenter to target instead of the agent's own
    #[arg(long)]
    consul_datacenter: Option<String>,

    /// Election attempts before giving up
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    attempts: u32,

    /// Seconds to wait for the decision lock on each attempt
    #[arg(long, default_value_t = 10)]
    decision_wait_secs: u64,

    /// Seconds to back off after losing the promotion race
    #[arg(long, default_value_t = 1)]
    backoff_secs: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(outcome) => {
            info!("role: {}", outcome.role());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            let exhausted = err
                .downcast_ref::<sentinel::Error>()
                .is_some_and(sentinel::Error::is_exhaustion);
            ExitCode::from(if exhausted { EXIT_EXHAUSTED } else { EXIT_FAILURE })
        }
    }
}

fn run(args: Args) -> Result<Outcome> {
    let params = ElectionParameters::new(
        args.consul_query_name.unwrap_or_default(),
        args.consul_service_name.unwrap_or_default(),
        args.consul_query_tags,
    )?;
    let election_config = ElectionConfig {
        decision_wait: Duration::from_secs(args.decision_wait_secs),
        max_attempts: args.attempts,
        backoff: Duration::from_secs(args.backoff_secs),
    };

    let mut client_config = ClientConfig::from_env();
    if let Some(addr) = args.consul_addr {
        client_config.address = addr;
    }
    if let Some(token) = args.consul_token {
        client_config.token = Some(token);
    }
    client_config.datacenter = args.consul_datacenter;

    info!(
        "electing for service '{}' via query '{}' (tags {:?})",
        params.service_name(),
        params.query_name(),
        params.required_tags()
    );

    let client = ConsulClient::new(client_config).context("failed to build consul client")?;
    let outcome = Election::new(&client, &params, election_config).run()?;
    Ok(outcome)
}
