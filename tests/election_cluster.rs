use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use sentinel::memory::{Event, MemoryCluster};
use sentinel::{Election, ElectionConfig, ElectionParameters, Outcome, Role, ServiceRecord};

const NODES: [&str; 4] = ["node-a", "node-b", "node-c", "node-d"];

fn params() -> ElectionParameters {
    ElectionParameters::new("redis-master", "redis", vec!["master".to_string()]).expect("params")
}

fn config() -> ElectionConfig {
    ElectionConfig {
        decision_wait: Duration::from_secs(2),
        max_attempts: 5,
        backoff: Duration::from_millis(5),
    }
}

fn redis(node: &str, tags: &[&str]) -> ServiceRecord {
    ServiceRecord {
        id: "redis".to_string(),
        name: "redis".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        address: format!("{node}.internal"),
        port: 6379,
        enable_tag_override: false,
    }
}

fn role_of(cluster: &MemoryCluster, node: &str) -> Option<Role> {
    let record = cluster.service(node, "redis").expect("registered");
    let roles: Vec<Role> = record.tags.iter().filter_map(|t| Role::from_tag(t)).collect();
    assert!(roles.len() <= 1, "{node} carries {roles:?}");
    roles.first().copied()
}

fn run_all_concurrently(cluster: &MemoryCluster) -> Vec<(String, Outcome)> {
    let barrier = Arc::new(Barrier::new(NODES.len()));
    let handles: Vec<_> = NODES
        .iter()
        .map(|node| {
            let agent = cluster.agent(*node);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let params = params();
                barrier.wait();
                let outcome = Election::new(&agent, &params, config())
                    .run()
                    .expect("election");
                (agent.node().to_string(), outcome)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("peer thread"))
        .collect()
}

#[test]
fn concurrent_peers_converge_on_one_master() {
    let cluster = MemoryCluster::new();
    for node in NODES {
        cluster.register(node, redis(node, &["v7"]));
    }

    let outcomes = run_all_concurrently(&cluster);

    let promoted: Vec<_> = outcomes
        .iter()
        .filter(|(_, o)| *o == Outcome::Promoted)
        .collect();
    assert_eq!(promoted.len(), 1, "outcomes: {outcomes:?}");
    let master = &promoted[0].0;

    for node in NODES {
        let expected = if node == master { Role::Master } else { Role::Slave };
        assert_eq!(role_of(&cluster, node), Some(expected));
        assert!(cluster.service(node, "redis").unwrap().tags.contains(&"v7".to_string()));
    }

    assert_eq!(cluster.queries().len(), 1);
    assert_eq!(cluster.lock_holder("check-redis-master-redis"), None);
    assert_eq!(cluster.lock_holder("master-redis-master-redis"), None);
}

#[test]
fn rerun_after_convergence_is_stable() {
    let cluster = MemoryCluster::new();
    for node in NODES {
        cluster.register(node, redis(node, &[]));
    }
    run_all_concurrently(&cluster);
    cluster.clear_events();

    let outcomes = run_all_concurrently(&cluster);

    let already = outcomes
        .iter()
        .filter(|(_, o)| *o == Outcome::AlreadyMaster)
        .count();
    assert_eq!(already, 1, "outcomes: {outcomes:?}");
    assert_eq!(cluster.count_events(|e| matches!(e, Event::Register { .. })), 0);
    assert_eq!(cluster.count_events(|e| matches!(e, Event::CreateQuery { .. })), 0);
}

#[test]
fn restarted_master_keeps_role() {
    let cluster = MemoryCluster::new();
    cluster.register("node-a", redis("node-a", &["master"]));
    cluster.register("node-b", redis("node-b", &["slave"]));

    let agent = cluster.agent("node-a");
    let params = params();
    let outcome = Election::new(&agent, &params, config()).run().unwrap();

    assert_eq!(outcome, Outcome::AlreadyMaster);
    assert_eq!(role_of(&cluster, "node-a"), Some(Role::Master));
}

#[test]
fn crashed_master_is_replaced() {
    let cluster = MemoryCluster::new();
    cluster.register("node-b", redis("node-b", &["slave"]));
    cluster.register("node-c", redis("node-c", &["slave"]));

    // node-a died mid-promotion; its session expired and took the lock with it.
    cluster.hold_lock("master-redis-master-redis", "node-a");
    cluster.expire_lock("master-redis-master-redis");

    let agent = cluster.agent("node-b");
    let params = params();
    let outcome = Election::new(&agent, &params, config()).run().unwrap();

    assert_eq!(outcome, Outcome::Promoted);
    assert_eq!(role_of(&cluster, "node-b"), Some(Role::Master));
    assert_eq!(role_of(&cluster, "node-c"), Some(Role::Slave));
}

#[test]
fn split_brain_converges_over_reruns() {
    let cluster = MemoryCluster::new();
    cluster.register("node-a", redis("node-a", &["master"]));
    cluster.register("node-b", redis("node-b", &["master"]));
    let params = params();

    let first = Election::new(&cluster.agent("node-a"), &params, config()).run().unwrap();
    assert_eq!(first, Outcome::Demoted);
    assert_eq!(role_of(&cluster, "node-a"), Some(Role::Slave));

    let second = Election::new(&cluster.agent("node-b"), &params, config()).run().unwrap();
    assert_eq!(second, Outcome::AlreadyMaster);
    assert_eq!(role_of(&cluster, "node-b"), Some(Role::Master));
}

#[test]
fn stale_query_definition_is_replaced() {
    let cluster = MemoryCluster::new();
    cluster.register("node-a", redis("node-a", &["primary"]));
    let stale = cluster.store_query(sentinel::QueryDefinition {
        name: "redis-master".to_string(),
        service: "redis".to_string(),
        only_passing: true,
        tags: vec!["primary".to_string()],
        ..Default::default()
    });

    let agent = cluster.agent("node-b");
    cluster.register("node-b", redis("node-b", &[]));
    let params = params();
    let outcome = Election::new(&agent, &params, config()).run().unwrap();

    // With the stale query node-a would have counted as master.
    assert_eq!(outcome, Outcome::Promoted);
    let queries = cluster.queries();
    assert_eq!(queries.len(), 1);
    assert_ne!(queries[0].id, stale);
    assert_eq!(queries[0].tags, vec!["master".to_string()]);
}

#[test]
fn extra_query_tag_still_elects_one_master() {
    let cluster = MemoryCluster::new();
    cluster.register("node-a", redis("node-a", &["zone-a"]));
    cluster.register("node-b", redis("node-b", &["zone-a"]));
    let params =
        ElectionParameters::new("redis-master", "redis", vec!["zone-a".to_string()]).expect("params");

    let first = Election::new(&cluster.agent("node-a"), &params, config()).run().unwrap();
    let second = Election::new(&cluster.agent("node-b"), &params, config()).run().unwrap();

    assert_eq!(first, Outcome::Promoted);
    assert_eq!(second, Outcome::Demoted);
    assert_eq!(role_of(&cluster, "node-a"), Some(Role::Master));
    assert_eq!(role_of(&cluster, "node-b"), Some(Role::Slave));
    let queries = cluster.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].tags, vec!["master".to_string(), "zone-a".to_string()]);
}
