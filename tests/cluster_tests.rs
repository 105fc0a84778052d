// Cluster declarations, DRS rule checks, inventory snapshots and the caching provider.

mod common;

use common::CountingInventory;
use cpi_placement::cluster::{
    CachingClusterProvider, ClusterConfig, ClusterProvider, Inventory, StaticInventory,
};
use cpi_placement::errors::CloudError;
use cpi_placement::resources::{Cluster, Datastore};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

fn cluster_config(name: &str, props: Value) -> ClusterConfig {
    ClusterConfig::new(name, properties(props)).unwrap()
}

fn snapshot() -> Vec<Cluster> {
    vec![
        Cluster::new("cluster-1", 2048, [Datastore::new("ds-1", 1024)]),
        Cluster::new("cluster-2", 4096, [Datastore::new("ds-2", 2048)]),
    ]
}

#[test]
fn test_cluster_config_parses_drs_rules_and_resource_pool() {
    let config = cluster_config(
        "cluster-1",
        json!({
            "resource_pool": "pool-a",
            "drs_rules": [{ "name": "anti-affinity", "type": "separate_vms" }]
        }),
    );

    assert_eq!(config.name(), "cluster-1");
    assert_eq!(config.resource_pool(), Some("pool-a"));
    assert_eq!(config.drs_rules().len(), 1);
    assert_eq!(config.drs_rule().map(|r| r.name.as_str()), Some("anti-affinity"));
    assert!(config.validate_drs_rules().is_ok());
}

#[test]
fn test_cluster_config_without_rules_is_valid() {
    let config = cluster_config("cluster-1", json!({}));

    assert!(config.drs_rules().is_empty());
    assert!(config.drs_rule().is_none());
    assert_eq!(config.resource_pool(), None);
    assert!(config.validate_drs_rules().is_ok());
}

#[test]
fn test_unsupported_rule_type() {
    let config = cluster_config(
        "cluster-1",
        json!({ "drs_rules": [{ "name": "fake-rule", "type": "keep_together" }] }),
    );

    let err = config.validate_drs_rules().unwrap_err();

    assert!(matches!(err, CloudError::UnsupportedDrsRuleType { ref rule_type, .. } if rule_type == "keep_together"));
    assert!(err.to_string().contains("'separate_vms'"));
}

#[test]
fn test_rule_count_is_checked_before_rule_type() {
    let config = cluster_config(
        "cluster-1",
        json!({
            "drs_rules": [
                { "name": "fake-rule-1", "type": "bad_type" },
                { "name": "fake-rule-2", "type": "bad_type" }
            ]
        }),
    );

    let err = config.validate_drs_rules().unwrap_err();

    assert!(matches!(err, CloudError::TooManyDrsRules { count: 2, .. }));
    assert_eq!(
        err.to_string(),
        "vSphere CPI supports only one DRS rule per resource pool"
    );
}

#[test]
fn test_malformed_drs_rules_are_rejected() {
    let err = ClusterConfig::new("cluster-1", properties(json!({ "drs_rules": "separate_vms" })))
        .unwrap_err();

    assert!(matches!(err, CloudError::InvalidManifest(_)));
}

#[test]
fn test_static_inventory_from_json() {
    let inventory = StaticInventory::from_json(
        r#"{
            "clusters": [
                { "name": "cluster-1", "free_memory": 2048,
                  "datastores": [{ "name": "ds-a", "free_space": 100 }, { "name": "ds-b", "free_space": 300 }] }
            ]
        }"#,
    )
    .unwrap();

    let cluster = inventory
        .lookup_cluster("cluster-1", &cluster_config("cluster-1", json!({})))
        .unwrap();
    assert_eq!(cluster.free_memory(), 2048);
    assert_eq!(cluster.total_free_space(), 400);
    assert_eq!(cluster.datastore("ds-b"), Some(&Datastore::new("ds-b", 300)));
    assert_eq!(inventory.clusters().len(), 1);
}

#[test]
fn test_static_inventory_unknown_cluster() {
    let inventory = StaticInventory::new(snapshot());

    let err = inventory
        .lookup_cluster("nope", &cluster_config("nope", json!({})))
        .unwrap_err();

    assert!(matches!(err, CloudError::ClusterNotFound { ref name } if name == "nope"));
}

#[test]
fn test_provider_memoizes_by_name() {
    let provider = CachingClusterProvider::new(CountingInventory::new(snapshot()));

    let first = provider
        .find("cluster-1", &cluster_config("cluster-1", json!({})))
        .unwrap();
    let second = provider
        .find(
            "cluster-1",
            &cluster_config("cluster-1", json!({ "resource_pool": "other" })),
        )
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.inventory().lookup_count(), 1);

    provider
        .find("cluster-2", &cluster_config("cluster-2", json!({})))
        .unwrap();
    assert_eq!(provider.inventory().lookup_count(), 2);
}

#[test]
fn test_provider_does_not_cache_failures() {
    let provider =
        CachingClusterProvider::new(CountingInventory::new(snapshot()).failing_first(1));
    let config = cluster_config("cluster-1", json!({}));

    assert!(provider.find("cluster-1", &config).is_err());
    assert_eq!(provider.find("cluster-1", &config).unwrap().name(), "cluster-1");
    assert!(provider.find("cluster-1", &config).is_ok());
    assert_eq!(provider.inventory().lookup_count(), 2);
}

#[test]
fn test_provider_unknown_cluster() {
    let provider = CachingClusterProvider::new(StaticInventory::new(snapshot()));

    let err = provider
        .find("missing", &cluster_config("missing", json!({})))
        .unwrap_err();

    assert!(matches!(err, CloudError::ClusterNotFound { .. }));
}

#[test]
fn test_provider_drops_entries_of_failed_lookups() {
    let provider = CachingClusterProvider::new(StaticInventory::new(snapshot()));

    for name in ["missing-1", "missing-2", "missing-1"] {
        assert!(provider.find(name, &cluster_config(name, json!({}))).is_err());
    }
    assert_eq!(provider.slot_count(), 0);

    provider
        .find("cluster-1", &cluster_config("cluster-1", json!({})))
        .unwrap();
    assert_eq!(provider.slot_count(), 1);
}

#[tokio::test]
async fn test_concurrent_first_lookups_resolve_once() {
    let provider = Arc::new(CachingClusterProvider::new(
        CountingInventory::new(snapshot()).with_delay(Duration::from_millis(50)),
    ));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let provider = provider.clone();
            tokio::task::spawn_blocking(move || {
                provider.find("cluster-2", &cluster_config("cluster-2", json!({})))
            })
        })
        .collect();
    let results = join_all(handles).await;

    let clusters: Vec<_> = results
        .into_iter()
        .map(|r| r.expect("task panicked").expect("lookup failed"))
        .collect();
    assert!(clusters.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(provider.inventory().lookup_count(), 1);
}

#[test]
fn test_cluster_equality_is_by_name() {
    let before = Cluster::new("cluster-1", 2048, [Datastore::new("ds-1", 1024)]);
    let after = Cluster::new("cluster-1", 512, [Datastore::new("ds-9", 64)]);

    assert_eq!(before, after);
    assert_ne!(before, Cluster::new("cluster-2", 2048, [Datastore::new("ds-1", 1024)]));
    assert_eq!(HashSet::from([before, after]).len(), 1);
}

#[test]
fn test_total_free_space_saturates() {
    let cluster = Cluster::new(
        "cluster-1",
        2048,
        [Datastore::new("ds-1", u64::MAX), Datastore::new("ds-2", 1024)],
    );

    assert_eq!(cluster.total_free_space(), u64::MAX);
}
