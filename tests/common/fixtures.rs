//! Test fixtures and builders for PostgresCluster resources
//!
//! # Quick Start
//!
//! For simple tests, use the convenience function:
//! ```rust,ignore
//! let cluster = create_test_cluster("hippo", "default");
//! ```
//!
//! For more complex configurations, use the builder pattern:
//! ```rust,ignore
//! let cluster = PostgresClusterBuilder::new("hippo", "default")
//!     .with_standby_repo("repo1")
//!     .with_dynamic_configuration(json!({"postgresql": {"parameters": {"work_mem": "4MB"}}}))
//!     .bootstrapped()
//!     .build();
//! ```

use kube::core::ObjectMeta;
use patroni_config::crd::{
    DataSource, DataSourceVolume, DataSourceVolumes, InstanceSetSpec, PatroniLogConfig,
    PatroniSpec, PatroniStatus, PgBackRestStatus, PostgresCluster, PostgresClusterSpec,
    PostgresClusterStatus, RestoreStatus, StandbySpec, StorageSpec,
};
use std::collections::BTreeMap;

// =============================================================================
// Convenience Functions for Simple Test Cases
// =============================================================================

/// Create a cluster with one instance set named "00" and no status
pub fn create_test_cluster(name: &str, namespace: &str) -> PostgresCluster {
    PostgresClusterBuilder::new(name, namespace)
        .with_uid("test-uid-12345")
        .build()
}

/// An instance set with only a data volume
pub fn instance_set(name: &str) -> InstanceSetSpec {
    InstanceSetSpec {
        name: name.to_string(),
        replicas: 1,
        data_volume: StorageSpec {
            storage_class: Some("standard".to_string()),
            size: "10Gi".to_string(),
        },
        wal_volume: None,
    }
}

/// An instance set with dedicated WAL storage
pub fn instance_set_with_wal_volume(name: &str) -> InstanceSetSpec {
    InstanceSetSpec {
        wal_volume: Some(StorageSpec {
            storage_class: None,
            size: "1Gi".to_string(),
        }),
        ..instance_set(name)
    }
}

/// The pgBackRest replica creation command an operator would pass
pub fn pgbackrest_command() -> Vec<String> {
    ["pgbackrest", "restore", "--delta", "--stanza=db", "--repo=1"]
        .into_iter()
        .map(String::from)
        .collect()
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for PostgresCluster test resources
pub struct PostgresClusterBuilder {
    name: String,
    namespace: String,
    uid: Option<String>,
    spec: PostgresClusterSpec,
    status: Option<PostgresClusterStatus>,
}

impl PostgresClusterBuilder {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: None,
            spec: PostgresClusterSpec {
                postgres_version: 16,
                port: 5432,
                patroni: PatroniSpec::default(),
                standby: None,
                data_source: None,
                instances: vec![instance_set("00")],
            },
            status: None,
        }
    }

    pub fn with_uid(mut self, uid: &str) -> Self {
        self.uid = Some(uid.to_string());
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.spec.postgres_version = version;
        self
    }

    pub fn with_port(mut self, port: i32) -> Self {
        self.spec.port = port;
        self
    }

    pub fn with_patroni_port(mut self, port: i32) -> Self {
        self.spec.patroni.port = port;
        self
    }

    pub fn with_timing(mut self, sync_period_seconds: i32, leader_lease_duration_seconds: i32) -> Self {
        self.spec.patroni.sync_period_seconds = sync_period_seconds;
        self.spec.patroni.leader_lease_duration_seconds = leader_lease_duration_seconds;
        self
    }

    /// Set the dynamic configuration from a JSON object
    pub fn with_dynamic_configuration(mut self, value: serde_json::Value) -> Self {
        let map: BTreeMap<String, serde_json::Value> = match value {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            other => panic!("dynamic configuration must be an object, got {other}"),
        };
        self.spec.patroni.dynamic_configuration = Some(map);
        self
    }

    pub fn with_logging(mut self, level: &str, storage_limit: Option<&str>) -> Self {
        self.spec.patroni.logging = Some(PatroniLogConfig {
            level: level.to_string(),
            storage_limit: storage_limit.map(String::from),
        });
        self
    }

    pub fn with_standby(mut self, host: Option<&str>, port: Option<i32>, repo: Option<&str>) -> Self {
        self.spec.standby = Some(StandbySpec {
            enabled: true,
            host: host.map(String::from),
            port,
            repo_name: repo.map(String::from),
        });
        self
    }

    pub fn with_standby_repo(self, repo: &str) -> Self {
        self.with_standby(None, None, Some(repo))
    }

    pub fn with_disabled_standby(mut self) -> Self {
        self.spec.standby = Some(StandbySpec {
            enabled: false,
            host: Some("primary.example.com".to_string()),
            port: Some(5432),
            repo_name: Some("repo1".to_string()),
        });
        self
    }

    /// Adopt an existing PGDATA directory from a PVC
    pub fn with_data_source(mut self, pvc_name: &str, directory: &str) -> Self {
        self.spec.data_source = Some(DataSource {
            volumes: Some(DataSourceVolumes {
                pg_data_volume: Some(DataSourceVolume {
                    pvc_name: pvc_name.to_string(),
                    directory: directory.to_string(),
                }),
            }),
        });
        self
    }

    pub fn with_instances(mut self, instances: Vec<InstanceSetSpec>) -> Self {
        self.spec.instances = instances;
        self
    }

    /// Record a system identifier, as Patroni does after bootstrap
    pub fn bootstrapped(mut self) -> Self {
        let status = self.status.get_or_insert_with(Default::default);
        status.patroni = Some(PatroniStatus {
            system_identifier: Some("7000000000000000001".to_string()),
        });
        self
    }

    /// Record a pgBackRest restore in progress
    pub fn restoring(mut self) -> Self {
        let status = self.status.get_or_insert_with(Default::default);
        status.pgbackrest = Some(PgBackRestStatus {
            restore: Some(RestoreStatus {
                id: "restore-1".to_string(),
                finished: false,
            }),
        });
        self
    }

    pub fn build(self) -> PostgresCluster {
        PostgresCluster {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                uid: self.uid,
                generation: Some(1),
                ..Default::default()
            },
            spec: self.spec,
            status: self.status,
        }
    }
}
