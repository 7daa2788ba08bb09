use kube::CustomResource;
use schemars::JsonSchema;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::patroni::tree::{ConfigTree, Mapping};

/// PostgresCluster is the Schema for the postgresclusters API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "postgres.example.com",
    version = "v1alpha1",
    kind = "PostgresCluster",
    plural = "postgresclusters",
    shortname = "pgc",
    namespaced,
    status = "PostgresClusterStatus",
    printcolumn = r#"{"name":"Version", "type":"integer", "jsonPath":".spec.postgresVersion"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgresClusterSpec {
    /// PostgreSQL major version (e.g., 15, 16)
    pub postgres_version: i32,

    /// Port on which PostgreSQL listens
    #[serde(default = "default_port")]
    pub port: i32,

    /// Patroni settings shared by every instance
    #[serde(default)]
    pub patroni: PatroniSpec,

    /// Run this cluster as a standby of another cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standby: Option<StandbySpec>,

    /// Initialize the cluster from existing data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,

    /// Groups of PostgreSQL instances
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceSetSpec>,
}

fn default_port() -> i32 {
    5432
}

/// Patroni configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatroniSpec {
    /// Patroni dynamic configuration, merged over the operator defaults.
    /// Stored in the DCS once the cluster has bootstrapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub dynamic_configuration: Option<BTreeMap<String, serde_json::Value>>,

    /// TTL of the cluster leader lock, in seconds
    #[serde(default = "default_leader_lease_duration_seconds")]
    pub leader_lease_duration_seconds: i32,

    /// Port on which the Patroni REST API listens
    #[serde(default = "default_patroni_port")]
    pub port: i32,

    /// Interval between Patroni HA loop iterations, in seconds
    #[serde(default = "default_sync_period_seconds")]
    pub sync_period_seconds: i32,

    /// Patroni log file settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<PatroniLogConfig>,
}

/// Free-form object schema the API server must not prune
fn preserve_unknown_fields(_: &mut schemars::r#gen::SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        extensions: [(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            serde_json::Value::Bool(true),
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    })
}

fn default_leader_lease_duration_seconds() -> i32 {
    30
}

fn default_patroni_port() -> i32 {
    8008
}

fn default_sync_period_seconds() -> i32 {
    10
}

impl Default for PatroniSpec {
    fn default() -> Self {
        Self {
            dynamic_configuration: None,
            leader_lease_duration_seconds: default_leader_lease_duration_seconds(),
            port: default_patroni_port(),
            sync_period_seconds: default_sync_period_seconds(),
            logging: None,
        }
    }
}

impl PatroniSpec {
    /// The user dynamic configuration as a tree. Absent means empty.
    pub fn dynamic_configuration(&self) -> Mapping {
        self.dynamic_configuration
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), ConfigTree::from(v.clone())))
            .collect()
    }

    /// Log level, defaulting to INFO
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .map(|l| l.level.as_str())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Patroni log file settings
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatroniLogConfig {
    /// Python logging level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Total space the log files may use (e.g., "10Mi").
    /// Logs go to stderr only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl PatroniLogConfig {
    /// The storage limit in bytes, or 0 when unset
    pub fn storage_limit_bytes(&self) -> Result<i64> {
        match &self.storage_limit {
            Some(quantity) => parse_quantity(quantity),
            None => Ok(0),
        }
    }
}

/// Parse a Kubernetes resource quantity into bytes, rounding up.
pub fn parse_quantity(quantity: &str) -> Result<i64> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);

    let multiplier: f64 = match suffix {
        "" => 1.0,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        _ => {
            return Err(Error::InvalidConfig(format!(
                "unknown quantity suffix in {:?}",
                quantity
            )));
        }
    };

    let value: f64 = number
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid quantity: {:?}", quantity)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "quantity must be a non-negative number: {:?}",
            quantity
        )));
    }

    Ok((value * multiplier).ceil() as i64)
}

/// Standby cluster configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandbySpec {
    /// Whether the cluster follows another cluster
    #[serde(default = "default_standby_enabled")]
    pub enabled: bool,

    /// Network address of the PostgreSQL server to follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Network port of the PostgreSQL server to follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Name of the pgBackRest repository to replay WAL from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
}

fn default_standby_enabled() -> bool {
    true
}

impl StandbySpec {
    /// Host, when set to a non-empty value
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// Repository name, when set to a non-empty value
    pub fn repo_name(&self) -> Option<&str> {
        self.repo_name.as_deref().filter(|r| !r.is_empty())
    }
}

/// Sources of existing data for a new cluster
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    /// Existing volumes to adopt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<DataSourceVolumes>,
}

/// Existing volumes to adopt
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceVolumes {
    /// Volume holding an existing PGDATA directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_data_volume: Option<DataSourceVolume>,
}

/// A PersistentVolumeClaim and the directory inside it to import
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceVolume {
    /// Name of the existing PersistentVolumeClaim
    pub pvc_name: String,

    /// Directory within the volume holding the data
    #[serde(default)]
    pub directory: String,
}

/// A group of PostgreSQL instances sharing one configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSetSpec {
    /// Name of the instance set, unique within the cluster
    #[serde(default = "default_instance_name")]
    pub name: String,

    /// Number of instances in the set
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Storage for PostgreSQL data
    pub data_volume: StorageSpec,

    /// Dedicated storage for WAL. WAL shares the data volume when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_volume: Option<StorageSpec>,
}

fn default_instance_name() -> String {
    "00".to_string()
}

fn default_replicas() -> i32 {
    1
}

/// Storage configuration for PostgreSQL volumes
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Storage class name (uses default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Size of the persistent volume (e.g., "10Gi", "100Gi")
    pub size: String,
}

/// Status of the PostgresCluster
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostgresClusterStatus {
    /// Patroni state reported by the instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patroni: Option<PatroniStatus>,

    /// pgBackRest state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgbackrest: Option<PgBackRestStatus>,

    /// Observed generation of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Patroni state
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatroniStatus {
    /// PostgreSQL system identifier, set once the cluster has bootstrapped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_identifier: Option<String>,
}

/// pgBackRest state
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PgBackRestStatus {
    /// In-place restore in progress or completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreStatus>,
}

/// Status of a restore job
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    /// Identifier of the requested restore
    pub id: String,

    /// Whether the restore job has finished
    #[serde(default)]
    pub finished: bool,
}

impl PostgresCluster {
    /// Look up an instance set by name
    pub fn instance_set(&self, name: &str) -> Result<&InstanceSetSpec> {
        self.spec
            .instances
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::NotFound(format!("instance set {:?}", name)))
    }

    /// Whether Patroni has initialized the cluster. Patroni records the
    /// PostgreSQL system identifier once bootstrap completes.
    pub fn bootstrapped(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.patroni.as_ref())
            .and_then(|p| p.system_identifier.as_deref())
            .is_some_and(|id| !id.is_empty())
    }

    /// Whether a pgBackRest restore record exists
    pub fn restoring(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.pgbackrest.as_ref())
            .is_some_and(|p| p.restore.is_some())
    }

    /// Whether the cluster asks to import an existing PGDATA directory
    pub fn importing_data(&self) -> bool {
        self.spec
            .data_source
            .as_ref()
            .and_then(|d| d.volumes.as_ref())
            .and_then(|v| v.pg_data_volume.as_ref())
            .is_some_and(|v| !v.directory.is_empty())
    }
}
