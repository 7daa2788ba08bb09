//! Patroni configuration
//!
//! Patroni reads its settings from YAML files and from the dynamic
//! configuration it keeps in the DCS. This module resolves both from the
//! cluster spec, the parameter catalog and the host-based authentication
//! rules. Nothing here performs I/O; every function is a pure computation
//! over its inputs.
//!
//! Reference: https://patroni.readthedocs.io/en/latest/yaml_configuration.html

pub mod bootstrap;
pub mod config;
pub mod merge;
pub mod probe;
pub mod standby;
pub mod tree;

pub use bootstrap::{
    BootstrapMethod, BootstrapOptions, BootstrapState, ReplicaCreation, quote_shell_word,
    select_bootstrap,
};
pub use config::{
    cluster_config, cluster_yaml, dynamic_configuration, fetch_key_command, instance_config,
    instance_yaml, to_yaml,
};
pub use merge::{CombineRule, LayeredMerge, merge_access_rules, merge_parameters};
pub use probe::ProbeTiming;
pub use standby::{StandbyCluster, resolve_standby};
pub use tree::{ConfigTree, Mapping, Scalar};

/// Directory where Patroni configuration files are mounted
pub const CONFIG_DIRECTORY: &str = "/etc/patroni";

/// ConfigMap key holding a Patroni configuration file
pub const CONFIG_MAP_FILE_KEY: &str = "patroni.yaml";

pub const BASEBACKUP_CREATE_REPLICA_METHOD: &str = "basebackup";
pub const PGBACKREST_CREATE_REPLICA_METHOD: &str = "pgbackrest";

/// Banner at the top of every generated file
pub const YAML_GENERATED_WARNING: &str = "\
# Generated by postgres-operator. DO NOT EDIT.
# Your changes will not be saved.
";

/// Certificate authorities trusted by the REST API, relative to [`CONFIG_DIRECTORY`]
pub const CERT_AUTHORITY_CONFIG_PATH: &str = "~postgres-operator/patroni.ca-roots";

/// Server certificate and private key, relative to [`CONFIG_DIRECTORY`]
pub const CERT_SERVER_CONFIG_PATH: &str = "~postgres-operator/patroni.crt-combined";

/// Client certificate directory used for replication and rewind connections
pub const REPLICATION_CERT_DIRECTORY: &str = "/tmp/replication";

/// `pg_rewind` wrapper that fetches the TDE key before rewinding
pub const PG_REWIND_TDE_WRAPPER: &str = "/tmp/pg_rewind_tde.sh";
