//! Cluster and instance configuration documents
//!
//! Patroni merges two files per instance: one with settings for the whole
//! cluster and one with settings for its instance set. Until the cluster has
//! bootstrapped, the cluster file also carries the initial dynamic
//! configuration and the instance file carries the bootstrap method.

use kube::ResourceExt;
use tracing::debug;

use super::bootstrap::{BootstrapOptions, BootstrapState, ReplicaCreation, select_bootstrap};
use super::merge::{merge_access_rules, merge_parameters};
use super::standby::resolve_standby;
use super::tree::{ConfigTree, Mapping, Scalar, lookup};
use super::{
    CERT_AUTHORITY_CONFIG_PATH, CERT_SERVER_CONFIG_PATH, CONFIG_DIRECTORY, PG_REWIND_TDE_WRAPPER,
    REPLICATION_CERT_DIRECTORY, YAML_GENERATED_WARNING,
};
use crate::crd::{InstanceSetSpec, PostgresCluster, PostgresClusterSpec};
use crate::error::Result;
use crate::naming;
use crate::postgres::{self, HBAs, Parameters};

/// Database Patroni connects to for its own queries
const PATRONI_DATABASE: &str = "highgo";

fn config_path(relative: &str) -> String {
    format!("{}/{}", CONFIG_DIRECTORY, relative)
}

/// The command that fetches the TDE key, configured as the
/// `encryption_key_command` parameter of the dynamic configuration.
pub fn fetch_key_command(spec: &PostgresClusterSpec) -> Option<String> {
    let dynamic = spec.patroni.dynamic_configuration();
    let command = match lookup(
        &dynamic,
        &["postgresql", "parameters", "encryption_key_command"],
    )? {
        ConfigTree::Scalar(Scalar::Null) => return None,
        ConfigTree::Scalar(scalar) => scalar.to_string(),
        other => {
            debug!(value = ?other, "Ignoring encryption_key_command that is not a scalar");
            return None;
        }
    };
    (!command.is_empty()).then_some(command)
}

/// Combine the user's dynamic configuration with the operator's PostgreSQL
/// settings. Keys the operator does not manage pass through untouched.
pub fn dynamic_configuration(
    spec: &PostgresClusterSpec,
    hbas: &HBAs,
    parameters: &Parameters,
) -> Mapping {
    // Copy the entire configuration before making any changes.
    let mut root = spec.patroni.dynamic_configuration();

    root.insert(
        "ttl".to_string(),
        spec.patroni.leader_lease_duration_seconds.into(),
    );
    root.insert(
        "loop_wait".to_string(),
        spec.patroni.sync_period_seconds.into(),
    );

    let mut postgresql = Mapping::from([("use_slots".to_string(), ConfigTree::from(false))]);

    // With TDE, pg_rewind must go through a wrapper that can fetch the key.
    if fetch_key_command(spec).is_some() {
        postgresql.insert(
            "bin_name".to_string(),
            ConfigTree::mapping([("pg_rewind", ConfigTree::from(PG_REWIND_TDE_WRAPPER))]),
        );
    }

    // The user's "postgresql" section goes over the defaults above.
    match root.get("postgresql") {
        Some(ConfigTree::Mapping(section)) => {
            postgresql.extend(section.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(other) => debug!(value = ?other, "Ignoring postgresql section that is not a mapping"),
        None => {}
    }

    let merged = merge_parameters(
        &parameters.default,
        postgresql.get("parameters"),
        &parameters.mandatory,
    );
    postgresql.insert("parameters".to_string(), merged.into());
    postgresql.insert("database".to_string(), PATRONI_DATABASE.into());

    let hba = merge_access_rules(
        &hbas.mandatory_lines(),
        postgresql.get("pg_hba"),
        &hbas.default_lines(),
    );
    postgresql.insert("pg_hba".to_string(), hba.into());

    // pg_rewind lets a former primary rejoin even when it has commits that
    // were never sent to a replica, favoring availability over consistency.
    // Only PostgreSQL v11 and later can rewind without superuser access over
    // the network.
    postgresql.insert(
        "use_pg_rewind".to_string(),
        (spec.postgres_version > 10).into(),
    );

    if let Some(standby) = spec.standby.as_ref().filter(|s| s.enabled) {
        let resolved = resolve_standby(
            standby,
            parameters.mandatory.value("restore_command"),
            root.get("standby_cluster"),
        );
        debug!(methods = ?resolved.methods, "Resolved standby cluster");
        root.insert("standby_cluster".to_string(), resolved.section.into());
    }

    root.insert("postgresql".to_string(), postgresql.into());
    root
}

/// Patroni settings that apply to the entire cluster.
///
/// `log_storage_limit` is the space, in bytes, Patroni log files may use.
/// Zero keeps Patroni logging to stderr only.
pub fn cluster_config(
    cluster: &PostgresCluster,
    hbas: &HBAs,
    parameters: &Parameters,
    log_storage_limit: i64,
) -> Mapping {
    let replication_auth = || {
        ConfigTree::mapping([
            (
                "sslcert",
                ConfigTree::from(format!("{}/tls.crt", REPLICATION_CERT_DIRECTORY)),
            ),
            (
                "sslkey",
                ConfigTree::from(format!("{}/tls.key", REPLICATION_CERT_DIRECTORY)),
            ),
            ("sslmode", ConfigTree::from("verify-ca")),
            (
                "sslrootcert",
                ConfigTree::from(format!("{}/ca.crt", REPLICATION_CERT_DIRECTORY)),
            ),
            ("username", ConfigTree::from(postgres::REPLICATION_USER)),
        ])
    };

    let mut root = Mapping::from([
        // Cannot change during the cluster's lifetime.
        (
            "scope".to_string(),
            ConfigTree::from(naming::patroni_scope(cluster)),
        ),
        // Kubernetes Endpoints serve as the DCS. These values cannot change
        // during the cluster's lifetime either.
        (
            "kubernetes".to_string(),
            ConfigTree::mapping([
                (
                    "namespace",
                    ConfigTree::from(cluster.namespace().unwrap_or_default()),
                ),
                ("role_label", ConfigTree::from(naming::LABEL_ROLE)),
                ("scope_label", ConfigTree::from(naming::LABEL_PATRONI)),
                ("use_endpoints", ConfigTree::from(true)),
                (
                    "leader_label_value",
                    ConfigTree::from(naming::ROLE_PATRONI_LEADER),
                ),
                // Patroni adds these to every object it creates and filters
                // every lookup by them.
                (
                    "labels",
                    ConfigTree::mapping([(naming::LABEL_CLUSTER, ConfigTree::from(cluster.name_any()))]),
                ),
            ]),
        ),
        (
            "postgresql".to_string(),
            ConfigTree::mapping([(
                "authentication",
                ConfigTree::mapping([
                    ("replication", replication_auth()),
                    ("rewind", replication_auth()),
                ]),
            )]),
        ),
        // Every Patroni instance is a client of every other, so TLS applies
        // to the whole cluster.
        (
            "restapi".to_string(),
            ConfigTree::mapping([
                (
                    "cafile",
                    ConfigTree::from(config_path(CERT_AUTHORITY_CONFIG_PATH)),
                ),
                (
                    "certfile",
                    ConfigTree::from(config_path(CERT_SERVER_CONFIG_PATH)),
                ),
                // The private key is bundled into "certfile".
                ("keyfile", ConfigTree::null()),
                // Kubernetes HTTPS probes cannot present client certificates.
                // - https://issue.k8s.io/92647
                ("verify_client", ConfigTree::from("optional")),
            ]),
        ),
        (
            "ctl".to_string(),
            ConfigTree::mapping([
                (
                    "cacert",
                    ConfigTree::from(config_path(CERT_AUTHORITY_CONFIG_PATH)),
                ),
                (
                    "certfile",
                    ConfigTree::from(config_path(CERT_SERVER_CONFIG_PATH)),
                ),
                ("keyfile", ConfigTree::null()),
                ("insecure", ConfigTree::from(false)),
            ]),
        ),
        // The liveness probe stands in for the watchdog device.
        (
            "watchdog".to_string(),
            ConfigTree::mapping([("mode", ConfigTree::from("off"))]),
        ),
    ]);

    if log_storage_limit != 0 {
        // - https://patroni.readthedocs.io/en/latest/yaml_configuration.html#log
        root.insert(
            "log".to_string(),
            ConfigTree::mapping([
                ("dir", ConfigTree::from(naming::PATRONI_PGDATA_LOG_PATH)),
                ("type", ConfigTree::from("json")),
                ("level", ConfigTree::from(cluster.spec.patroni.log_level())),
                // One backup file means two files in total. Zero would stop
                // rotation altogether.
                // - https://github.com/python/cpython/blob/3.11/Lib/logging/handlers.py#L134
                ("file_num", ConfigTree::from(1)),
                // Two files share the configured limit.
                ("file_size", ConfigTree::from(log_storage_limit / 2)),
            ]),
        );
    }

    let bootstrapped = cluster.bootstrapped();
    if !bootstrapped {
        // Patroni ignores "bootstrap.dcs" once the cluster exists.
        root.insert(
            "bootstrap".to_string(),
            ConfigTree::mapping([(
                "dcs",
                ConfigTree::from(dynamic_configuration(&cluster.spec, hbas, parameters)),
            )]),
        );
    }

    debug!(
        cluster = %cluster.name_any(),
        bootstrapped,
        "Resolved cluster Patroni configuration"
    );
    root
}

/// Patroni settings that apply to one instance set.
///
/// `pgbackrest_command` restores a replica from the backup repository; when
/// empty, replicas are created with `pg_basebackup` only.
pub fn instance_config(
    cluster: &PostgresCluster,
    instance: &InstanceSetSpec,
    pgbackrest_command: &[String],
) -> Mapping {
    // "name", "kubernetes.pod_ip", "kubernetes.ports" and the connect and
    // listen addresses come from environment variables, since they are not
    // known until the Pod exists.
    let mut root = Mapping::from([
        ("kubernetes".to_string(), ConfigTree::Mapping(Mapping::new())),
        ("restapi".to_string(), ConfigTree::Mapping(Mapping::new())),
        ("tags".to_string(), ConfigTree::Mapping(Mapping::new())),
    ]);

    let mut postgresql = Mapping::from([
        // Patroni checks that this path is writable whether passwords are
        // used or not.
        // - https://github.com/zalando/patroni/issues/1888
        ("pgpass".to_string(), ConfigTree::from("/tmp/.pgpass")),
        // Local connections prefer the directories in
        // "unix_socket_directories".
        ("use_unix_socket".to_string(), ConfigTree::from(true)),
    ]);

    let wal_directory = postgres::wal_directory(cluster, instance);
    ReplicaCreation::new(&wal_directory, pgbackrest_command).apply(&mut postgresql);
    root.insert("postgresql".to_string(), postgresql.into());

    let state = BootstrapState::from_cluster(cluster);
    let dynamic = cluster.spec.patroni.dynamic_configuration();
    let data_directory = postgres::data_directory(cluster);
    let key_command = fetch_key_command(&cluster.spec);

    let method = select_bootstrap(&BootstrapOptions {
        state,
        dynamic_configuration: &dynamic,
        data_directory: &data_directory,
        wal_directory: &wal_directory,
        encryption_key_command: key_command.as_deref(),
    });
    if let Some(method) = method {
        root.insert("bootstrap".to_string(), method.to_tree());
    }

    debug!(
        cluster = %cluster.name_any(),
        instance = %instance.name,
        ?state,
        "Resolved instance Patroni configuration"
    );
    root
}

/// Serialize a configuration document behind the generated-file banner
pub fn to_yaml(root: &Mapping) -> Result<String> {
    let body = serde_yaml::to_string(root)?;
    Ok(format!("{}{}", YAML_GENERATED_WARNING, body))
}

/// The cluster configuration file
pub fn cluster_yaml(
    cluster: &PostgresCluster,
    hbas: &HBAs,
    parameters: &Parameters,
    log_storage_limit: i64,
) -> Result<String> {
    to_yaml(&cluster_config(cluster, hbas, parameters, log_storage_limit))
}

/// The instance configuration file
pub fn instance_yaml(
    cluster: &PostgresCluster,
    instance: &InstanceSetSpec,
    pgbackrest_command: &[String],
) -> Result<String> {
    to_yaml(&instance_config(cluster, instance, pgbackrest_command))
}
