//! Cluster bootstrap and replica creation
//!
//! Patroni creates the first instance of a cluster with a bootstrap method and
//! every other instance with one of its replica creation methods.
//! - https://github.com/zalando/patroni/blob/v2.0.2/docs/replica_bootstrap.rst

use tracing::debug;

use super::tree::{ConfigTree, Mapping, Scalar, lookup};
use super::{BASEBACKUP_CREATE_REPLICA_METHOD, PGBACKREST_CREATE_REPLICA_METHOD};
use crate::crd::PostgresCluster;

/// Password hashing used when the dynamic configuration does not choose one
pub const DEFAULT_PASSWORD_ENCRYPTION: &str = "scram-sha-256";

/// What is known about the cluster's data before bootstrap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootstrapState {
    /// Patroni has already initialized the cluster
    pub bootstrapped: bool,
    /// A pgBackRest restore prepared the data directory
    pub is_restore: bool,
    /// The user asked to adopt an existing data directory
    pub is_data_source: bool,
}

impl BootstrapState {
    pub fn from_cluster(cluster: &PostgresCluster) -> Self {
        Self {
            bootstrapped: cluster.bootstrapped(),
            is_restore: cluster.restoring(),
            is_data_source: cluster.importing_data(),
        }
    }
}

/// Inputs to [`select_bootstrap`]
#[derive(Clone, Copy, Debug)]
pub struct BootstrapOptions<'a> {
    pub state: BootstrapState,
    /// The user's dynamic configuration
    pub dynamic_configuration: &'a Mapping,
    pub data_directory: &'a str,
    pub wal_directory: &'a str,
    /// Command that fetches the TDE key, when encryption is configured
    pub encryption_key_command: Option<&'a str>,
}

/// How Patroni creates the first instance of the cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootstrapMethod {
    /// Move data prepared by a restore or data source into place
    Existing { command: String },
    /// Run `initdb` with these long options (without leading dashes)
    Initdb { options: Vec<String> },
}

impl BootstrapMethod {
    /// The `bootstrap` section of the instance configuration
    pub fn to_tree(&self) -> ConfigTree {
        match self {
            BootstrapMethod::Existing { command } => ConfigTree::mapping([
                ("method", ConfigTree::from("existing")),
                (
                    "existing",
                    ConfigTree::mapping([
                        ("command", ConfigTree::from(command.as_str())),
                        ("no_params", ConfigTree::from("true")),
                    ]),
                ),
            ]),
            // The "initdb" bootstrap method is configured differently from others.
            // Patroni prepends "--" before it calls `initdb`.
            // - https://github.com/zalando/patroni/blob/v2.0.2/patroni/postgresql/bootstrap.py#L45
            BootstrapMethod::Initdb { options } => ConfigTree::mapping([
                ("method", ConfigTree::from("initdb")),
                ("initdb", ConfigTree::strings(options.iter().cloned())),
            ]),
        }
    }
}

/// Choose how to create the cluster. Returns `None` once the cluster has
/// bootstrapped; Patroni ignores the section from then on.
pub fn select_bootstrap(options: &BootstrapOptions<'_>) -> Option<BootstrapMethod> {
    let state = options.state;
    if state.bootstrapped {
        return None;
    }

    if state.is_restore || state.is_data_source {
        let staged = format!("{}_bootstrap", options.data_directory);
        return Some(BootstrapMethod::Existing {
            command: format!("mv {:?} {:?}", staged, options.data_directory),
        });
    }

    let mut initdb = vec![
        // Checksums detect silent storage corruption and turn on
        // "wal_log_hints", which `pg_rewind` requires. Enabling them later
        // means rewriting every file of the cluster.
        // - https://www.postgresql.org/docs/current/app-initdb.html
        // - https://www.postgresql.org/docs/current/app-pgrewind.html
        "data-checksums".to_string(),
        "encoding=UTF8".to_string(),
        format!(
            "auth={}",
            password_encryption(options.dynamic_configuration)
        ),
        // NOTE: The "--waldir" option was introduced in PostgreSQL v10.
        format!("waldir={}", options.wal_directory),
    ];

    if let Some(command) = options.encryption_key_command {
        initdb.push(format!("encryption-key-command={}", command));
    }

    Some(BootstrapMethod::Initdb { options: initdb })
}

/// `postgresql.password_encryption` from the dynamic configuration, when it
/// is a string.
fn password_encryption(dynamic: &Mapping) -> &str {
    match lookup(dynamic, &["postgresql", "password_encryption"]) {
        Some(ConfigTree::Scalar(Scalar::String(value))) => value.as_str(),
        Some(other) => {
            debug!(value = ?other, "Ignoring password_encryption that is not a string");
            DEFAULT_PASSWORD_ENCRYPTION
        }
        None => DEFAULT_PASSWORD_ENCRYPTION,
    }
}

/// Quote `s` so a shell reads it as a single literal word.
/// - https://www.gnu.org/software/bash/manual/html_node/Quoting.html
pub fn quote_shell_word(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Replica creation settings of an instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaCreation {
    /// Options for `pg_basebackup`, without leading dashes
    pub basebackup: Vec<String>,
    /// Shell command restoring from pgBackRest, when available
    pub pgbackrest: Option<String>,
}

impl ReplicaCreation {
    /// Prefer pgBackRest when a restore command is available, falling back
    /// to `pg_basebackup` when it fails.
    pub fn new(wal_directory: &str, pgbackrest_command: &[String]) -> Self {
        let pgbackrest = (!pgbackrest_command.is_empty()).then(|| {
            // Patroni deletes the data directory when every method fails,
            // regardless of "keep_data", and pgBackRest will not restore into
            // a missing directory. PostgreSQL requires that only its owner can
            // access the directory.
            // - https://github.com/zalando/patroni/blob/v2.0.2/patroni/ha.py#L249
            // - https://github.com/pgbackrest/pgbackrest/issues/1445
            let wrapper = [
                "bash",
                "-ceu",
                "--",
                r#"install --directory --mode=0700 "${PGDATA?}" && exec "$@""#,
                "-",
            ];

            wrapper
                .iter()
                .copied()
                .chain(pgbackrest_command.iter().map(String::as_str))
                .map(quote_shell_word)
                .collect::<Vec<_>>()
                .join(" ")
        });

        Self {
            basebackup: vec![format!("waldir={}", wal_directory)],
            pgbackrest,
        }
    }

    /// Method names in order of preference
    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods = vec![BASEBACKUP_CREATE_REPLICA_METHOD];
        if self.pgbackrest.is_some() {
            methods.insert(0, PGBACKREST_CREATE_REPLICA_METHOD);
        }
        methods
    }

    /// Write the methods into the instance's `postgresql` section
    pub fn apply(&self, postgresql: &mut Mapping) {
        // Patroni prepends "--" to each basebackup option.
        // - https://github.com/zalando/patroni/blob/v2.0.2/patroni/postgresql/bootstrap.py#L45
        postgresql.insert(
            BASEBACKUP_CREATE_REPLICA_METHOD.to_string(),
            ConfigTree::strings(self.basebackup.iter().cloned()),
        );

        if let Some(command) = &self.pgbackrest {
            postgresql.insert(
                PGBACKREST_CREATE_REPLICA_METHOD.to_string(),
                ConfigTree::mapping([
                    ("command", ConfigTree::from(command.as_str())),
                    ("keep_data", ConfigTree::from(true)),
                    ("no_leader", ConfigTree::from(true)),
                    ("no_params", ConfigTree::from(true)),
                ]),
            );
        }

        postgresql.insert(
            "create_replica_methods".to_string(),
            ConfigTree::strings(self.methods()),
        );
    }
}
