//! Standby cluster settings
//!
//! A standby cluster follows another cluster, either by streaming from its
//! primary or by replaying WAL archived in a pgBackRest repository. When both
//! are configured, pgBackRest is tried first.

use super::tree::{ConfigTree, Mapping};
use super::{BASEBACKUP_CREATE_REPLICA_METHOD, PGBACKREST_CREATE_REPLICA_METHOD};
use crate::crd::StandbySpec;

/// The resolved `standby_cluster` section
#[derive(Clone, Debug, PartialEq)]
pub struct StandbyCluster {
    /// The section, including `create_replica_methods`
    pub section: Mapping,

    /// Replica creation methods in order of preference
    pub methods: Vec<String>,
}

/// Build the `standby_cluster` section of the dynamic configuration.
///
/// Fields of `previous` that the operator does not manage are kept.
/// `restore_command` is always recomputed.
pub fn resolve_standby(
    standby: &StandbySpec,
    restore_command: &str,
    previous: Option<&ConfigTree>,
) -> StandbyCluster {
    let mut section = previous
        .and_then(ConfigTree::as_mapping)
        .cloned()
        .unwrap_or_default();

    section.remove("restore_command");

    let mut methods: Vec<String> = Vec::new();

    if let Some(host) = standby.host() {
        section.insert("host".to_string(), ConfigTree::from(host));
        if let Some(port) = standby.port {
            section.insert("port".to_string(), ConfigTree::from(port));
        }
        methods.insert(0, BASEBACKUP_CREATE_REPLICA_METHOD.to_string());
    }

    if standby.repo_name().is_some() {
        // Populate the standby leader by shipping logs through pgBackRest.
        // This also overrides the "restore_command" used by standby replicas.
        // - https://www.postgresql.org/docs/current/warm-standby.html
        methods.insert(0, PGBACKREST_CREATE_REPLICA_METHOD.to_string());
        section.insert(
            "restore_command".to_string(),
            ConfigTree::from(restore_command),
        );
    }

    section.insert(
        "create_replica_methods".to_string(),
        ConfigTree::strings(methods.iter().cloned()),
    );

    StandbyCluster { section, methods }
}
