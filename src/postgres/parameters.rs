//! PostgreSQL parameter catalog
//!
//! The operator sorts server parameters into two sets: values it requires
//! (mandatory) and values it recommends (default). Users may override the
//! defaults through the Patroni dynamic configuration; mandatory values win.

use std::collections::BTreeMap;

use super::config::SOCKET_DIRECTORY;

/// Parameter holding the comma-separated list of libraries loaded at startup
pub const SHARED_PRELOAD_LIBRARIES: &str = "shared_preload_libraries";

/// A set of PostgreSQL parameters, keyed by name
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// The value of a parameter, or an empty string when it is not set
    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Mandatory and default PostgreSQL parameters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    pub mandatory: ParameterSet,
    pub default: ParameterSet,
}

/// The parameters every cluster starts with
pub fn new_parameters() -> Parameters {
    let mut parameters = Parameters::default();

    // Local connections go through UNIX domain sockets in a directory the
    // operator controls.
    parameters
        .mandatory
        .add("unix_socket_directories", SOCKET_DIRECTORY);

    // Logical replication in addition to streaming and WAL archiving.
    parameters.mandatory.add("wal_level", "logical");

    // JIT compilation hurts short OLTP queries more than it helps.
    parameters.default.add("jit", "off");

    parameters.default.add("password_encryption", "scram-sha-256");

    parameters
}

/// Add WAL archiving through pgBackRest.
///
/// `standby_repo` selects the repository a standby cluster replays WAL from.
pub fn add_archive_parameters(parameters: &mut Parameters, standby_repo: Option<&str>) {
    const STANZA: &str = "db";

    parameters.mandatory.add("archive_mode", "on");
    parameters.mandatory.add(
        "archive_command",
        format!("pgbackrest --stanza={} archive-push \"%p\"", STANZA),
    );

    let mut restore = format!("pgbackrest --stanza={} archive-get %f \"%p\"", STANZA);
    if let Some(repo) = standby_repo.and_then(repo_index) {
        restore.push_str(&format!(" --repo={}", repo));
    }
    parameters.mandatory.add("restore_command", restore);
}

/// Repository names look like "repo1"; pgBackRest wants the number.
fn repo_index(name: &str) -> Option<&str> {
    name.strip_prefix("repo")
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
