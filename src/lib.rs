//! Patroni configuration for PostgresCluster resources
//!
//! Resolves the Patroni configuration of a cluster from three layers: the
//! user's dynamic configuration, operator defaults, and operator mandatory
//! settings. Order-sensitive values (`shared_preload_libraries`, `pg_hba`,
//! replica creation methods) are merged so the mandatory entries always come
//! first.
//!
//! Every resolution is a pure function of its inputs. Serialization to YAML is
//! the only fallible step.

pub mod crd;
pub mod error;
pub mod naming;
pub mod patroni;
pub mod postgres;
pub mod resources;

pub use crd::PostgresCluster;
pub use error::{Error, Result};
pub use patroni::{
    ConfigTree, Mapping, ProbeTiming, cluster_config, cluster_yaml, dynamic_configuration,
    instance_config, instance_yaml,
};
pub use postgres::{HBAs, Parameters, new_hbas, new_parameters};

/// Parameter and rule catalogs for a cluster: the operator's standard entries
/// plus WAL archiving when the cluster follows a pgBackRest repository.
pub fn catalogs(cluster: &PostgresCluster) -> (HBAs, Parameters) {
    let hbas = new_hbas();
    let mut parameters = new_parameters();

    let standby_repo = cluster
        .spec
        .standby
        .as_ref()
        .filter(|s| s.enabled)
        .and_then(|s| s.repo_name());
    if standby_repo.is_some() {
        postgres::add_archive_parameters(&mut parameters, standby_repo);
    }

    (hbas, parameters)
}
