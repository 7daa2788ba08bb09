//! Names, labels and paths shared by the generated configuration and the
//! Kubernetes objects that carry it.

use kube::ResourceExt;

use crate::crd::{InstanceSetSpec, PostgresCluster};

/// Label identifying the cluster an object belongs to
pub const LABEL_CLUSTER: &str = "postgres.example.com/cluster";

/// Label Patroni sets to the cluster scope on every object it manages
pub const LABEL_PATRONI: &str = "postgres.example.com/patroni";

/// Label Patroni sets to the role of each instance Pod
pub const LABEL_ROLE: &str = "postgres.example.com/role";

/// Label identifying the instance set of an object
pub const LABEL_INSTANCE_SET: &str = "postgres.example.com/instance-set";

/// Value of [`LABEL_ROLE`] on the leader. "master" keeps Patroni v4
/// compatible with Pods labeled by earlier versions.
pub const ROLE_PATRONI_LEADER: &str = "master";

/// Directory for Patroni log files, on the data volume
pub const PATRONI_PGDATA_LOG_PATH: &str = "/pgdata/patroni/log";

/// Patroni scope of the cluster. Cannot change during the cluster's lifetime.
pub fn patroni_scope(cluster: &PostgresCluster) -> String {
    format!("{}-ha", cluster.name_any())
}

/// ConfigMap holding the cluster-wide Patroni configuration
pub fn cluster_config_map(cluster: &PostgresCluster) -> String {
    format!("{}-config", cluster.name_any())
}

/// ConfigMap holding the Patroni configuration of one instance set
pub fn instance_config_map(cluster: &PostgresCluster, instance: &InstanceSetSpec) -> String {
    format!("{}-{}-config", cluster.name_any(), instance.name)
}
