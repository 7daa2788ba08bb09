//! PostgreSQL filesystem layout
//!
//! Paths shared by the Patroni configuration and the instance Pods.

use crate::crd::{InstanceSetSpec, PostgresCluster};

/// Directory holding the PostgreSQL UNIX domain sockets
pub const SOCKET_DIRECTORY: &str = "/tmp/postgres";

/// Role used for streaming replication and `pg_rewind`
pub const REPLICATION_USER: &str = "_replication";

/// Mount point of the data volume
pub const DATA_MOUNT_PATH: &str = "/pgdata";

/// Mount point of the dedicated WAL volume
pub const WAL_MOUNT_PATH: &str = "/pgwal";

/// Directory PostgreSQL uses as `data_directory`
pub fn data_directory(cluster: &PostgresCluster) -> String {
    format!("{}/pg{}", DATA_MOUNT_PATH, cluster.spec.postgres_version)
}

/// Directory holding `postgresql.conf` and friends. Same as the data directory.
pub fn config_directory(cluster: &PostgresCluster) -> String {
    data_directory(cluster)
}

/// Directory for write-ahead log files. Lives on the WAL volume when the
/// instance set has one, otherwise next to the data directory.
pub fn wal_directory(cluster: &PostgresCluster, instance: &InstanceSetSpec) -> String {
    let mount = if instance.wal_volume.is_some() {
        WAL_MOUNT_PATH
    } else {
        DATA_MOUNT_PATH
    };
    format!("{}/pg{}_wal", mount, cluster.spec.postgres_version)
}
