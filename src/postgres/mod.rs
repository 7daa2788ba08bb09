//! PostgreSQL settings the operator manages: filesystem layout, the
//! parameter catalog and the host-based authentication rules.

pub mod config;
pub mod hba;
pub mod parameters;

pub use config::{
    REPLICATION_USER, SOCKET_DIRECTORY, config_directory, data_directory, wal_directory,
};
pub use hba::{HBAs, HostBasedAuthentication, new_hbas};
pub use parameters::{
    ParameterSet, Parameters, SHARED_PRELOAD_LIBRARIES, add_archive_parameters, new_parameters,
};
