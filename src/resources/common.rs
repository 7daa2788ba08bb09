//! Common utilities for Kubernetes resource generation
//!
//! Shared functions and constants used by the resource generators so that
//! every object carries the same ownership and labels.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::{InstanceSetSpec, PostgresCluster};
use crate::naming::{LABEL_CLUSTER, LABEL_INSTANCE_SET};

/// API version for PostgresCluster CRD
pub const API_VERSION: &str = "postgres.example.com/v1alpha1";

/// Kind for PostgresCluster CRD
pub const KIND: &str = "PostgresCluster";

/// Operator field manager name for server-side apply
pub const FIELD_MANAGER: &str = "postgres-operator";

/// Generate an owner reference for a PostgresCluster
///
/// Child resources are garbage collected when the cluster is deleted.
pub fn owner_reference(cluster: &PostgresCluster) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: cluster.name_any(),
        uid: cluster.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Standard labels for all resources belonging to a PostgresCluster
pub fn standard_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            cluster_name.to_string(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            "postgresql".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
        (LABEL_CLUSTER.to_string(), cluster_name.to_string()),
    ])
}

/// Standard labels plus the instance set
pub fn instance_labels(
    cluster: &PostgresCluster,
    instance: &InstanceSetSpec,
) -> BTreeMap<String, String> {
    let mut labels = standard_labels(&cluster.name_any());
    labels.insert(LABEL_INSTANCE_SET.to_string(), instance.name.clone());
    labels
}
