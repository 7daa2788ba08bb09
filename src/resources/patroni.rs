//! Kubernetes resources carrying the Patroni configuration
//!
//! This module wraps the resolved Patroni documents in ConfigMaps and builds
//! the pieces of the instance Pod that Patroni depends on:
//! - environment variables for values only known once the Pod exists
//! - volume projections of the two configuration files
//! - REST API probes timed against the leader lease
//!
//! Reference: https://github.com/patroni/patroni

use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapProjection, Container, EndpointPort, EnvVar, EnvVarSource, HTTPGetAction,
    KeyToPath, ObjectFieldSelector, Probe, Service, VolumeProjection,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use kube::core::ObjectMeta;
use std::collections::BTreeMap;
use tracing::warn;

use super::common::{instance_labels, owner_reference, standard_labels};
use crate::crd::{InstanceSetSpec, PostgresCluster};
use crate::error::Result;
use crate::naming;
use crate::patroni::{self, CONFIG_DIRECTORY, CONFIG_MAP_FILE_KEY, ProbeTiming};
use crate::postgres::{self, HBAs, Parameters};

/// Generate the ConfigMap holding the cluster-wide Patroni configuration
pub fn cluster_config_map(
    cluster: &PostgresCluster,
    hbas: &HBAs,
    parameters: &Parameters,
) -> Result<ConfigMap> {
    let log_storage_limit = match &cluster.spec.patroni.logging {
        Some(logging) => logging.storage_limit_bytes()?,
        None => 0,
    };
    let yaml = patroni::cluster_yaml(cluster, hbas, parameters, log_storage_limit)?;

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(naming::cluster_config_map(cluster)),
            namespace: cluster.namespace(),
            labels: Some(standard_labels(&cluster.name_any())),
            owner_references: Some(vec![owner_reference(cluster)]),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(CONFIG_MAP_FILE_KEY.to_string(), yaml)])),
        ..Default::default()
    })
}

/// Generate the ConfigMap holding the Patroni configuration of an instance set
pub fn instance_config_map(
    cluster: &PostgresCluster,
    instance: &InstanceSetSpec,
    pgbackrest_command: &[String],
) -> Result<ConfigMap> {
    let yaml = patroni::instance_yaml(cluster, instance, pgbackrest_command)?;

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(naming::instance_config_map(cluster, instance)),
            namespace: cluster.namespace(),
            labels: Some(instance_labels(cluster, instance)),
            owner_references: Some(vec![owner_reference(cluster)]),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(CONFIG_MAP_FILE_KEY.to_string(), yaml)])),
        ..Default::default()
    })
}

fn field_ref(path: &str) -> Option<EnvVarSource> {
    Some(EnvVarSource {
        field_ref: Some(ObjectFieldSelector {
            api_version: Some("v1".to_string()),
            field_path: path.to_string(),
        }),
        ..Default::default()
    })
}

fn env(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    }
}

/// Endpoint ports for every container port named by a target port of the
/// leader Service.
fn leader_endpoint_ports(leader_service: &Service, containers: &[Container]) -> Vec<EndpointPort> {
    let service_ports = leader_service
        .spec
        .iter()
        .flat_map(|spec| spec.ports.iter().flatten());

    let mut ports = Vec::new();
    for sp in service_ports {
        let Some(IntOrString::String(target)) = &sp.target_port else {
            continue;
        };
        for cp in containers.iter().flat_map(|c| c.ports.iter().flatten()) {
            if cp.name.as_deref() == Some(target.as_str()) {
                ports.push(EndpointPort {
                    name: sp.name.clone(),
                    port: cp.container_port,
                    protocol: cp.protocol.clone(),
                    ..Default::default()
                });
            }
        }
    }
    ports
}

/// Environment variables of the instance container.
///
/// Patroni consumes and then removes environment variables starting with
/// "PATRONI_".
/// - https://github.com/zalando/patroni/blob/v2.0.2/patroni/config.py#L247
pub fn instance_environment(
    cluster: &PostgresCluster,
    cluster_pod_service: &Service,
    leader_service: &Service,
    pod_containers: &[Container],
) -> Vec<EnvVar> {
    let patroni_port = cluster.spec.patroni.port;
    let postgres_port = cluster.spec.port;
    let pod_subdomain = cluster_pod_service.name_any();

    let ports = leader_endpoint_ports(leader_service, pod_containers);
    let ports_yaml = serde_yaml::to_string(&ports).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize leader endpoint ports");
        String::new()
    });

    vec![
        // Required when using Kubernetes for DCS. Patroni must be restarted
        // when this changes.
        EnvVar {
            name: "PATRONI_NAME".to_string(),
            value_from: field_ref("metadata.name"),
            ..Default::default()
        },
        EnvVar {
            name: "PATRONI_KUBERNETES_POD_IP".to_string(),
            value_from: field_ref("status.podIP"),
            ..Default::default()
        },
        // With Endpoints as the DCS, Patroni replicates the leader Service
        // ports onto the Endpoints it writes. Connascent with
        // PATRONI_POSTGRESQL_CONNECT_ADDRESS.
        env("PATRONI_KUBERNETES_PORTS", ports_yaml),
        env(
            "PATRONI_POSTGRESQL_CONNECT_ADDRESS",
            format!("$(PATRONI_NAME).{}:{}", pod_subdomain, postgres_port),
        ),
        // "*" means every TCP interface; Patroni itself connects to "localhost".
        env("PATRONI_POSTGRESQL_LISTEN", format!("*:{}", postgres_port)),
        env(
            "PATRONI_POSTGRESQL_CONFIG_DIR",
            postgres::config_directory(cluster),
        ),
        env("PATRONI_POSTGRESQL_DATA_DIR", postgres::data_directory(cluster)),
        env(
            "PATRONI_RESTAPI_CONNECT_ADDRESS",
            format!("$(PATRONI_NAME).{}:{}", pod_subdomain, patroni_port),
        ),
        env("PATRONI_RESTAPI_LISTEN", format!("*:{}", patroni_port)),
        // `patronictl` looks here for its configuration files.
        env("PATRONICTL_CONFIG_FILE", CONFIG_DIRECTORY.to_string()),
    ]
}

fn projection(config_map: &ConfigMap, path: &str) -> VolumeProjection {
    VolumeProjection {
        config_map: Some(ConfigMapProjection {
            name: config_map.name_any(),
            items: Some(vec![KeyToPath {
                key: CONFIG_MAP_FILE_KEY.to_string(),
                path: path.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Projections of the cluster and instance configuration files into the
/// instance configuration volume
pub fn instance_config_files(cluster: &ConfigMap, instance: &ConfigMap) -> Vec<VolumeProjection> {
    vec![
        projection(cluster, "~postgres-operator_cluster.yaml"),
        projection(instance, "~postgres-operator_instance.yaml"),
    ]
}

fn rest_api_probe(cluster: &PostgresCluster, path: &str) -> Probe {
    let mut probe = Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(cluster.spec.patroni.port),
            scheme: Some("HTTPS".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    ProbeTiming::from_spec(&cluster.spec.patroni).apply(&mut probe);
    probe
}

/// Liveness probe - Patroni REST API
pub fn liveness_probe(cluster: &PostgresCluster) -> Probe {
    rest_api_probe(cluster, "/liveness")
}

/// Readiness probe - Patroni REST API
pub fn readiness_probe(cluster: &PostgresCluster) -> Probe {
    rest_api_probe(cluster, "/readiness")
}
