//! Unit tests for resource generators
//!
//! Tests for the Patroni ConfigMaps, container environment, volume
//! projections and probes.

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EndpointPort, EnvVar, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use kube::core::ObjectMeta;

use patroni_config::catalogs;
use patroni_config::patroni::CONFIG_MAP_FILE_KEY;
use patroni_config::resources::patroni;

use crate::common::*;

fn service(name: &str, ports: Vec<ServicePort>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn service_port(name: &str, port: i32, target: IntOrString) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(target),
        ..Default::default()
    }
}

fn container(ports: &[(&str, i32)]) -> Container {
    Container {
        name: "database".to_string(),
        ports: Some(
            ports
                .iter()
                .map(|(name, port)| ContainerPort {
                    name: Some(name.to_string()),
                    container_port: *port,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    }
}

fn env_value<'a>(vars: &'a [EnvVar], name: &str) -> Option<&'a str> {
    vars.iter()
        .find(|v| v.name == name)
        .and_then(|v| v.value.as_deref())
}

fn env_field_path<'a>(vars: &'a [EnvVar], name: &str) -> Option<&'a str> {
    vars.iter()
        .find(|v| v.name == name)
        .and_then(|v| v.value_from.as_ref())
        .and_then(|s| s.field_ref.as_ref())
        .map(|f| f.field_path.as_str())
}

mod config_map_tests {
    use super::*;

    #[test]
    fn test_cluster_config_map() {
        let cluster = create_test_cluster("hippo", "prod");
        let (hbas, parameters) = catalogs(&cluster);
        let cm = patroni::cluster_config_map(&cluster, &hbas, &parameters).unwrap();

        assert_eq!(cm.name_any(), "hippo-config");
        assert_eq!(cm.namespace(), Some("prod".to_string()));
        assert_eq!(
            cm.labels().get("postgres.example.com/cluster"),
            Some(&"hippo".to_string())
        );

        let owner = &cm.owner_references()[0];
        assert_eq!(owner.kind, "PostgresCluster");
        assert_eq!(owner.uid, "test-uid-12345");

        let data = cm.data.as_ref().unwrap();
        let yaml = data.get(CONFIG_MAP_FILE_KEY).unwrap();
        assert!(yaml.starts_with("# Generated by postgres-operator. DO NOT EDIT."));
        assert!(yaml.contains("scope: hippo-ha"));
    }

    #[test]
    fn test_cluster_config_map_log_limit() {
        let cluster = PostgresClusterBuilder::new("hippo", "default")
            .with_logging("INFO", Some("1Mi"))
            .build();
        let (hbas, parameters) = catalogs(&cluster);
        let cm = patroni::cluster_config_map(&cluster, &hbas, &parameters).unwrap();

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&cm.data.unwrap()[CONFIG_MAP_FILE_KEY]).unwrap();
        assert_eq!(doc["log"]["file_size"], 524288);
    }

    #[test]
    fn test_cluster_config_map_rejects_bad_limit() {
        let cluster = PostgresClusterBuilder::new("hippo", "default")
            .with_logging("INFO", Some("lots"))
            .build();
        let (hbas, parameters) = catalogs(&cluster);

        let err = patroni::cluster_config_map(&cluster, &hbas, &parameters).unwrap_err();
        assert!(matches!(err, patroni_config::Error::InvalidConfig(_)));
    }

    #[test]
    fn test_instance_config_map() {
        let cluster = create_test_cluster("hippo", "prod");
        let instance = cluster.instance_set("00").unwrap();
        let cm = patroni::instance_config_map(&cluster, instance, &pgbackrest_command()).unwrap();

        assert_eq!(cm.name_any(), "hippo-00-config");
        assert_eq!(
            cm.labels().get("postgres.example.com/instance-set"),
            Some(&"00".to_string())
        );
        let yaml = &cm.data.as_ref().unwrap()[CONFIG_MAP_FILE_KEY];
        assert!(yaml.contains("create_replica_methods"));
    }
}

mod environment_tests {
    use super::*;

    fn environment() -> Vec<EnvVar> {
        let cluster = PostgresClusterBuilder::new("hippo", "default")
            .with_port(5433)
            .with_patroni_port(8009)
            .build();
        let pods = service("hippo-pods", vec![]);
        let leader = service(
            "hippo-ha",
            vec![
                service_port("postgres", 5433, IntOrString::String("postgres".to_string())),
                // Numeric targets cannot be matched to a named container port
                service_port("other", 9000, IntOrString::Int(9000)),
            ],
        );
        let containers = [
            container(&[("postgres", 5433), ("patroni", 8009)]),
            container(&[("metrics", 9187)]),
        ];
        patroni::instance_environment(&cluster, &pods, &leader, &containers)
    }

    #[test]
    fn test_downward_api_variables() {
        let vars = environment();
        assert_eq!(env_field_path(&vars, "PATRONI_NAME"), Some("metadata.name"));
        assert_eq!(
            env_field_path(&vars, "PATRONI_KUBERNETES_POD_IP"),
            Some("status.podIP")
        );
    }

    #[test]
    fn test_addresses() {
        let vars = environment();
        assert_eq!(
            env_value(&vars, "PATRONI_POSTGRESQL_CONNECT_ADDRESS"),
            Some("$(PATRONI_NAME).hippo-pods:5433")
        );
        assert_eq!(env_value(&vars, "PATRONI_POSTGRESQL_LISTEN"), Some("*:5433"));
        assert_eq!(
            env_value(&vars, "PATRONI_RESTAPI_CONNECT_ADDRESS"),
            Some("$(PATRONI_NAME).hippo-pods:8009")
        );
        assert_eq!(env_value(&vars, "PATRONI_RESTAPI_LISTEN"), Some("*:8009"));
    }

    #[test]
    fn test_directories() {
        let vars = environment();
        assert_eq!(
            env_value(&vars, "PATRONI_POSTGRESQL_DATA_DIR"),
            Some("/pgdata/pg16")
        );
        assert_eq!(
            env_value(&vars, "PATRONI_POSTGRESQL_CONFIG_DIR"),
            Some("/pgdata/pg16")
        );
        assert_eq!(env_value(&vars, "PATRONICTL_CONFIG_FILE"), Some("/etc/patroni"));
    }

    #[test]
    fn test_kubernetes_ports() {
        let vars = environment();
        let ports: Vec<EndpointPort> =
            serde_yaml::from_str(env_value(&vars, "PATRONI_KUBERNETES_PORTS").unwrap()).unwrap();

        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name.as_deref(), Some("postgres"));
        assert_eq!(ports[0].port, 5433);
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    }

    #[test]
    fn test_variables_are_ordered() {
        let names: Vec<String> = environment().into_iter().map(|v| v.name).collect();
        assert_eq!(names[0], "PATRONI_NAME");
        assert_eq!(names.last().map(String::as_str), Some("PATRONICTL_CONFIG_FILE"));
    }
}

mod projection_tests {
    use super::*;

    #[test]
    fn test_instance_config_files() {
        let cluster = create_test_cluster("hippo", "default");
        let (hbas, parameters) = catalogs(&cluster);
        let cluster_cm = patroni::cluster_config_map(&cluster, &hbas, &parameters).unwrap();
        let instance_cm =
            patroni::instance_config_map(&cluster, &cluster.spec.instances[0], &[]).unwrap();

        let projections = patroni::instance_config_files(&cluster_cm, &instance_cm);
        assert_eq!(projections.len(), 2);

        let first = projections[0].config_map.as_ref().unwrap();
        assert_eq!(first.name, "hippo-config");
        let item = &first.items.as_ref().unwrap()[0];
        assert_eq!(item.key, "patroni.yaml");
        assert_eq!(item.path, "~postgres-operator_cluster.yaml");

        let second = projections[1].config_map.as_ref().unwrap();
        assert_eq!(second.name, "hippo-00-config");
        assert_eq!(
            second.items.as_ref().unwrap()[0].path,
            "~postgres-operator_instance.yaml"
        );
    }
}

mod probe_tests {
    use super::*;

    #[test]
    fn test_liveness_probe_defaults() {
        let cluster = create_test_cluster("hippo", "default");
        let probe = patroni::liveness_probe(&cluster);

        let http = probe.http_get.as_ref().unwrap();
        assert_eq!(http.path.as_deref(), Some("/liveness"));
        assert_eq!(http.port, IntOrString::Int(8008));
        assert_eq!(http.scheme.as_deref(), Some("HTTPS"));

        assert_eq!(probe.timeout_seconds, Some(5));
        assert_eq!(probe.period_seconds, Some(10));
        assert_eq!(probe.success_threshold, Some(1));
        assert_eq!(probe.failure_threshold, Some(3));
    }

    #[test]
    fn test_readiness_probe_custom_timing() {
        let cluster = PostgresClusterBuilder::new("hippo", "default")
            .with_timing(1, 3)
            .build();
        let probe = patroni::readiness_probe(&cluster);

        assert_eq!(
            probe.http_get.as_ref().unwrap().path.as_deref(),
            Some("/readiness")
        );
        // Half a second rounds down; the floor keeps it at one
        assert_eq!(probe.timeout_seconds, Some(1));
        assert_eq!(probe.period_seconds, Some(1));
        assert_eq!(probe.failure_threshold, Some(3));
    }
}
