use std::io::Read;

use kube::ResourceExt;
use tracing::{debug, info, warn};

use patroni_config::crd::PatroniLogConfig;
use patroni_config::{PostgresCluster, catalogs, cluster_yaml, instance_yaml};

/// Environment variable overriding the Patroni log storage limit (e.g. "10Mi")
const LOG_STORAGE_LIMIT_ENV: &str = "PATRONI_LOG_STORAGE_LIMIT";

/// Environment variable holding the pgBackRest replica-create command,
/// split on whitespace
const PGBACKREST_COMMAND_ENV: &str = "PGBACKREST_REPLICA_CREATE_COMMAND";

fn usage() -> String {
    "usage: patroni-config <manifest.yaml|-> [instance-set]".to_string()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the generated documents
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patroni_config=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let manifest_path = args.next().ok_or_else(usage)?;
    let instance_name = args.next();

    let manifest = if manifest_path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&manifest_path)?
    };

    let cluster: PostgresCluster = serde_yaml::from_str(&manifest)?;
    info!(
        cluster = %cluster.name_any(),
        bootstrapped = cluster.bootstrapped(),
        "Rendering Patroni configuration"
    );

    let log_storage_limit = match std::env::var(LOG_STORAGE_LIMIT_ENV) {
        Ok(limit) => PatroniLogConfig {
            level: cluster.spec.patroni.log_level().to_string(),
            storage_limit: Some(limit),
        }
        .storage_limit_bytes()?,
        Err(_) => match &cluster.spec.patroni.logging {
            Some(logging) => logging.storage_limit_bytes()?,
            None => 0,
        },
    };
    debug!(log_storage_limit, "Resolved log storage limit");

    let pgbackrest_command: Vec<String> = std::env::var(PGBACKREST_COMMAND_ENV)
        .map(|c| c.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    let (hbas, parameters) = catalogs(&cluster);
    print!(
        "{}",
        cluster_yaml(&cluster, &hbas, &parameters, log_storage_limit)?
    );

    let instances: Vec<_> = match &instance_name {
        Some(name) => vec![cluster.instance_set(name)?],
        None => cluster.spec.instances.iter().collect(),
    };
    if instances.is_empty() {
        warn!("Cluster has no instance sets; only the cluster document was rendered");
    }

    for instance in instances {
        println!("---");
        print!(
            "{}",
            instance_yaml(&cluster, instance, &pgbackrest_command)?
        );
    }

    Ok(())
}
