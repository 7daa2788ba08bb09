//! Host-based authentication rules
//!
//! Each [`HostBasedAuthentication`] renders to one line of `pg_hba.conf`.
//! PostgreSQL evaluates the lines in order and uses the first match, so the
//! position of a rule matters as much as its content.
//!
//! Reference: https://www.postgresql.org/docs/current/auth-pg-hba-conf.html

use std::collections::BTreeMap;
use std::fmt;

use super::config::REPLICATION_USER;

/// One `pg_hba.conf` rule
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostBasedAuthentication {
    origin: String,
    database: String,
    user: String,
    address: String,
    method: String,
    options: BTreeMap<String, String>,
}

impl HostBasedAuthentication {
    /// A rule that matches nothing until configured. Databases and users
    /// default to "all".
    pub fn new() -> Self {
        Self {
            database: "all".to_string(),
            user: "all".to_string(),
            ..Default::default()
        }
    }

    /// Match connections over UNIX domain sockets
    pub fn local(mut self) -> Self {
        self.origin = "local".to_string();
        self.address.clear();
        self
    }

    /// Match TCP connections, with or without TLS
    pub fn tcp(mut self) -> Self {
        self.origin = "host".to_string();
        self
    }

    /// Match TCP connections that use TLS
    pub fn tls(mut self) -> Self {
        self.origin = "hostssl".to_string();
        self
    }

    /// Match connections from a network address or "all"
    pub fn network(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Match a database. Names are quoted so keywords match literally.
    pub fn database(mut self, name: &str) -> Self {
        self.database = quote(name);
        self
    }

    /// Match physical replication connections
    pub fn replication(mut self) -> Self {
        self.database = "replication".to_string();
        self
    }

    /// Match a user. Names are quoted so keywords match literally.
    pub fn user(mut self, name: &str) -> Self {
        self.user = quote(name);
        self
    }

    /// Authentication method, e.g. "peer", "cert", "scram-sha-256", "reject"
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Authentication option, e.g. `map=ssl`
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl fmt::Display for HostBasedAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = vec![self.origin.as_str(), self.database.as_str(), self.user.as_str()];
        if !self.address.is_empty() {
            fields.push(&self.address);
        }
        fields.push(&self.method);
        write!(f, "{}", fields.join(" "))?;

        for (name, value) in &self.options {
            write!(f, " {}=\"{}\"", name, value.replace('"', "\"\""))?;
        }
        Ok(())
    }
}

/// Mandatory and default host-based authentication rules
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HBAs {
    pub mandatory: Vec<HostBasedAuthentication>,
    pub default: Vec<HostBasedAuthentication>,
}

impl HBAs {
    pub fn mandatory_lines(&self) -> Vec<String> {
        self.mandatory.iter().map(ToString::to_string).collect()
    }

    pub fn default_lines(&self) -> Vec<String> {
        self.default.iter().map(ToString::to_string).collect()
    }
}

/// The rules every cluster starts with
pub fn new_hbas() -> HBAs {
    HBAs {
        mandatory: vec![
            // The "postgres" superuser may only log in from inside the Pod.
            HostBasedAuthentication::new()
                .local()
                .user("postgres")
                .method("peer"),
            // Replication and pg_rewind authenticate with client certificates.
            HostBasedAuthentication::new()
                .tls()
                .replication()
                .user(REPLICATION_USER)
                .network("all")
                .method("cert"),
            HostBasedAuthentication::new()
                .tls()
                .database("postgres")
                .user(REPLICATION_USER)
                .network("all")
                .method("cert"),
            HostBasedAuthentication::new()
                .tcp()
                .user(REPLICATION_USER)
                .network("all")
                .method("reject"),
        ],
        default: vec![
            HostBasedAuthentication::new()
                .tls()
                .network("all")
                .method("scram-sha-256"),
        ],
    }
}
