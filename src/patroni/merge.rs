//! Layered merging of configuration sources
//!
//! Configuration comes from three layers applied in order: operator defaults,
//! the user's dynamic configuration, and operator mandatory values. Most keys
//! are plain overrides. A few are lists whose order matters, so each key can
//! carry its own [`CombineRule`].

use std::collections::BTreeMap;

use tracing::debug;

use super::tree::{ConfigTree, Mapping, Scalar};
use crate::postgres::{ParameterSet, SHARED_PRELOAD_LIBRARIES};

/// Library that must be loaded ahead of every other library.
/// - https://github.com/citusdata/citus/blob/v12.0.0/src/backend/distributed/shared_library_init.c#L417-L419
pub const CITUS_LIBRARY: &str = "citus";

/// How a mandatory value is applied over the value already merged
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CombineRule {
    /// The mandatory value replaces the merged value
    Overwrite,

    /// The mandatory value is placed ahead of the merged list. When the
    /// combined list mentions `hoist`, that entry is placed first of all.
    PrependList {
        separator: &'static str,
        hoist: Option<&'static str>,
    },
}

impl CombineRule {
    fn combine(&self, merged: Option<&ConfigTree>, mandatory: &ConfigTree) -> ConfigTree {
        let CombineRule::PrependList { separator, hoist } = self else {
            return mandatory.clone();
        };
        let Some(required) = mandatory.as_str() else {
            return mandatory.clone();
        };

        let mut value = required.to_string();
        match merged {
            Some(ConfigTree::Scalar(Scalar::String(existing))) if !existing.is_empty() => {
                value = format!("{}{}{}", value, separator, existing);
            }
            Some(ConfigTree::Scalar(Scalar::String(_))) | None => {}
            Some(other) => {
                debug!(value = ?other, "Ignoring non-string list value during merge");
            }
        }

        if let Some(first) = hoist.filter(|h| value.contains(*h)) {
            value = format!("{}{}{}", first, separator, value);
        }

        ConfigTree::from(value)
    }
}

/// Copy-then-overlay merge with per-key combination rules
#[derive(Clone, Debug, Default)]
pub struct LayeredMerge {
    rules: BTreeMap<String, CombineRule>,
}

impl LayeredMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `rule` when applying the mandatory value of `key`
    pub fn with_rule(mut self, key: impl Into<String>, rule: CombineRule) -> Self {
        self.rules.insert(key.into(), rule);
        self
    }

    pub fn rule_for(&self, key: &str) -> &CombineRule {
        self.rules.get(key).unwrap_or(&CombineRule::Overwrite)
    }

    /// Merge three layers into a fresh mapping. No key is ever removed.
    pub fn merge(&self, defaults: &Mapping, overlay: &Mapping, mandatory: &Mapping) -> Mapping {
        let mut merged = defaults.clone();
        merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));

        for (key, value) in mandatory {
            let combined = self.rule_for(key).combine(merged.get(key), value);
            merged.insert(key.clone(), combined);
        }
        merged
    }
}

/// Merge rules for PostgreSQL parameters
pub fn parameter_merge() -> LayeredMerge {
    LayeredMerge::new().with_rule(
        SHARED_PRELOAD_LIBRARIES,
        CombineRule::PrependList {
            separator: ",",
            hoist: Some(CITUS_LIBRARY),
        },
    )
}

fn parameter_mapping(set: &ParameterSet) -> Mapping {
    set.iter()
        .map(|(k, v)| (k.to_string(), ConfigTree::from(v)))
        .collect()
}

/// Merge PostgreSQL parameters: defaults, then the user's
/// `postgresql.parameters`, then mandatory values.
///
/// A missing or malformed user section counts as empty.
pub fn merge_parameters(
    defaults: &ParameterSet,
    overlay: Option<&ConfigTree>,
    mandatory: &ParameterSet,
) -> Mapping {
    let empty = Mapping::new();
    let overlay = match overlay {
        Some(ConfigTree::Mapping(m)) => m,
        Some(other) => {
            debug!(value = ?other, "Ignoring postgresql.parameters that is not a mapping");
            &empty
        }
        None => &empty,
    };

    parameter_merge().merge(
        &parameter_mapping(defaults),
        overlay,
        &parameter_mapping(mandatory),
    )
}

/// Merge `pg_hba` rules: mandatory lines first, then the user's lines.
/// When the user contributes nothing usable, the default lines follow the
/// mandatory ones instead.
///
/// Entries that are not strings are skipped, as is a section that is not a
/// sequence.
pub fn merge_access_rules(
    mandatory: &[String],
    user: Option<&ConfigTree>,
    defaults: &[String],
) -> Vec<String> {
    let mut rules = mandatory.to_vec();

    match user {
        Some(ConfigTree::Sequence(lines)) => {
            for line in lines {
                match line.as_str() {
                    Some(rule) => rules.push(rule.to_string()),
                    None => debug!(value = ?line, "Skipping pg_hba entry that is not a string"),
                }
            }
        }
        Some(other) => debug!(value = ?other, "Ignoring pg_hba that is not a sequence"),
        None => {}
    }

    if rules.len() == mandatory.len() {
        rules.extend_from_slice(defaults);
    }
    rules
}
