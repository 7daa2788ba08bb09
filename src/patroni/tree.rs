//! Configuration tree
//!
//! Patroni documents are nested mappings of arbitrary shape. Rather than pass
//! around untyped JSON, every merge input and output is a [`ConfigTree`], so
//! that reading a field of the wrong type is an explicit pattern match with a
//! fallback instead of a silent cast.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A mapping node. Keys are kept sorted so serialization is deterministic.
pub type Mapping = BTreeMap<String, ConfigTree>;

/// One node of a configuration document
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigTree {
    Mapping(Mapping),
    Sequence(Vec<ConfigTree>),
    Scalar(Scalar),
}

/// A leaf value
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConfigTree {
    /// The null scalar
    pub fn null() -> Self {
        ConfigTree::Scalar(Scalar::Null)
    }

    /// Build a mapping node from key/value pairs
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ConfigTree)>,
    {
        ConfigTree::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a sequence of strings
    pub fn strings<S, I>(items: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        ConfigTree::Sequence(
            items
                .into_iter()
                .map(|s| ConfigTree::Scalar(Scalar::String(s.into())))
                .collect(),
        )
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ConfigTree::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigTree]> {
        match self {
            ConfigTree::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigTree::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigTree::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigTree::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Follow a path of mapping keys. Any non-mapping node along the way
    /// ends the lookup.
    pub fn lookup(&self, path: &[&str]) -> Option<&ConfigTree> {
        path.iter()
            .try_fold(self, |node, key| node.as_mapping()?.get(*key))
    }
}

/// Follow a path of mapping keys starting at a mapping
pub fn lookup<'a>(root: &'a Mapping, path: &[&str]) -> Option<&'a ConfigTree> {
    let (first, rest) = path.split_first()?;
    root.get(*first)?.lookup(rest)
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigTree {
    fn from(value: &str) -> Self {
        ConfigTree::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for ConfigTree {
    fn from(value: String) -> Self {
        ConfigTree::Scalar(Scalar::String(value))
    }
}

impl From<bool> for ConfigTree {
    fn from(value: bool) -> Self {
        ConfigTree::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for ConfigTree {
    fn from(value: i64) -> Self {
        ConfigTree::Scalar(Scalar::Int(value))
    }
}

impl From<i32> for ConfigTree {
    fn from(value: i32) -> Self {
        ConfigTree::Scalar(Scalar::Int(value.into()))
    }
}

impl From<Mapping> for ConfigTree {
    fn from(value: Mapping) -> Self {
        ConfigTree::Mapping(value)
    }
}

impl From<Vec<String>> for ConfigTree {
    fn from(value: Vec<String>) -> Self {
        ConfigTree::strings(value)
    }
}

impl From<serde_json::Value> for ConfigTree {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ConfigTree::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigTree::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigTree::Scalar(Scalar::Int(i)),
                None => ConfigTree::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => ConfigTree::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                ConfigTree::Sequence(items.into_iter().map(ConfigTree::from).collect())
            }
            Value::Object(map) => ConfigTree::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigTree::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for ConfigTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigTree::Mapping(m) => m.serialize(serializer),
            ConfigTree::Sequence(s) => s.serialize(serializer),
            ConfigTree::Scalar(s) => s.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(x) => serializer.serialize_f64(*x),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(ConfigTree::from)
    }
}
