// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! A tagged-variant tree backing every dynamic, mapping-heavy configuration
//! blob in a bundle (`session`, module `config` maps, free-form `metadata`).
//!
//! Everything that needs "merge these two arbitrarily-shaped YAML/JSON blobs"
//! funnels through [`Value::deep_merge`] rather than each section growing its
//! own bespoke merge logic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An `IndexMap` is used (not `HashMap`) so mapping iteration order is
/// stable: deterministic serialization, and the order-preserving
/// module-list merge law depends on insertion order being meaningful.
pub type Mapping = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Mapping(m) => m.is_empty(),
            Value::Sequence(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Merge `other` into `self`, later (`other`) wins on scalars.
    ///
    /// For two mappings, each shared key is merged recursively; keys only
    /// present on one side are carried through untouched. Any other pairing
    /// (scalar/scalar, scalar/mapping, sequence/anything, ...) simply
    /// replaces `self` with `other` — "later wins" at that level.
    pub fn deep_merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(a), Value::Mapping(b)) => {
                for (key, b_value) in b {
                    match a.get_mut(&key) {
                        Some(a_value) => a_value.deep_merge(b_value),
                        None => {
                            a.insert(key, b_value);
                        }
                    }
                }
            }
            (slot, other) => {
                *slot = other;
            }
        }
    }

    /// Convert a parsed YAML value into this crate's `Value` tree.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Value {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = Mapping::new();
                for (k, v) in map {
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other).unwrap_or_default(),
                    };
                    out.insert(key, Value::from_yaml(v));
                }
                Value::Mapping(out)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

/// Merge `b` into `a` using the same rules as [`Value::deep_merge`], without
/// requiring the caller to wrap a bare [`Mapping`] in a [`Value`] first.
pub fn deep_merge_mapping(a: &mut Mapping, b: &Mapping) {
    for (key, b_value) in b {
        match a.get_mut(key) {
            Some(a_value) => a_value.deep_merge(b_value.clone()),
            None => {
                a.insert(key.clone(), b_value.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "./value_test.rs"]
mod value_test;
