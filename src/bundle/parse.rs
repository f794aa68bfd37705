// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::model::{Bundle, IncludeDirective};
use super::paths::construct_context_path;
use crate::error::{Error, Result};
use crate::value::{Mapping, Value};

fn unparsed_bundle_path() -> PathBuf {
    PathBuf::from("<bundle>")
}

/// Build a [`Bundle`] from a parsed frontmatter/YAML mapping (§3, §4.5).
///
/// `base_path` is the directory the bundle file lives in, used to resolve
/// relative `context`/`agents` entries; it is `None` only for bundles
/// built purely in-memory (e.g. in tests). `name`/`version`/`description`
/// are read from a nested `bundle:` sub-mapping; every other top-level key
/// is assigned as-is after per-section normalization.
pub fn from_dict(data: &Mapping, base_path: Option<&Path>) -> Result<Bundle> {
    let empty_mapping = Mapping::new();
    let bundle_meta = data.get("bundle").and_then(Value::as_mapping).unwrap_or(&empty_mapping);

    let mut bundle = Bundle {
        base_path: base_path.map(Path::to_path_buf),
        ..Bundle::default()
    };

    if let Some(name) = bundle_meta.get("name").and_then(Value::as_str) {
        bundle.name = name.to_string();
    }
    if let Some(version) = bundle_meta.get("version").and_then(Value::as_str) {
        bundle.version = version.to_string();
    }
    if let Some(description) = bundle_meta.get("description").and_then(Value::as_str) {
        bundle.description = description.to_string();
    }

    bundle.includes = parse_includes(data.get("includes"))?;

    if let Some(session) = data.get("session").and_then(Value::as_mapping) {
        bundle.session = session.clone();
    }
    if let Some(metadata) = data.get("metadata").and_then(Value::as_mapping) {
        bundle.metadata = metadata.clone();
    }

    bundle.providers = parse_module_list(data.get("providers"))?;
    bundle.tools = parse_module_list(data.get("tools"))?;
    bundle.hooks = parse_module_list(data.get("hooks"))?;

    bundle.agents = parse_agents(data.get("agents"))?;

    let (context, pending) = parse_context(data.get("context"), base_path)?;
    bundle.context = context;
    bundle.pending_context = pending;

    Ok(bundle)
}

fn parse_includes(value: Option<&Value>) -> Result<Vec<IncludeDirective>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Some(sequence) = value.as_sequence() else {
        return Err(Error::load(unparsed_bundle_path(), "includes must be a sequence"));
    };

    sequence
        .iter()
        .map(|entry| match entry {
            Value::String(name) => Ok(IncludeDirective::Name(name.clone())),
            Value::Mapping(map) => {
                let bundle = map
                    .get("bundle")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::load(unparsed_bundle_path(), "include record missing 'bundle'"))?
                    .to_string();
                let version = map.get("version").and_then(Value::as_str).map(str::to_string);
                Ok(IncludeDirective::Record { bundle, version })
            }
            _ => Err(Error::load(unparsed_bundle_path(), "include entries must be a string or record")),
        })
        .collect()
}

fn parse_module_list(value: Option<&Value>) -> Result<Vec<Mapping>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Some(sequence) = value.as_sequence() else {
        return Err(Error::load(unparsed_bundle_path(), "module list must be a sequence"));
    };

    sequence
        .iter()
        .map(|entry| {
            entry
                .as_mapping()
                .cloned()
                .ok_or_else(|| Error::load(unparsed_bundle_path(), "module entries must be mappings"))
        })
        .collect()
}

/// An `agents` section may name an `include` list of bare agent names
/// (each becomes a `{name: name}` stub to be resolved against the agent
/// search path later) alongside direct `name: {definition}` entries.
fn parse_agents(value: Option<&Value>) -> Result<Mapping> {
    let Some(value) = value else {
        return Ok(Mapping::new());
    };
    let Some(agents_config) = value.as_mapping() else {
        return Err(Error::load(unparsed_bundle_path(), "agents must be a mapping"));
    };

    let mut result = Mapping::new();

    if let Some(include) = agents_config.get("include").and_then(Value::as_sequence) {
        for entry in include {
            let name = entry
                .as_str()
                .ok_or_else(|| Error::load(unparsed_bundle_path(), "agents.include entries must be strings"))?;
            let mut stub = Mapping::new();
            stub.insert("name".to_string(), Value::String(name.to_string()));
            result.insert(name.to_string(), Value::Mapping(stub));
        }
    }

    for (key, entry) in agents_config {
        if key != "include" {
            if let Value::Mapping(definition) = entry {
                result.insert(key.clone(), Value::Mapping(definition.clone()));
            }
        }
    }

    Ok(result)
}

/// Split a bundle's `context` block into immediately-resolved paths and
/// namespaced (`namespace:path`) references that stay pending until the
/// owning namespace's base path is known (post-compose or post-discovery).
///
/// Two source shapes combine, mirroring the original schema:
/// - an `include` list of bare names: namespaced (`ns:rest`) entries are
///   deferred into `pending_context` keyed and valued by the reference
///   itself; un-namespaced entries resolve under `<base>/context/`.
/// - direct `key: relative_path` string entries: resolved relative to
///   `base_path` (or used verbatim when no `base_path` is set).
fn parse_context(
    value: Option<&Value>,
    base_path: Option<&Path>,
) -> Result<(IndexMap<String, PathBuf>, IndexMap<String, String>)> {
    let mut context = IndexMap::new();
    let mut pending = IndexMap::new();

    let Some(value) = value else {
        return Ok((context, pending));
    };
    let Some(context_config) = value.as_mapping() else {
        return Err(Error::load(unparsed_bundle_path(), "context must be a mapping"));
    };

    if let Some(include) = context_config.get("include").and_then(Value::as_sequence) {
        for entry in include {
            let name = entry
                .as_str()
                .ok_or_else(|| Error::load(unparsed_bundle_path(), "context.include entries must be strings"))?;
            if name.contains(':') {
                pending.insert(name.to_string(), name.to_string());
            } else if let Some(base) = base_path {
                context.insert(name.to_string(), construct_context_path(base, name));
            }
        }
    }

    for (key, entry) in context_config {
        if key == "include" {
            continue;
        }
        let Some(path_str) = entry.as_str() else {
            continue;
        };
        let resolved = match base_path {
            Some(base) => base.join(path_str),
            None => PathBuf::from(path_str),
        };
        context.insert(key.clone(), resolved);
    }

    Ok((context, pending))
}

#[cfg(test)]
mod parse_test {
    use super::*;

    fn mapping_value(pairs: &[(&str, Value)]) -> Mapping {
        let mut m = Mapping::new();
        for (k, v) in pairs {
            m.insert((*k).to_string(), v.clone());
        }
        m
    }

    #[test]
    fn parses_minimal_bundle() {
        let data = mapping_value(&[(
            "bundle",
            Value::Mapping(mapping_value(&[("name", Value::String("demo".into()))])),
        )]);
        let bundle = from_dict(&data, None).unwrap();
        assert_eq!(bundle.name, "demo");
        assert_eq!(bundle.version, "1.0.0");
    }

    #[test]
    fn parses_include_records_and_bare_names() {
        let data = mapping_value(&[(
            "includes",
            Value::Sequence(vec![
                Value::String("base".into()),
                Value::Mapping(mapping_value(&[
                    ("bundle", Value::String("pinned".into())),
                    ("version", Value::String("2.0.0".into())),
                ])),
            ]),
        )]);
        let bundle = from_dict(&data, None).unwrap();
        assert_eq!(bundle.includes.len(), 2);
        assert_eq!(bundle.includes[0].reference(), "base");
        assert_eq!(bundle.includes[1].reference(), "pinned");
    }

    #[test]
    fn splits_namespaced_context_include_into_pending() {
        let data = mapping_value(&[(
            "context",
            Value::Mapping(mapping_value(&[
                (
                    "include",
                    Value::Sequence(vec![
                        Value::String("notes".into()),
                        Value::String("other:shared-notes".into()),
                    ]),
                ),
                ("direct", Value::String("resources/direct.md".into())),
            ])),
        )]);
        let bundle = from_dict(&data, Some(Path::new("/bundle"))).unwrap();
        assert!(bundle.context.contains_key("notes"));
        assert!(bundle.context.contains_key("direct"));
        assert_eq!(
            bundle.pending_context.get("other:shared-notes").map(String::as_str),
            Some("other:shared-notes")
        );
    }

    #[test]
    fn agents_include_list_becomes_name_stubs_alongside_direct_definitions() {
        let data = mapping_value(&[(
            "agents",
            Value::Mapping(mapping_value(&[
                ("include", Value::Sequence(vec![Value::String("bug-hunter".into())])),
                (
                    "reviewer",
                    Value::Mapping(mapping_value(&[("model", Value::String("x".into()))])),
                ),
            ])),
        )]);
        let bundle = from_dict(&data, None).unwrap();
        assert_eq!(
            bundle.agents.get("bug-hunter").and_then(Value::as_mapping).and_then(|m| m.get("name")).and_then(Value::as_str),
            Some("bug-hunter")
        );
        assert!(bundle.agents.contains_key("reviewer"));
    }
}
