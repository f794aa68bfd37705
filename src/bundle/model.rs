// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::PathBuf;

use indexmap::IndexMap;

use super::merge::merge_module_lists;
use super::paths::{construct_agent_path, construct_context_path};
use crate::value::{deep_merge_mapping, Mapping, Value};

/// One entry in a bundle's `includes` sequence: either a bare reference
/// string or a record carrying an explicit `version` pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeDirective {
    Name(String),
    Record { bundle: String, version: Option<String> },
}

impl IncludeDirective {
    pub fn reference(&self) -> &str {
        match self {
            IncludeDirective::Name(name) => name,
            IncludeDirective::Record { bundle, .. } => bundle,
        }
    }
}

/// The composable unit (§3). See `compose` for the merge algebra and
/// `to_mount_plan` for the session-runtime projection.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: String,
    pub version: String,
    pub description: String,
    pub includes: Vec<IncludeDirective>,

    pub session: Mapping,
    pub providers: Vec<Mapping>,
    pub tools: Vec<Mapping>,
    pub hooks: Vec<Mapping>,

    pub agents: Mapping,
    pub context: IndexMap<String, PathBuf>,
    /// Free-form author metadata (supplemented from the original bundle
    /// schema, see SPEC_FULL §3); composes like `session`.
    pub metadata: Mapping,
    pub instruction: Option<String>,

    pub base_path: Option<PathBuf>,
    pub source_base_paths: IndexMap<String, PathBuf>,
    pub pending_context: IndexMap<String, String>,
    pub source_uri: Option<String>,
}

impl Default for Bundle {
    fn default() -> Self {
        Bundle {
            name: String::new(),
            version: "1.0.0".to_string(),
            description: String::new(),
            includes: Vec::new(),
            session: Mapping::new(),
            providers: Vec::new(),
            tools: Vec::new(),
            hooks: Vec::new(),
            agents: Mapping::new(),
            context: IndexMap::new(),
            metadata: Mapping::new(),
            instruction: None,
            base_path: None,
            source_base_paths: IndexMap::new(),
            pending_context: IndexMap::new(),
            source_uri: None,
        }
    }
}

fn prefix_key(namespace: &str, key: &str) -> String {
    if !namespace.is_empty() && !key.contains(':') {
        format!("{namespace}:{key}")
    } else {
        key.to_string()
    }
}

impl Bundle {
    /// Compose this bundle with `others`, later-wins, left to right
    /// (§4.4, §8 invariants 3-5). The receiver is never mutated; a new
    /// `Bundle` is always returned.
    pub fn compose(&self, others: &[Bundle]) -> Bundle {
        let mut result = self.clone();

        if !self.name.is_empty() {
            if let Some(base) = &self.base_path {
                result
                    .source_base_paths
                    .entry(self.name.clone())
                    .or_insert_with(|| base.clone());
            }
        }

        result.context = self
            .context
            .iter()
            .map(|(key, path)| (prefix_key(&self.name, key), path.clone()))
            .collect();
        result.pending_context = self.pending_context.clone();

        for other in others {
            for (namespace, path) in &other.source_base_paths {
                result
                    .source_base_paths
                    .entry(namespace.clone())
                    .or_insert_with(|| path.clone());
            }
            if !other.name.is_empty() {
                if let Some(base) = &other.base_path {
                    result
                        .source_base_paths
                        .entry(other.name.clone())
                        .or_insert_with(|| base.clone());
                }
            }

            if !other.name.is_empty() {
                result.name = other.name.clone();
            }
            if !other.version.is_empty() {
                result.version = other.version.clone();
            }
            if !other.description.is_empty() {
                result.description = other.description.clone();
            }

            deep_merge_mapping(&mut result.session, &other.session);
            deep_merge_mapping(&mut result.metadata, &other.metadata);

            result.providers = merge_module_lists(result.providers, other.providers.clone());
            result.tools = merge_module_lists(result.tools, other.tools.clone());
            result.hooks = merge_module_lists(result.hooks, other.hooks.clone());

            for (name, definition) in &other.agents {
                result.agents.insert(name.clone(), definition.clone());
            }

            for (key, path) in &other.context {
                result
                    .context
                    .insert(prefix_key(&other.name, key), path.clone());
            }
            for (name, reference) in &other.pending_context {
                result.pending_context.insert(name.clone(), reference.clone());
            }

            if let Some(instruction) = &other.instruction {
                if !instruction.is_empty() {
                    result.instruction = Some(instruction.clone());
                }
            }

            if let Some(base) = &other.base_path {
                result.base_path = Some(base.clone());
            }
        }

        result
    }

    /// Project this bundle into the mapping the session runtime accepts,
    /// omitting any section with no content (§4.4).
    pub fn to_mount_plan(&self) -> Mapping {
        let mut plan = Mapping::new();
        if !self.session.is_empty() {
            plan.insert("session".to_string(), Value::Mapping(self.session.clone()));
        }
        if !self.providers.is_empty() {
            plan.insert(
                "providers".to_string(),
                Value::Sequence(self.providers.iter().cloned().map(Value::Mapping).collect()),
            );
        }
        if !self.tools.is_empty() {
            plan.insert(
                "tools".to_string(),
                Value::Sequence(self.tools.iter().cloned().map(Value::Mapping).collect()),
            );
        }
        if !self.hooks.is_empty() {
            plan.insert(
                "hooks".to_string(),
                Value::Sequence(self.hooks.iter().cloned().map(Value::Mapping).collect()),
            );
        }
        if !self.agents.is_empty() {
            plan.insert("agents".to_string(), Value::Mapping(self.agents.clone()));
        }
        plan
    }

    /// Resolve a context file by name: an explicit `context` entry wins,
    /// otherwise `<base_path>/context/<name>[.md]` is tried and must exist.
    pub fn resolve_context_path(&self, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.context.get(name) {
            return Some(path.clone());
        }
        let base = self.base_path.as_deref()?;
        let candidate = construct_context_path(base, name);
        candidate.exists().then_some(candidate)
    }

    /// Resolve an agent definition file, handling both `namespace:name` and
    /// bare `name` forms (see SPEC_FULL's `resolve_agent_path`).
    pub fn resolve_agent_path(&self, name: &str) -> Option<PathBuf> {
        if let Some((namespace, simple_name)) = name.split_once(':') {
            if let Some(base) = self.source_base_paths.get(namespace) {
                let candidate = construct_agent_path(base, simple_name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
            if namespace == self.name {
                if let Some(base) = &self.base_path {
                    let candidate = construct_agent_path(base, simple_name);
                    if candidate.exists() {
                        return Some(candidate);
                    }
                }
            }
            None
        } else {
            let base = self.base_path.as_deref()?;
            let candidate = construct_agent_path(base, name);
            candidate.exists().then_some(candidate)
        }
    }

    pub fn get_system_instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    /// Resolve any `namespace:path` context references that were left
    /// pending at parse time because `source_base_paths` wasn't populated
    /// yet. Call this once `source_base_paths` is final (post-compose, or
    /// after the registry's sub-bundle discovery has run).
    pub fn resolve_pending_context(&mut self) {
        if self.pending_context.is_empty() {
            return;
        }

        let pending: Vec<(String, String)> = self
            .pending_context
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (name, reference) in pending {
            let Some((namespace, rest)) = reference.split_once(':') else {
                continue;
            };

            if let Some(base) = self.source_base_paths.get(namespace).cloned() {
                self.context.insert(name.clone(), construct_context_path(&base, rest));
                self.pending_context.shift_remove(&name);
            } else if namespace == self.name {
                if let Some(base) = self.base_path.clone() {
                    self.context.insert(name.clone(), construct_context_path(&base, rest));
                    self.pending_context.shift_remove(&name);
                }
            }
        }
    }
}
