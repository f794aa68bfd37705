// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Single process-wide facade (C7): name registration, the load pipeline
//! (parse URI → resolve source → load bundle file → walk up for a root →
//! compose includes → update state), include-graph bookkeeping, JSON
//! persistence, cycle detection, and update checks.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::config;
use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::loader::load_bundle_from_path;
use crate::sources::SourceResolver;

const PERSISTED_SCHEMA_VERSION: u32 = 1;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Tracked state for a registered bundle, persisted verbatim to
/// `registry.json` (§4.6, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleState {
    pub uri: String,
    pub name: String,
    pub version: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub checked_at: Option<DateTime<Utc>>,
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_by: Option<Vec<String>>,
    #[serde(default = "default_is_root")]
    pub is_root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_name: Option<String>,
}

fn default_is_root() -> bool {
    true
}

impl BundleState {
    fn new(uri: String, name: String) -> Self {
        BundleState {
            uri,
            name,
            version: None,
            loaded_at: None,
            checked_at: None,
            local_path: None,
            includes: None,
            included_by: None,
            is_root: true,
            root_name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRegistry {
    version: u32,
    bundles: IndexMap<String, BundleState>,
}

/// Result of a check for an available update (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub name: String,
    pub current_version: Option<String>,
    pub available_version: String,
    pub uri: String,
}

/// Central bundle management: registration, loading, caching, and update
/// checking, rooted at a resolved home directory (§4.6).
pub struct Registry {
    home: PathBuf,
    state: Mutex<IndexMap<String, BundleState>>,
    loading: Mutex<HashSet<String>>,
    source_resolver: SourceResolver,
    discovery: Mutex<Option<Box<dyn Discovery>>>,
}

impl Registry {
    /// Resolve `home` (explicit argument, then `AMPLIFIER_HOME`, then
    /// `~/.amplifier`), load any persisted state found there, and build the
    /// default source-resolution chain rooted at the current directory.
    pub fn new(home: Option<PathBuf>) -> Result<Self> {
        let home = config::resolve_home(home)?;
        let cwd = std::env::current_dir()?;
        let source_resolver = SourceResolver::new(config::cache_dir(&home), cwd);

        let state = Mutex::new(load_persisted_state(&home));

        Ok(Registry {
            home,
            state,
            loading: Mutex::new(HashSet::new()),
            source_resolver,
            discovery: Mutex::new(None),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Install a fallback name→URI [`Discovery`], consulted only when a
    /// name is neither registered nor shaped like a URI (§9 supplement 5).
    pub fn set_discovery(&self, discovery: Box<dyn Discovery>) {
        *self.discovery.lock().unwrap() = Some(discovery);
    }

    /// Upsert name → URI mappings: a known name keeps its tracked state
    /// and only has its URI updated; an unknown name gets a fresh row.
    /// Does not persist; call [`Registry::save`] to do that.
    pub fn register(&self, bundles: IndexMap<String, String>) {
        let mut state = self.state.lock().unwrap();
        for (name, uri) in bundles {
            match state.get_mut(&name) {
                Some(existing) => existing.uri = uri,
                None => {
                    state.insert(name.clone(), BundleState::new(uri, name));
                }
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().get(name).map(|s| s.uri.clone())
    }

    pub fn list_registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_state(&self, name: &str) -> Option<BundleState> {
        self.state.lock().unwrap().get(name).cloned()
    }

    pub fn get_all_state(&self) -> IndexMap<String, BundleState> {
        self.state.lock().unwrap().clone()
    }

    /// Load a single bundle by registered name or direct URI.
    pub async fn load(&self, name_or_uri: &str, auto_register: bool) -> Result<Bundle> {
        self.load_single(name_or_uri, auto_register, true).await
    }

    /// Load every registered bundle concurrently; per-bundle failures are
    /// logged and excluded from the result rather than propagated (§4.6).
    pub async fn load_all(&self) -> IndexMap<String, Bundle> {
        let names = self.list_registered();
        if names.is_empty() {
            return IndexMap::new();
        }

        let loads = names.iter().map(|name| self.load_single(name, false, true));
        let results = join_all(loads).await;

        let mut bundles = IndexMap::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(bundle) => {
                    bundles.insert(name, bundle);
                }
                Err(error) => {
                    tracing::warn!(bundle = %name, error = %error, "failed to load bundle");
                }
            }
        }
        bundles
    }

    fn load_single<'a>(
        &'a self,
        name_or_uri: &'a str,
        auto_register: bool,
        auto_include: bool,
    ) -> BoxFuture<'a, Result<Bundle>> {
        Box::pin(async move {
            let registered_name = self.state.lock().unwrap().contains_key(name_or_uri).then(|| name_or_uri.to_string());
            let uri = match &registered_name {
                Some(name) => self.state.lock().unwrap().get(name).unwrap().uri.clone(),
                None => self.discover_uri(name_or_uri).unwrap_or_else(|| name_or_uri.to_string()),
            };

            if !self.loading.lock().unwrap().insert(uri.clone()) {
                return Err(Error::DependencyCycle(uri));
            }

            let result = self
                .load_single_body(&uri, registered_name.as_deref(), auto_register, auto_include)
                .await;

            self.loading.lock().unwrap().remove(&uri);
            result
        })
    }

    async fn load_single_body(
        &self,
        uri: &str,
        registered_name: Option<&str>,
        auto_register: bool,
        auto_include: bool,
    ) -> Result<Bundle> {
        let resolved = self.source_resolver.resolve(uri).await?;
        let local_path = resolved.active_path.clone();

        let mut bundle = load_bundle_from_path(&local_path).await?;

        let search_start = if local_path.is_file() {
            local_path.parent().map(Path::to_path_buf).unwrap_or_else(|| local_path.clone())
        } else {
            local_path.clone()
        };

        let root_bundle_path = find_nearest_bundle_file(&search_start, &resolved.source_root);

        let mut root_bundle_name: Option<String> = None;
        let mut is_root_bundle = true;

        if let Some(root_path) = &root_bundle_path {
            if root_path != &local_path {
                let root_bundle = load_bundle_from_path(root_path).await?;
                if !root_bundle.name.is_empty() {
                    bundle
                        .source_base_paths
                        .insert(root_bundle.name.clone(), resolved.source_root.clone());
                }
                if !bundle.name.is_empty() && bundle.name != root_bundle.name {
                    bundle
                        .source_base_paths
                        .insert(bundle.name.clone(), resolved.source_root.clone());
                }
                if !root_bundle.name.is_empty() && root_bundle.name != bundle.name {
                    is_root_bundle = false;
                    root_bundle_name = Some(root_bundle.name.clone());
                }
            }
        }

        // Register for namespace resolution before processing includes: a
        // bundle's own includes may reference its own namespace.
        if !bundle.name.is_empty() && !self.state.lock().unwrap().contains_key(&bundle.name) {
            let mut row = BundleState::new(uri.to_string(), bundle.name.clone());
            row.version = Some(bundle.version.clone());
            row.loaded_at = Some(Utc::now());
            row.local_path = Some(local_path.display().to_string());
            row.is_root = is_root_bundle;
            row.root_name = root_bundle_name.clone();
            self.state.lock().unwrap().insert(bundle.name.clone(), row);
        }

        let update_name = registered_name
            .map(str::to_string)
            .or_else(|| (!bundle.name.is_empty() && self.state.lock().unwrap().contains_key(&bundle.name)).then(|| bundle.name.clone()));
        if let Some(name) = update_name {
            if let Some(state) = self.state.lock().unwrap().get_mut(&name) {
                state.version = Some(bundle.version.clone());
                state.loaded_at = Some(Utc::now());
                state.local_path = Some(local_path.display().to_string());
            }
        }

        if auto_include && !bundle.includes.is_empty() {
            bundle = self.compose_includes(bundle).await?;
        }

        bundle.source_uri = Some(uri.to_string());

        // Namespace registration above runs unconditionally: a bundle's own
        // includes may reference its own namespace even when the caller
        // didn't ask for auto-registration.
        let _ = auto_register;

        Ok(bundle)
    }

    async fn compose_includes(&self, bundle: Bundle) -> Result<Bundle> {
        if bundle.includes.is_empty() {
            return Ok(bundle);
        }

        let mut included_bundles = Vec::new();
        let mut included_names = Vec::new();

        for include in &bundle.includes {
            let reference = include.reference();
            let Some(resolved_source) = self.resolve_include_source(reference) else {
                tracing::warn!(include = %reference, "include could not be resolved, skipping");
                continue;
            };

            match self.load_single(&resolved_source, true, true).await {
                Ok(included) => {
                    if !included.name.is_empty() {
                        included_names.push(included.name.clone());
                    }
                    included_bundles.push(included);
                }
                Err(Error::NotFound(_)) => {
                    tracing::warn!(include = %reference, "include not found, skipping");
                }
                Err(error) => return Err(error),
            }
        }

        if included_bundles.is_empty() {
            return Ok(bundle);
        }

        if !bundle.name.is_empty() && !included_names.is_empty() {
            self.record_include_relationships(&bundle.name, &included_names);
        }

        let (first, rest) = included_bundles.split_first().expect("checked non-empty above");
        let composed = first.compose(rest);
        Ok(composed.compose(std::slice::from_ref(&bundle)))
    }

    fn record_include_relationships(&self, parent_name: &str, child_names: &[String]) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(parent) = state.get_mut(parent_name) {
                let includes = parent.includes.get_or_insert_with(Vec::new);
                for child in child_names {
                    if !includes.contains(child) {
                        includes.push(child.clone());
                    }
                }
            }
            for child_name in child_names {
                if let Some(child) = state.get_mut(child_name) {
                    let included_by = child.included_by.get_or_insert_with(Vec::new);
                    if !included_by.contains(&parent_name.to_string()) {
                        included_by.push(parent_name.to_string());
                    }
                }
            }
        }
        if let Err(error) = self.save() {
            tracing::warn!(error = %error, "failed to persist registry after recording include relationships");
        }
    }

    /// Fall back to [`Discovery`] for a name that is neither registered
    /// nor shaped like a URI. Never overrides registration or a bare-URI
    /// reading; only consulted when both have already failed.
    fn discover_uri(&self, name: &str) -> Option<String> {
        if name.contains("://") || name.starts_with("git+") || name.starts_with("zip+") {
            return None;
        }
        self.discovery.lock().unwrap().as_ref()?.find(name)
    }

    /// Resolution priority: an already-qualified URI (`scheme://` or
    /// `git+…`) passes through unchanged; a `namespace:path` reference is
    /// resolved against the namespace's tracked `local_path` by probing a
    /// handful of extension/child-bundle candidates; a plain name passes
    /// through for [`Registry::load_single`] to look up in the registry.
    fn resolve_include_source(&self, source: &str) -> Option<String> {
        if source.contains("://") || source.starts_with("git+") {
            return Some(source.to_string());
        }

        let Some((namespace, rel_path)) = source.split_once(':') else {
            return Some(source.to_string());
        };

        let local_path = {
            let state = self.state.lock().unwrap();
            state.get(namespace).and_then(|s| s.local_path.clone())
        }?;
        let namespace_path = PathBuf::from(local_path);

        let resource_path = if namespace_path.is_file() {
            namespace_path.parent().unwrap_or(&namespace_path).join(rel_path)
        } else {
            namespace_path.join(rel_path)
        };

        let candidates = [
            resource_path.clone(),
            resource_path.with_extension("yaml"),
            resource_path.with_extension("yml"),
            resource_path.with_extension("md"),
            resource_path.join("bundle.yaml"),
            resource_path.join("bundle.md"),
        ];

        candidates.into_iter().find(|candidate| candidate.exists()).map(|candidate| format!("file://{}", candidate.display()))
    }

    /// Refresh `checked_at` for one registered bundle. This is a
    /// placeholder per §4.6: it never reports an available update today,
    /// leaving room for a future implementation to compare remote state.
    pub fn check_update(&self, name: &str) -> Option<UpdateInfo> {
        let mut state = self.state.lock().unwrap();
        state.get_mut(name)?.checked_at = Some(Utc::now());
        None
    }

    pub fn check_update_all(&self) -> Vec<UpdateInfo> {
        let names = self.list_registered();
        names.iter().filter_map(|name| self.check_update(name)).collect()
    }

    /// Reload a registered bundle from its source, bypassing nothing today
    /// (cache bypass is reserved for a future implementation per the
    /// original's `refresh` parameter) but refreshing tracked timestamps.
    pub async fn update(&self, name: &str) -> Result<Bundle> {
        if self.state.lock().unwrap().get(name).is_none() {
            return Err(Error::not_found(format!("bundle '{name}' is not registered")));
        }

        let bundle = self.load_single(name, false, true).await?;

        if let Some(state) = self.state.lock().unwrap().get_mut(name) {
            state.version = Some(bundle.version.clone());
            state.loaded_at = Some(Utc::now());
            state.checked_at = Some(Utc::now());
        }

        Ok(bundle)
    }

    pub async fn update_all(&self) -> IndexMap<String, Bundle> {
        let names = self.list_registered();
        let mut results = IndexMap::new();
        for name in names {
            match self.update(&name).await {
                Ok(bundle) => {
                    results.insert(name, bundle);
                }
                Err(error) => {
                    tracing::warn!(bundle = %name, error = %error, "failed to update bundle");
                }
            }
        }
        results
    }

    /// Serialize tracked state as `{version: 1, bundles: {...}}` to
    /// `<home>/registry.json`, creating `home` if necessary.
    pub fn save(&self) -> Result<()> {
        config::ensure_dir(&self.home)?;
        let persisted = PersistedRegistry {
            version: PERSISTED_SCHEMA_VERSION,
            bundles: self.state.lock().unwrap().clone(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(config::registry_path(&self.home), json)?;
        Ok(())
    }
}

fn load_persisted_state(home: &Path) -> IndexMap<String, BundleState> {
    let path = config::registry_path(home);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return IndexMap::new();
    };
    match serde_json::from_str::<PersistedRegistry>(&raw) {
        Ok(persisted) => persisted.bundles,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "failed to load persisted registry state");
            IndexMap::new()
        }
    }
}

/// Walk up from `start` to (inclusive) `stop` looking for `bundle.md` then
/// `bundle.yaml` at each level, enabling a nested bundle to discover the
/// root bundle above it (§4.6 step 5).
fn find_nearest_bundle_file(start: &Path, stop: &Path) -> Option<PathBuf> {
    let stop = dunce::simplified(stop).to_path_buf();
    let mut current = dunce::simplified(start).to_path_buf();

    loop {
        if current != stop && !current.starts_with(&stop) {
            return None;
        }

        let markdown = current.join("bundle.md");
        if markdown.is_file() {
            return Some(markdown);
        }
        let yaml = current.join("bundle.yaml");
        if yaml.is_file() {
            return Some(yaml);
        }

        if current == stop {
            return None;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

#[cfg(test)]
#[path = "./registry_test.rs"]
mod registry_test;
