// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Module activation mechanism: downloading/caching a module's declared
//! `source` and handing back a local path. Policy — which modules to
//! load, and from where — belongs to the host; this only provides the
//! "how" (grounded on `original_source/amplifier_foundation/modules/activator.py`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::Result;
use crate::session::ModuleSourceResolver;
use crate::sources::SourceResolver;
use crate::value::{Mapping, Value};

/// Recognizes and runs a host package manager against an activated
/// module's directory. Invoked only when the directory carries a
/// packaging manifest the implementor recognizes; the default
/// [`NoopPackageInstaller`] never recognizes anything, matching "absent
/// that, it's a no-op" (§4.7 step 2).
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, module_path: &Path) -> Result<()>;
}

/// The default installer: every module activation is a no-op beyond the
/// download itself.
pub struct NoopPackageInstaller;

#[async_trait]
impl PackageInstaller for NoopPackageInstaller {
    async fn install(&self, _module_path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Downloads a module's source and (optionally) installs its packaging
/// dependencies, memoizing by `module_name:source_uri` so re-activating
/// the same module within a process is a cache hit.
pub struct ModuleActivator {
    resolver: SourceResolver,
    installer: Box<dyn PackageInstaller>,
    install_deps: bool,
    activated: Mutex<HashSet<String>>,
    bundle_package_paths: Mutex<Vec<PathBuf>>,
}

impl ModuleActivator {
    pub fn new(resolver: SourceResolver, install_deps: bool) -> Self {
        Self {
            resolver,
            installer: Box::new(NoopPackageInstaller),
            install_deps,
            activated: Mutex::new(HashSet::new()),
            bundle_package_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn with_installer(mut self, installer: Box<dyn PackageInstaller>) -> Self {
        self.installer = installer;
        self
    }

    /// Install a bundle's own package (its `base_path`, or an included
    /// bundle's `source_base_paths` entry) before any of its modules are
    /// activated, since a module may import from its parent bundle's
    /// package (§4.7 step 2). Recorded unconditionally (deduplicated) so
    /// child sessions can inherit the directory list regardless of
    /// whether a packaging manifest was actually found.
    pub async fn activate_bundle_package(&self, path: &Path) -> Result<()> {
        {
            let mut paths = self.bundle_package_paths.lock().unwrap();
            let path_buf = path.to_path_buf();
            if !paths.contains(&path_buf) {
                paths.push(path_buf);
            }
        }
        if self.install_deps {
            self.installer.install(path).await?;
        }
        Ok(())
    }

    /// Every bundle directory passed through [`Self::activate_bundle_package`]
    /// so far, in first-seen order.
    pub fn bundle_package_paths(&self) -> Vec<PathBuf> {
        self.bundle_package_paths.lock().unwrap().clone()
    }

    /// Download (if not already cached this session) and optionally
    /// install dependencies for a single module, returning its local path.
    pub async fn activate(&self, module_name: &str, source_uri: &str) -> Result<PathBuf> {
        let cache_key = format!("{module_name}:{source_uri}");
        let already_activated = self.activated.lock().unwrap().contains(&cache_key);

        let resolved = self.resolver.resolve(source_uri).await?;
        let module_path = resolved.active_path;

        if !already_activated {
            if self.install_deps {
                self.installer.install(&module_path).await?;
            }
            self.activated.lock().unwrap().insert(cache_key);
        }

        Ok(module_path)
    }

    /// Activate every module spec carrying both a `module` name and a
    /// `source`, skipping specs missing either (§4.7 step 3).
    pub async fn activate_all(&self, modules: &[Mapping]) -> Result<IndexMap<String, PathBuf>> {
        let mut results = IndexMap::new();
        for spec in modules {
            let (Some(module_name), Some(source_uri)) = (
                spec.get("module").and_then(Value::as_str),
                spec.get("source").and_then(Value::as_str),
            ) else {
                continue;
            };
            let path = self.activate(module_name, source_uri).await?;
            results.insert(module_name.to_string(), path);
        }
        Ok(results)
    }
}

/// Adapts an already-computed `moduleId -> Path` map into the
/// [`ModuleSourceResolver`] capability a session mounts under
/// `module-source-resolver` (§4.7 step 6, §6).
pub struct BundleModuleResolver {
    paths: IndexMap<String, PathBuf>,
}

impl BundleModuleResolver {
    pub fn new(paths: IndexMap<String, PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl ModuleSourceResolver for BundleModuleResolver {
    async fn resolve(&self, module_id: &str, _source: Option<&str>) -> Result<PathBuf> {
        self.paths
            .get(module_id)
            .cloned()
            .ok_or_else(|| crate::error::Error::not_found(format!("module not activated: {module_id}")))
    }
}

#[cfg(test)]
mod modules_test {
    use super::*;

    #[tokio::test]
    async fn activate_all_skips_specs_missing_module_or_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bundle.yaml"), "").unwrap();
        let resolver = SourceResolver::new(dir.path().join("cache"), dir.path().to_path_buf());
        let activator = ModuleActivator::new(resolver, false);

        let mut complete = Mapping::new();
        complete.insert("module".to_string(), Value::String("m".into()));
        complete.insert("source".to_string(), Value::String("./".into()));

        let incomplete = Mapping::new();

        let results = activator.activate_all(&[complete, incomplete]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("m"));
    }

    #[tokio::test]
    async fn bundle_module_resolver_reports_not_found_for_unactivated_modules() {
        let resolver = BundleModuleResolver::new(IndexMap::new());
        let result = resolver.resolve("missing", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn activate_bundle_package_records_path_once_even_with_no_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = SourceResolver::new(dir.path().join("cache"), dir.path().to_path_buf());
        let activator = ModuleActivator::new(resolver, true);

        activator.activate_bundle_package(dir.path()).await.unwrap();
        activator.activate_bundle_package(dir.path()).await.unwrap();

        assert_eq!(activator.bundle_package_paths(), vec![dir.path().to_path_buf()]);
    }
}
