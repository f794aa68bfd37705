// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{apply_subpath, ResolvedSource, SourceHandler};
use crate::error::{Error, Result};
use crate::uri::ParsedUri;

/// Handler for `file://` URIs, absolute paths, and relative `./`/`../` paths.
pub struct FileSourceHandler {
    base_path: PathBuf,
}

impl FileSourceHandler {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }
}

#[async_trait]
impl SourceHandler for FileSourceHandler {
    fn can_handle(&self, parsed: &ParsedUri) -> bool {
        parsed.is_file()
    }

    async fn resolve(&self, parsed: &ParsedUri, _cache_dir: &Path) -> Result<ResolvedSource> {
        let source_root = if parsed.path.starts_with("./") || parsed.path.starts_with("../") {
            self.base_path.join(&parsed.path)
        } else {
            PathBuf::from(&parsed.path)
        };
        let source_root = dunce::simplified(&source_root).to_path_buf();
        let active_path = apply_subpath(source_root.clone(), &parsed.subpath);

        if !active_path.exists() {
            return Err(Error::not_found(format!(
                "file not found: {}",
                active_path.display()
            )));
        }

        Ok(ResolvedSource {
            active_path,
            source_root,
        })
    }
}

#[cfg(test)]
mod file_test {
    use super::*;

    #[tokio::test]
    async fn resolves_relative_path_against_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bundle.yaml"), "").unwrap();

        let handler = FileSourceHandler::new(dir.path().to_path_buf());
        let parsed = crate::uri::parse_uri("./").unwrap();
        let resolved = handler.resolve(&parsed, dir.path()).await.unwrap();
        assert_eq!(resolved.active_path, resolved.source_root);
        assert!(resolved.active_path.join("bundle.yaml").exists());
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileSourceHandler::new(dir.path().to_path_buf());
        let parsed = crate::uri::parse_uri("./does-not-exist").unwrap();
        let result = handler.resolve(&parsed, dir.path()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn applies_subpath_from_fragment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();

        let handler = FileSourceHandler::new(dir.path().to_path_buf());
        let uri = format!("file://{}#subdirectory=sub", dir.path().display());
        let parsed = crate::uri::parse_uri(&uri).unwrap();
        let resolved = handler.resolve(&parsed, dir.path()).await.unwrap();
        assert_eq!(resolved.active_path, resolved.source_root.join("sub"));
    }
}
