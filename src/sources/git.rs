// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use super::{apply_subpath, content_cache_key, ResolvedSource, SourceHandler};
use crate::error::{Error, Result};
use crate::uri::ParsedUri;

/// Handler for `git+<scheme>://...` URIs. Clones into a content-addressed
/// cache directory keyed by `sha256(git_url + "@" + ref)`, shallow
/// (`depth 1`), checking out `ref` as a branch when one is given.
pub struct GitSourceHandler;

#[async_trait]
impl SourceHandler for GitSourceHandler {
    fn can_handle(&self, parsed: &ParsedUri) -> bool {
        parsed.is_git()
    }

    #[instrument(skip(self), fields(path = %parsed.path))]
    async fn resolve(&self, parsed: &ParsedUri, cache_dir: &Path) -> Result<ResolvedSource> {
        let scheme = parsed.scheme.trim_start_matches("git+");
        let git_url = format!("{scheme}://{}{}", parsed.host, parsed.path);
        let git_ref = if parsed.git_ref.is_empty() {
            "HEAD".to_string()
        } else {
            parsed.git_ref.clone()
        };
        let cache_key = content_cache_key(&format!("{git_url}@{git_ref}"));
        let repo_name = parsed
            .path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("repo");
        let source_root = cache_dir.join(format!("{repo_name}-{cache_key}"));

        if source_root.exists() {
            let active_path = apply_subpath(source_root.clone(), &parsed.subpath);
            if active_path.exists() {
                return Ok(ResolvedSource {
                    active_path,
                    source_root,
                });
            }
        }

        std::fs::create_dir_all(cache_dir)?;
        if source_root.exists() {
            std::fs::remove_dir_all(&source_root)?;
        }

        let url = git_url.clone();
        let target = source_root.clone();
        let git_ref_for_clone = (!parsed.git_ref.is_empty()).then(|| parsed.git_ref.clone());
        tokio::task::spawn_blocking(move || clone_shallow(&url, git_ref_for_clone.as_deref(), &target))
            .await
            .map_err(|e| Error::other(format!("git clone task panicked: {e}")))??;

        let active_path = apply_subpath(source_root.clone(), &parsed.subpath);
        if !active_path.exists() {
            return Err(Error::not_found(format!(
                "subpath not found after clone: {}",
                parsed.subpath
            )));
        }

        Ok(ResolvedSource {
            active_path,
            source_root,
        })
    }
}

fn clone_shallow(url: &str, git_ref: Option<&str>, target: &Path) -> Result<()> {
    let mut fetch_options = git2::FetchOptions::new();
    fetch_options.depth(1);

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_options);
    if let Some(reference) = git_ref {
        builder.branch(reference);
    }

    builder
        .clone(url, target)
        .map_err(|e| Error::other(format!("failed to clone {url}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod git_test {
    use super::*;

    #[test]
    fn cache_key_is_stable_sixteen_hex_chars() {
        let key = content_cache_key("https://github.com/org/repo@main");
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, content_cache_key("https://github.com/org/repo@main"));
    }

    #[test]
    fn can_handle_only_git_uris() {
        let handler = GitSourceHandler;
        let git = crate::uri::parse_uri("git+https://github.com/org/repo").unwrap();
        let file = crate::uri::parse_uri("/abs/path").unwrap();
        assert!(handler.can_handle(&git));
        assert!(!handler.can_handle(&file));
    }
}
