// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Source handlers and the resolver chain (C2/C3): turning a parsed URI
//! into a local, on-disk path.

mod file;
mod git;
mod http;
mod resolver;
mod zip;

pub use file::FileSourceHandler;
pub use git::GitSourceHandler;
pub use http::HttpSourceHandler;
pub use resolver::SourceResolver;
pub use zip::ZipSourceHandler;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::uri::ParsedUri;

/// Where a resolved source lives on disk. `source_root` is the full
/// clone/extract/local root; `active_path` is what the caller actually
/// asked for, which may be `source_root` joined with a subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub active_path: PathBuf,
    pub source_root: PathBuf,
}

/// A single source type's ability to recognize and fetch a URI.
#[async_trait]
pub trait SourceHandler: Send + Sync {
    fn can_handle(&self, parsed: &ParsedUri) -> bool;

    async fn resolve(&self, parsed: &ParsedUri, cache_dir: &std::path::Path) -> Result<ResolvedSource>;
}

pub(crate) fn apply_subpath(root: PathBuf, subpath: &str) -> PathBuf {
    if subpath.is_empty() {
        root
    } else {
        root.join(subpath)
    }
}

pub(crate) fn content_cache_key(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..16].to_string()
}
