// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use super::{apply_subpath, content_cache_key, ResolvedSource, SourceHandler};
use crate::error::Result;
use crate::uri::ParsedUri;

/// Handler for plain `http(s)://` URIs: downloads the resource once into a
/// content-keyed cache file and returns it as both `active_path` and
/// `source_root` (or the subpath joined onto it, if given).
pub struct HttpSourceHandler {
    client: reqwest::Client,
}

impl HttpSourceHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpSourceHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceHandler for HttpSourceHandler {
    fn can_handle(&self, parsed: &ParsedUri) -> bool {
        parsed.is_http()
    }

    #[instrument(skip(self), fields(host = %parsed.host))]
    async fn resolve(&self, parsed: &ParsedUri, cache_dir: &Path) -> Result<ResolvedSource> {
        let url = format!("{}://{}{}", parsed.scheme, parsed.host, parsed.path);
        let cache_key = content_cache_key(&url);
        let filename = parsed
            .path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download");
        let source_root = cache_dir.join(format!("http-{cache_key}"));
        let downloaded = source_root.join(filename);

        if !downloaded.exists() {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            tokio::fs::create_dir_all(&source_root).await?;
            tokio::fs::write(&downloaded, &bytes).await?;
        }

        let active_path = apply_subpath(downloaded, &parsed.subpath);

        Ok(ResolvedSource {
            active_path,
            source_root,
        })
    }
}
