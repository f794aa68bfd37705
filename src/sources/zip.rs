// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use super::{apply_subpath, content_cache_key, ResolvedSource, SourceHandler};
use crate::error::{Error, Result};
use crate::uri::ParsedUri;

/// Handler for `zip+<scheme>://...` URIs: fetches (or reads, for
/// `zip+file://`) an archive and extracts it into a content-keyed cache
/// directory, analogous to [`super::GitSourceHandler`].
pub struct ZipSourceHandler {
    client: reqwest::Client,
}

impl ZipSourceHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ZipSourceHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceHandler for ZipSourceHandler {
    fn can_handle(&self, parsed: &ParsedUri) -> bool {
        parsed.is_zip()
    }

    #[instrument(skip(self), fields(path = %parsed.path))]
    async fn resolve(&self, parsed: &ParsedUri, cache_dir: &Path) -> Result<ResolvedSource> {
        let scheme = parsed.scheme.trim_start_matches("zip+");
        let archive_url = format!("{scheme}://{}{}", parsed.host, parsed.path);
        let cache_key = content_cache_key(&archive_url);
        let archive_name = parsed
            .path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("archive")
            .trim_end_matches(".zip");
        let source_root = cache_dir.join(format!("{archive_name}-{cache_key}"));

        if !source_root.exists() {
            std::fs::create_dir_all(cache_dir)?;
            let bytes = self.fetch_archive(scheme, &archive_url).await?;
            extract_zip(&bytes, &source_root)?;
        }

        let active_path = apply_subpath(source_root.clone(), &parsed.subpath);
        if !active_path.exists() {
            return Err(Error::not_found(format!(
                "subpath not found after extraction: {}",
                parsed.subpath
            )));
        }

        Ok(ResolvedSource {
            active_path,
            source_root,
        })
    }
}

impl ZipSourceHandler {
    async fn fetch_archive(&self, scheme: &str, url: &str) -> Result<bytes::Bytes> {
        if scheme == "file" {
            let path = url.trim_start_matches("file://");
            let contents = tokio::fs::read(path).await?;
            return Ok(bytes::Bytes::from(contents));
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

fn extract_zip(bytes: &[u8], destination: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    std::fs::create_dir_all(destination)?;
    archive.extract(destination)?;
    Ok(())
}
