// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::models::ContextFile;

/// Tracks `@mention`-loaded file content by SHA-256 hash so the same
/// content reached through different mentions is only included once.
#[derive(Debug, Default)]
pub struct ContentDeduplicator {
    seen_hashes: HashSet<String>,
    files: Vec<ContextFile>,
}

impl ContentDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file if its content hasn't been seen before. Returns `true`
    /// if it was newly added.
    pub fn add_file(&mut self, path: &Path, content: &str) -> bool {
        let content_hash = hash_content(content);
        if self.seen_hashes.contains(&content_hash) {
            return false;
        }
        self.seen_hashes.insert(content_hash.clone());
        self.files.push(ContextFile {
            path: path.to_path_buf(),
            content: content.to_string(),
            content_hash,
        });
        true
    }

    /// The unique files added so far, in discovery order.
    pub fn unique_files(&self) -> &[ContextFile] {
        &self.files
    }

    pub fn is_seen(&self, content: &str) -> bool {
        self.seen_hashes.contains(&hash_content(content))
    }
}

pub fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod deduplicator_test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn first_add_of_content_succeeds_second_is_duplicate() {
        let mut dedup = ContentDeduplicator::new();
        assert!(dedup.add_file(&PathBuf::from("a.md"), "same content"));
        assert!(!dedup.add_file(&PathBuf::from("b.md"), "same content"));
        assert_eq!(dedup.unique_files().len(), 1);
    }

    #[test]
    fn unique_files_preserve_discovery_order() {
        let mut dedup = ContentDeduplicator::new();
        dedup.add_file(&PathBuf::from("a.md"), "first");
        dedup.add_file(&PathBuf::from("b.md"), "second");
        let paths: Vec<_> = dedup.unique_files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.md"), PathBuf::from("b.md")]);
    }
}
