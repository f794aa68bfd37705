// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Pluggable fallback used by the registry to turn a bare name into a URI
//! when no explicit registration exists (grounded on
//! `original_source/amplifier_foundation/discovery/{protocol,simple}.py`,
//! supplemented per SPEC_FULL §9 item 5 with the search-directory
//! convention the registry's own `<dir>/<name>/bundle.{md,yaml}` layout
//! implies).

use std::path::PathBuf;

/// Turns a bare bundle name into a URI. The registry consults this only
/// after registration and bare-URI treatment have both failed; it never
/// overrides either.
pub trait Discovery: Send + Sync {
    fn find(&self, name: &str) -> Option<String>;
}

/// Searches a fixed list of directories, in order, for
/// `<dir>/<name>/bundle.md` then `<dir>/<name>/bundle.yaml`, returning a
/// `file://` URI for the first hit.
#[derive(Debug, Default, Clone)]
pub struct SimpleDiscovery {
    search_dirs: Vec<PathBuf>,
}

impl SimpleDiscovery {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn add_search_dir(&mut self, dir: PathBuf) {
        self.search_dirs.push(dir);
    }
}

impl Discovery for SimpleDiscovery {
    fn find(&self, name: &str) -> Option<String> {
        for dir in &self.search_dirs {
            let bundle_dir = dir.join(name);
            for candidate in ["bundle.md", "bundle.yaml"] {
                let path = bundle_dir.join(candidate);
                if path.is_file() {
                    return Some(format!("file://{}", bundle_dir.display()));
                }
            }
        }
        None
    }
}
