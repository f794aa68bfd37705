// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Resolution of the crate's one piece of ambient configuration: where its
//! home directory lives on disk.
//!
//! Mirrors the resolution order used throughout the corpus this crate is
//! modeled on (explicit argument, then an env var, then a dotdir under the
//! user's home): constructor argument, then `AMPLIFIER_HOME`, then
//! `~/.amplifier`.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const HOME_ENV_VAR: &str = "AMPLIFIER_HOME";
const DEFAULT_HOME_DIRNAME: &str = ".amplifier";
const CACHE_DIRNAME: &str = "cache";
const REGISTRY_FILENAME: &str = "registry.json";

/// Resolve the crate's home directory.
///
/// Resolution order: `explicit`, then the `AMPLIFIER_HOME` environment
/// variable, then `~/.amplifier`.
pub fn resolve_home(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(dunce::simplified(&path).to_path_buf());
    }
    if let Ok(value) = std::env::var(HOME_ENV_VAR) {
        if !value.is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_HOME_DIRNAME))
        .ok_or_else(|| {
            Error::other("could not determine a home directory for this platform")
        })
}

/// The cache directory under a resolved home, created lazily by callers.
pub fn cache_dir(home: &Path) -> PathBuf {
    home.join(CACHE_DIRNAME)
}

/// The path to the persisted registry state under a resolved home.
pub fn registry_path(home: &Path) -> PathBuf {
    home.join(REGISTRY_FILENAME)
}

/// Create a directory (and its parents) if it doesn't already exist.
/// Idempotent: a pre-existing directory is not an error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
