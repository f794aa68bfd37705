// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Read a bundle file off disk and construct a [`Bundle`] from it (C6).
//!
//! A bundle on disk is either a directory containing `bundle.md` or
//! `bundle.yaml` (tried in that order), or a path naming one of those
//! files directly.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bundle::{from_dict, Bundle};
use crate::error::{Error, Result};
use crate::value::{Mapping, Value};

const MARKDOWN_BUNDLE_FILENAME: &str = "bundle.md";
const YAML_BUNDLE_FILENAME: &str = "bundle.yaml";

static FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---\r?\n?(.*)\z").unwrap());

/// Resolve a bundle source path to the concrete bundle file that should be
/// read: if `path` already names a file, it's returned as-is; if it's a
/// directory, `bundle.md` is preferred over `bundle.yaml`.
pub fn locate_bundle_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.is_dir() {
        let markdown = path.join(MARKDOWN_BUNDLE_FILENAME);
        if markdown.is_file() {
            return Ok(markdown);
        }
        let yaml = path.join(YAML_BUNDLE_FILENAME);
        if yaml.is_file() {
            return Ok(yaml);
        }
        return Err(Error::load(
            path.to_path_buf(),
            "directory contains neither bundle.md nor bundle.yaml",
        ));
    }
    Err(Error::not_found(path.display().to_string()))
}

/// Load a [`Bundle`] from `path`, dispatching on whether it resolves to a
/// markdown-with-frontmatter or a plain YAML file. `base_path` is attached
/// to the resulting bundle as the directory the bundle file lives in (the
/// bundle file's own directory, whether `path` named a directory or a file
/// directly).
pub async fn load_bundle_from_path(path: &Path) -> Result<Bundle> {
    let bundle_file = locate_bundle_file(path)?;
    let base_path = bundle_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let raw = tokio::fs::read_to_string(&bundle_file)
        .await
        .map_err(|e| Error::load(bundle_file.clone(), e.to_string()))?;

    let is_markdown = bundle_file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false);

    let mut bundle = if is_markdown {
        load_markdown_bundle(&raw, Some(&base_path))?
    } else {
        load_yaml_bundle(&raw, Some(&base_path))?
    };
    bundle.source_uri = Some(bundle_file.display().to_string());
    Ok(bundle)
}

/// Split `---\n<yaml>\n---\n<body>` frontmatter from a markdown bundle
/// file, parse the YAML half, and attach the trimmed body as `instruction`
/// when non-empty.
fn load_markdown_bundle(raw: &str, base_path: Option<&Path>) -> Result<Bundle> {
    let Some(captures) = FRONTMATTER.captures(raw) else {
        return Err(Error::load(
            base_path.map(Path::to_path_buf).unwrap_or_default(),
            "markdown bundle is missing a YAML frontmatter block",
        ));
    };

    let yaml_source = &captures[1];
    let body = captures[2].trim();

    let data = parse_yaml_mapping(yaml_source)?;
    let mut bundle = from_dict(&data, base_path)?;
    if !body.is_empty() {
        bundle.instruction = Some(body.to_string());
    }
    Ok(bundle)
}

/// Parse a plain `bundle.yaml` file; an empty file is treated as an empty
/// mapping rather than a parse error.
fn load_yaml_bundle(raw: &str, base_path: Option<&Path>) -> Result<Bundle> {
    let data = parse_yaml_mapping(raw)?;
    from_dict(&data, base_path)
}

fn parse_yaml_mapping(source: &str) -> Result<Mapping> {
    if source.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let parsed: serde_yaml::Value = serde_yaml::from_str(source)?;
    match Value::from_yaml(parsed) {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(Error::other("bundle file must parse to a YAML mapping")),
    }
}

#[cfg(test)]
mod loader_test {
    use super::*;

    #[tokio::test]
    async fn loads_markdown_bundle_with_frontmatter_and_instruction_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bundle.md"),
            "---\nbundle:\n  name: demo\n  version: \"2.0.0\"\n---\nBe helpful.\n",
        )
        .unwrap();

        let bundle = load_bundle_from_path(dir.path()).await.unwrap();
        assert_eq!(bundle.name, "demo");
        assert_eq!(bundle.version, "2.0.0");
        assert_eq!(bundle.instruction.as_deref(), Some("Be helpful."));
        assert_eq!(bundle.base_path.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn prefers_markdown_bundle_over_yaml_when_both_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bundle.md"), "---\nbundle:\n  name: md\n---\n").unwrap();
        std::fs::write(dir.path().join("bundle.yaml"), "bundle:\n  name: yaml\n").unwrap();

        let bundle = load_bundle_from_path(dir.path()).await.unwrap();
        assert_eq!(bundle.name, "md");
    }

    #[tokio::test]
    async fn loads_plain_yaml_bundle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bundle.yaml"), "bundle:\n  name: demo\n").unwrap();

        let bundle = load_bundle_from_path(dir.path()).await.unwrap();
        assert_eq!(bundle.name, "demo");
        assert!(bundle.instruction.is_none());
    }

    #[tokio::test]
    async fn empty_yaml_bundle_is_an_empty_mapping_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bundle.yaml"), "").unwrap();

        let bundle = load_bundle_from_path(dir.path()).await.unwrap();
        assert_eq!(bundle.name, "");
    }

    #[tokio::test]
    async fn directory_without_a_bundle_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_bundle_from_path(dir.path()).await;
        assert!(result.is_err());
    }
}
