// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! URI parsing (C1).
//!
//! Recognizes the bundle-source URI grammar: `git+<scheme>://…`,
//! `zip+<scheme>://…`, `file://…`, absolute/relative local paths,
//! `http(s)://…`, and bare package-ish names, each with an optional
//! `#subdirectory=` fragment that takes precedence over any legacy
//! `@ref/subpath` form.

use miette::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UriError {
    #[error("could not parse URI: {0}")]
    Malformed(String),
}

/// A parsed source URI. See `spec.md` §3/§6 for the grammar this models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    /// e.g. `git+https`, `zip+ssh`, `file`, `http`, `https`, or `""` for a
    /// bare package name / local path with no scheme.
    pub scheme: String,
    pub host: String,
    pub path: String,
    /// The `@ref` portion of a git/zip URI; empty if not specified.
    pub git_ref: String,
    /// The `#subdirectory=` fragment, or a legacy `@ref/sub` tail when no
    /// fragment subdirectory is present.
    pub subpath: String,
}

impl ParsedUri {
    pub fn is_git(&self) -> bool {
        self.scheme == "git" || self.scheme.starts_with("git+")
    }

    pub fn is_zip(&self) -> bool {
        self.scheme == "zip" || self.scheme.starts_with("zip+")
    }

    pub fn is_file(&self) -> bool {
        self.scheme == "file" || (self.scheme.is_empty() && self.path.contains('/'))
    }

    pub fn is_http(&self) -> bool {
        self.scheme == "http" || self.scheme == "https"
    }

    pub fn is_package(&self) -> bool {
        self.scheme.is_empty() && !self.path.contains('/')
    }
}

static SCHEME_HOST_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<scheme>[a-zA-Z][a-zA-Z0-9+.\-]*)://(?P<host>[^/]*)(?P<path>/.*)?$").unwrap());

static REF_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^@]+)@([^/]+)(.*)$").unwrap());

/// Split a `#subdirectory=...` fragment, if present, off the end of a URI.
/// The fragment is split on `&`; the value of the first `subdirectory=` pair
/// wins. Returns `(remainder, Option<subdirectory>)`.
fn split_fragment(uri: &str) -> (&str, Option<String>) {
    let Some(idx) = uri.find('#') else {
        return (uri, None);
    };
    let (head, fragment) = uri.split_at(idx);
    let fragment = &fragment[1..];
    let subdir = fragment
        .split('&')
        .find_map(|pair| pair.strip_prefix("subdirectory=").map(|s| s.to_string()));
    (head, subdir)
}

fn parse_git_like(inner: &str, scheme_prefix: &str) -> Result<ParsedUri, UriError> {
    let caps = SCHEME_HOST_PATH
        .captures(inner)
        .ok_or_else(|| UriError::Malformed(inner.to_string()))?;
    let scheme = &caps["scheme"];
    let host = caps["host"].to_string();
    let mut path = caps.name("path").map(|m| m.as_str().to_string()).unwrap_or_default();

    let mut git_ref = String::new();
    let mut legacy_subpath = String::new();
    if let Some(ref_caps) = REF_SPLIT.captures(&path.clone()) {
        path = ref_caps[1].to_string();
        git_ref = ref_caps[2].to_string();
        legacy_subpath = ref_caps[3].trim_start_matches('/').to_string();
    }

    Ok(ParsedUri {
        scheme: format!("{scheme_prefix}{scheme}"),
        host,
        path,
        git_ref,
        subpath: legacy_subpath,
    })
}

/// Parse a source URI string into its structured components.
pub fn parse_uri(uri: &str) -> Result<ParsedUri, UriError> {
    let (without_fragment, fragment_subdir) = split_fragment(uri);

    let mut parsed = if let Some(inner) = without_fragment.strip_prefix("git+") {
        parse_git_like(inner, "git+")?
    } else if let Some(inner) = without_fragment.strip_prefix("zip+") {
        parse_git_like(inner, "zip+")?
    } else if let Some(path) = without_fragment.strip_prefix("file://") {
        ParsedUri {
            scheme: "file".to_string(),
            host: String::new(),
            path: path.to_string(),
            git_ref: String::new(),
            subpath: String::new(),
        }
    } else if without_fragment.starts_with('/') {
        ParsedUri {
            scheme: "file".to_string(),
            host: String::new(),
            path: without_fragment.to_string(),
            git_ref: String::new(),
            subpath: String::new(),
        }
    } else if without_fragment.starts_with("./") || without_fragment.starts_with("../") {
        ParsedUri {
            scheme: "file".to_string(),
            host: String::new(),
            path: without_fragment.to_string(),
            git_ref: String::new(),
            subpath: String::new(),
        }
    } else if without_fragment.starts_with("http://") || without_fragment.starts_with("https://") {
        let caps = SCHEME_HOST_PATH
            .captures(without_fragment)
            .ok_or_else(|| UriError::Malformed(without_fragment.to_string()))?;
        ParsedUri {
            scheme: caps["scheme"].to_string(),
            host: caps["host"].to_string(),
            path: caps.name("path").map(|m| m.as_str().to_string()).unwrap_or_default(),
            git_ref: String::new(),
            subpath: String::new(),
        }
    } else if let Some((name, rest)) = without_fragment.split_once('/') {
        ParsedUri {
            scheme: String::new(),
            host: String::new(),
            path: name.to_string(),
            git_ref: String::new(),
            subpath: rest.to_string(),
        }
    } else {
        ParsedUri {
            scheme: String::new(),
            host: String::new(),
            path: without_fragment.to_string(),
            git_ref: String::new(),
            subpath: String::new(),
        }
    };

    // Fragment subdirectory always overrides any legacy subpath.
    if let Some(subdir) = fragment_subdir {
        parsed.subpath = subdir;
    }

    Ok(parsed)
}

#[cfg(test)]
#[path = "./uri_test.rs"]
mod uri_test;
