// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Crate-wide error taxonomy.
//!
//! Each module boundary (URI parsing, source resolution, mention loading,
//! bundle composition, the registry, validation) defines its own error type;
//! this module unifies them behind a single [`Error`]/[`Result`] pair so
//! callers at the edge of the crate only need to match on one enum.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::uri::UriError;

pub type Result<T> = std::result::Result<T, Error>;

/// Aggregated validation errors, produced only by `validate_or_raise`.
///
/// Plain `validate` returns a `ValidationResult` instead of this error;
/// see [`crate::validator`].
#[derive(Debug, Error, Diagnostic)]
#[error("bundle validation failed: {}", .errors.join("; "))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// A URI could not be resolved by any source handler, a cloned
    /// subpath was missing, or a referenced path did not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path existed but was not a recognizable bundle (no
    /// `bundle.md`/`bundle.yaml`, or an unrecognized file extension).
    #[error("failed to load bundle at {path}: {reason}")]
    LoadError { path: PathBuf, reason: String },

    /// The same URI was re-entered while already being loaded.
    #[error("circular dependency detected while loading {0}")]
    DependencyCycle(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Uri(#[from] UriError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Error::NotFound(message.into())
    }

    pub fn load<S: Into<String>>(path: PathBuf, reason: S) -> Self {
        Error::LoadError {
            path,
            reason: reason.into(),
        }
    }

    pub fn other<S: Into<String>>(message: S) -> Self {
        Error::Other(message.into())
    }
}
