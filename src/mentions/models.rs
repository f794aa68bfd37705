// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::PathBuf;

/// A single file pulled in through an `@mention`, keyed by the SHA-256 hex
/// digest of its content for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    pub path: PathBuf,
    pub content: String,
    pub content_hash: String,
}

/// The outcome of resolving one top-level `@mention`. Mentions are
/// opportunistic: an unresolved or unreadable mention is never an error,
/// it just carries `None` in the relevant fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionResult {
    pub mention: String,
    pub resolved_path: Option<PathBuf>,
    pub content: Option<String>,
    /// Always `None` today: resolution and load failures are swallowed
    /// opportunistically rather than surfaced here. Kept as a field so a
    /// future resolver can report a reason without changing the shape.
    pub error: Option<String>,
}

impl MentionResult {
    pub fn found(&self) -> bool {
        self.resolved_path.is_some() && self.content.is_some()
    }
}
