// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::path::{Path, PathBuf};

/// Construct the path to a named agent definition under `<base>/agents/`,
/// appending `.md` unless the caller already supplied that extension.
pub fn construct_agent_path(base: &Path, name: &str) -> PathBuf {
    if name.ends_with(".md") {
        base.join("agents").join(name)
    } else {
        base.join("agents").join(format!("{name}.md"))
    }
}

/// Construct the path to a named context file under `<base>/context/`,
/// appending `.md` unless the caller already supplied that extension.
pub fn construct_context_path(base: &Path, name: &str) -> PathBuf {
    if name.ends_with(".md") {
        base.join("context").join(name)
    } else {
        base.join("context").join(format!("{name}.md"))
    }
}

#[cfg(test)]
mod paths_test {
    use super::*;

    #[test]
    fn context_path_appends_md_extension() {
        let base = Path::new("/bundle");
        assert_eq!(
            construct_context_path(base, "notes"),
            PathBuf::from("/bundle/context/notes.md")
        );
    }

    #[test]
    fn context_path_preserves_existing_md_extension() {
        let base = Path::new("/bundle");
        assert_eq!(
            construct_context_path(base, "notes.md"),
            PathBuf::from("/bundle/context/notes.md")
        );
    }

    #[test]
    fn agent_path_mirrors_context_path_under_agents_dir() {
        let base = Path::new("/bundle");
        assert_eq!(
            construct_agent_path(base, "bug-hunter"),
            PathBuf::from("/bundle/agents/bug-hunter.md")
        );
    }
}
