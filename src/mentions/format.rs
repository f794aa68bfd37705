// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use std::collections::HashMap;
use std::path::Path;

use super::deduplicator::ContentDeduplicator;

/// Render every unique file a deduplicator has collected as one XML-ish
/// context block, attributing each file to the mention that pulled it in
/// when one is known, falling back to the file's path otherwise.
///
/// Returns an empty string when nothing was loaded, so callers can skip
/// prepending a separator.
pub fn format_context_block(
    deduplicator: &ContentDeduplicator,
    mention_by_path: &HashMap<&Path, &str>,
) -> String {
    let files = deduplicator.unique_files();
    if files.is_empty() {
        return String::new();
    }

    let mut blocks = Vec::with_capacity(files.len());
    for file in files {
        let attribution = mention_by_path
            .get(file.path.as_path())
            .copied()
            .unwrap_or_else(|| file.path.to_str().unwrap_or_default());
        blocks.push(format!(
            "<file source=\"{attribution}\">\n{}\n</file>",
            file.content
        ));
    }

    format!("<context>\n{}\n</context>", blocks.join("\n"))
}

#[cfg(test)]
mod format_test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_deduplicator_produces_empty_block() {
        let dedup = ContentDeduplicator::new();
        assert_eq!(format_context_block(&dedup, &HashMap::new()), "");
    }

    #[test]
    fn attributes_to_mention_when_known_else_path() {
        let mut dedup = ContentDeduplicator::new();
        dedup.add_file(&PathBuf::from("/a/notes.md"), "notes body");
        dedup.add_file(&PathBuf::from("/a/extra.md"), "extra body");

        let path_a = PathBuf::from("/a/notes.md");
        let mut by_path = HashMap::new();
        by_path.insert(path_a.as_path(), "@notes.md");

        let block = format_context_block(&dedup, &by_path);
        assert!(block.starts_with("<context>\n"));
        assert!(block.contains("<file source=\"@notes.md\">\nnotes body\n</file>"));
        assert!(block.contains("<file source=\"/a/extra.md\">\nextra body\n</file>"));
    }
}
