// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use super::deduplicator::ContentDeduplicator;
use super::models::MentionResult;
use super::parser::parse_mentions;
use super::resolver::MentionResolver;
use crate::io_retry::read_with_retry;

const DEFAULT_MAX_DEPTH: usize = 10;

/// Recursively load every `@mention` reachable from `text`, deduplicating
/// by content hash. Resolution and read failures are swallowed: a
/// [`MentionResult`] with `content: None` records the miss without
/// aborting the rest of the walk.
pub async fn load_mentions(
    text: &str,
    resolver: &dyn MentionResolver,
    deduplicator: &mut ContentDeduplicator,
) -> Vec<MentionResult> {
    let mentions = parse_mentions(text);
    let mut results = Vec::with_capacity(mentions.len());
    for mention in mentions {
        let result = resolve_mention(&mention, resolver, deduplicator, DEFAULT_MAX_DEPTH, 0).await;
        results.push(result);
    }
    results
}

async fn resolve_mention(
    mention: &str,
    resolver: &dyn MentionResolver,
    deduplicator: &mut ContentDeduplicator,
    max_depth: usize,
    current_depth: usize,
) -> MentionResult {
    let Some(path) = resolver.resolve(mention) else {
        return MentionResult {
            mention: mention.to_string(),
            resolved_path: None,
            content: None,
            error: None,
        };
    };

    let content = match read_with_retry(&path).await {
        Ok(content) => content,
        Err(_) => {
            return MentionResult {
                mention: mention.to_string(),
                resolved_path: Some(path),
                content: None,
                error: None,
            };
        }
    };

    if !deduplicator.add_file(&path, &content) {
        return MentionResult {
            mention: mention.to_string(),
            resolved_path: Some(path),
            content: None,
            error: None,
        };
    }

    if current_depth < max_depth {
        recurse_into(&content, resolver, deduplicator, max_depth, current_depth + 1).await;
    }

    MentionResult {
        mention: mention.to_string(),
        resolved_path: Some(path),
        content: Some(content),
        error: None,
    }
}

fn recurse_into<'a>(
    content: &'a str,
    resolver: &'a dyn MentionResolver,
    deduplicator: &'a mut ContentDeduplicator,
    max_depth: usize,
    current_depth: usize,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        for nested in parse_mentions(content) {
            resolve_mention(&nested, resolver, deduplicator, max_depth, current_depth).await;
        }
    })
}

#[cfg(test)]
mod loader_test {
    use super::*;
    use crate::mentions::resolver::BaseMentionResolver;

    #[tokio::test]
    async fn loads_a_direct_mention() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "hello world").unwrap();

        let resolver = BaseMentionResolver::new(dir.path().to_path_buf());
        let mut dedup = ContentDeduplicator::new();
        let results = load_mentions("see @notes.md", &resolver, &mut dedup).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].found());
        assert_eq!(results[0].content.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn recurses_into_nested_mentions_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "@b").unwrap();
        std::fs::write(dir.path().join("b.md"), "leaf content").unwrap();

        let resolver = BaseMentionResolver::new(dir.path().to_path_buf());
        let mut dedup = ContentDeduplicator::new();
        let results = load_mentions("@a", &resolver, &mut dedup).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content.as_deref(), Some("@b"));
        let unique_paths: Vec<_> = dedup.unique_files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            unique_paths,
            vec![dir.path().join("a.md"), dir.path().join("b.md")]
        );
    }

    #[tokio::test]
    async fn missing_mention_is_opportunistic_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = BaseMentionResolver::new(dir.path().to_path_buf());
        let mut dedup = ContentDeduplicator::new();
        let results = load_mentions("@ghost", &resolver, &mut dedup).await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].found());
        assert!(results[0].error.is_none());
    }
}
