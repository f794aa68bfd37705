// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Retry wrapper for the `TransientIO` error class (§7): an OS-level I/O
//! error specifically matching the cloud-sync "file unavailable" signature
//! (`errno == 5`) gets three attempts with doubling backoff starting at
//! 100ms before the error is propagated as-is.

use std::path::Path;

use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::{Condition, RetryIf};

use crate::error::Result;

const CLOUD_SYNC_ERRNO: i32 = 5;

struct RetryOnTransientIo;

impl Condition<std::io::Error> for RetryOnTransientIo {
    fn should_retry(&mut self, error: &std::io::Error) -> bool {
        error.raw_os_error() == Some(CLOUD_SYNC_ERRNO)
    }
}

fn retry_strategy() -> impl Iterator<Item = std::time::Duration> {
    ExponentialBackoff::from_millis(2).factor(50).take(3)
}

/// Read a UTF-8 file's contents, retrying on transient cloud-sync I/O
/// errors with exponential backoff (3 attempts, initial 100ms, doubling).
pub async fn read_with_retry(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    let content = RetryIf::spawn(
        retry_strategy(),
        || {
            let path = path.clone();
            async move { tokio::fs::read_to_string(&path).await }
        },
        RetryOnTransientIo,
    )
    .await?;
    Ok(content)
}

/// Write UTF-8 content to a file, creating parent directories as needed,
/// retrying on transient cloud-sync I/O errors the same way as
/// [`read_with_retry`].
pub async fn write_with_retry(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path = path.to_path_buf();
    let content = content.to_string();
    RetryIf::spawn(
        retry_strategy(),
        || {
            let path = path.clone();
            let content = content.clone();
            async move { tokio::fs::write(&path, content).await }
        },
        RetryOnTransientIo,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod io_retry_test {
    use super::*;

    #[tokio::test]
    async fn reads_back_what_was_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.txt");
        write_with_retry(&path, "hello").await.unwrap();
        let content = read_with_retry(&path).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn missing_file_is_propagated_without_retry_delay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        let result = read_with_retry(&path).await;
        assert!(result.is_err());
    }
}
