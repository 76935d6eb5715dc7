//! The fragment store interface consumed by the expansion engine.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::Database;

/// Line access for fragment files.
///
/// Paths are matched case-insensitively against either `folder/name` or a
/// bare `name`. Lookups return `Ok(None)` when the path is unknown or the
/// fragment has no lines; `Err` is reserved for storage failures.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// A uniformly random line of the fragment at `path`.
    async fn random_line(&self, path: &str) -> Result<Option<String>>;

    /// The line under the sequential cursor for `path`, advancing the cursor.
    ///
    /// Cursors are keyed by `path` exactly as given and wrap modulo the
    /// fragment's current line count.
    async fn sequential_line(&self, path: &str) -> Result<Option<String>>;

    /// Reset the cursor for `path`, or every cursor when `path` is `None`.
    async fn reset_sequential_counter(&self, path: Option<&str>) -> Result<()>;
}

#[async_trait]
impl FragmentStore for Database {
    async fn random_line(&self, path: &str) -> Result<Option<String>> {
        Database::random_line(self, path)
    }

    async fn sequential_line(&self, path: &str) -> Result<Option<String>> {
        self.next_sequential_line(path)
    }

    async fn reset_sequential_counter(&self, path: Option<&str>) -> Result<()> {
        let removed = Database::reset_sequential_counter(self, path)?;
        tracing::debug!("Reset {} sequential counter(s)", removed);
        Ok(())
    }
}

#[async_trait]
impl<T: FragmentStore + ?Sized> FragmentStore for Arc<T> {
    async fn random_line(&self, path: &str) -> Result<Option<String>> {
        (**self).random_line(path).await
    }

    async fn sequential_line(&self, path: &str) -> Result<Option<String>> {
        (**self).sequential_line(path).await
    }

    async fn reset_sequential_counter(&self, path: Option<&str>) -> Result<()> {
        (**self).reset_sequential_counter(path).await
    }
}
