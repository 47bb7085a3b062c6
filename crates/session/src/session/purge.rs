// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam to subsystems that keep offline content tied to an identity.
//!
//! The session store does not own that content. It only asks each
//! registered owner to drop what belongs to a user when the session ends.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Boxed future returned by [`OfflineContent::purge`].
pub type PurgeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Owner of identity-tied offline content.
pub trait OfflineContent: Send + Sync + 'static {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Remove everything stored on behalf of `user_id`.
    fn purge<'a>(&'a self, user_id: &'a str) -> PurgeFuture<'a>;
}

/// Offline content kept as one directory per user under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryPurge {
    root: PathBuf,
}

impl DirectoryPurge {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding `user_id`'s content. Ids that could escape the root
    /// are rejected.
    pub fn user_dir(&self, user_id: &str) -> anyhow::Result<PathBuf> {
        if user_id.is_empty()
            || user_id == "."
            || user_id == ".."
            || user_id.contains(&['/', '\\'][..])
        {
            anyhow::bail!("refusing to purge unsafe user id {user_id:?}");
        }
        Ok(self.root.join(user_id))
    }
}

impl OfflineContent for DirectoryPurge {
    fn name(&self) -> &str {
        "offline-dir"
    }

    fn purge<'a>(&'a self, user_id: &'a str) -> PurgeFuture<'a> {
        Box::pin(async move {
            let dir = self.user_dir(user_id)?;
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(anyhow::anyhow!("remove {}: {e}", dir.display())),
            }
        })
    }
}

#[cfg(test)]
#[path = "purge_tests.rs"]
mod tests;
