// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot and restore of agent artifacts against a blob store.
//!
//! Keys follow `<prefix>/<agent_id>/<kind>.tar.gz`. Archive work runs on the
//! blocking pool; store calls are bounded by a per-call timeout.

use crate::archive::{self, ArchiveError};
use crate::blob::{BlobError, BlobStore};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use warden_core::{agent_from_key, artifact_key, AgentId, ArtifactKind, StateLayout};

/// Errors from snapshot/restore
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("blob store unavailable: {0}")]
    TransientStore(String),
    #[error("corrupt archive at {key}: {reason}")]
    CorruptArchive { key: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BlobError> for SyncError {
    fn from(e: BlobError) -> Self {
        SyncError::TransientStore(e.to_string())
    }
}

fn join_error(e: tokio::task::JoinError) -> SyncError {
    SyncError::Io(std::io::Error::other(e.to_string()))
}

/// Which artifacts a restore actually found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub agentdir: bool,
    pub workspace: bool,
}

impl RestoreOutcome {
    pub fn any(&self) -> bool {
        self.agentdir || self.workspace
    }
}

/// Moves agent artifacts between local directories and a blob store.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn BlobStore>,
    prefix: String,
    concurrency: usize,
    call_timeout: Duration,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn BlobStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            concurrency: 8,
            call_timeout: Duration::from_secs(30),
        }
    }

    /// Max agents restored in parallel by [`SyncEngine::restore_all`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, agent_id: &AgentId, kind: ArtifactKind) -> String {
        artifact_key(&self.prefix, agent_id, kind)
    }

    /// Archive `local_dir` and upload it, replacing any earlier snapshot.
    ///
    /// Returns `false` without touching the store when the directory does
    /// not exist.
    pub async fn snapshot(
        &self,
        agent_id: &AgentId,
        kind: ArtifactKind,
        local_dir: &Path,
    ) -> Result<bool, SyncError> {
        let dir = local_dir.to_path_buf();
        let packed = tokio::task::spawn_blocking(move || archive::pack(&dir))
            .await
            .map_err(join_error)?;
        let bytes = match packed {
            Ok(bytes) => bytes,
            Err(ArchiveError::NotFound(_)) => {
                tracing::debug!(%agent_id, %kind, "no local dir, skipping snapshot");
                return Ok(false);
            }
            Err(ArchiveError::Io(e)) => return Err(SyncError::Io(e)),
            Err(ArchiveError::Corrupt(reason)) => {
                return Err(SyncError::Io(std::io::Error::other(reason)))
            }
        };

        let key = self.key(agent_id, kind);
        let size_bytes = bytes.len();
        self.timed(&key, self.store.put(&key, bytes)).await?;
        tracing::info!(%agent_id, %kind, %key, size_bytes, "snapshot uploaded");
        Ok(true)
    }

    /// Download the latest snapshot and unpack it into `local_dir`.
    ///
    /// Returns `false` when no snapshot exists; the local dir is untouched.
    pub async fn restore(
        &self,
        agent_id: &AgentId,
        kind: ArtifactKind,
        local_dir: &Path,
    ) -> Result<bool, SyncError> {
        let key = self.key(agent_id, kind);
        let bytes = match self.timed(&key, self.store.get(&key)).await {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound(_)) => {
                tracing::debug!(%agent_id, %kind, "no snapshot to restore");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let dest = local_dir.to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || archive::unpack(&bytes, &dest))
            .await
            .map_err(join_error)?;
        match unpacked {
            Ok(()) => {}
            Err(ArchiveError::Corrupt(reason)) => {
                return Err(SyncError::CorruptArchive { key, reason })
            }
            Err(ArchiveError::NotFound(p)) => {
                return Err(SyncError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    p.display().to_string(),
                )))
            }
            Err(ArchiveError::Io(e)) => return Err(SyncError::Io(e)),
        }

        tracing::info!(%agent_id, %kind, %key, "snapshot restored");
        Ok(true)
    }

    /// Snapshot both artifact kinds of one agent concurrently.
    ///
    /// Both uploads are attempted; the first error is returned.
    pub async fn snapshot_agent(
        &self,
        agent_id: &AgentId,
        layout: &StateLayout,
    ) -> Result<(), SyncError> {
        let agent_dir = layout.dir_for(agent_id, ArtifactKind::Agentdir);
        let workspace_dir = layout.dir_for(agent_id, ArtifactKind::Workspace);
        let (agentdir, workspace) = tokio::join!(
            self.snapshot(agent_id, ArtifactKind::Agentdir, &agent_dir),
            self.snapshot(agent_id, ArtifactKind::Workspace, &workspace_dir),
        );
        agentdir?;
        workspace?;
        Ok(())
    }

    /// Restore both artifact kinds of one agent concurrently.
    pub async fn restore_agent(
        &self,
        agent_id: &AgentId,
        layout: &StateLayout,
    ) -> Result<RestoreOutcome, SyncError> {
        let (agentdir, workspace) = self.restore_pair(agent_id, layout).await;
        Ok(RestoreOutcome { agentdir: agentdir?, workspace: workspace? })
    }

    async fn restore_pair(
        &self,
        agent_id: &AgentId,
        layout: &StateLayout,
    ) -> (Result<bool, SyncError>, Result<bool, SyncError>) {
        let agent_dir = layout.dir_for(agent_id, ArtifactKind::Agentdir);
        let workspace_dir = layout.dir_for(agent_id, ArtifactKind::Workspace);
        tokio::join!(
            self.restore(agent_id, ArtifactKind::Agentdir, &agent_dir),
            self.restore(agent_id, ArtifactKind::Workspace, &workspace_dir),
        )
    }

    /// Restore every agent that has at least one snapshot under the prefix.
    ///
    /// Returns how many agents had at least one artifact restored. A failure
    /// for one agent is logged and does not stop the others; only failing
    /// to list the store is an error.
    pub async fn restore_all(&self, layout: &StateLayout) -> Result<usize, SyncError> {
        let list_prefix = format!("{}/", self.prefix.trim_end_matches('/'));
        let keys = self.timed(&list_prefix, self.store.list(&list_prefix)).await?;
        let agents: BTreeSet<AgentId> =
            keys.iter().filter_map(|k| agent_from_key(&self.prefix, k)).collect();

        tracing::info!(agents = agents.len(), "restoring agents from snapshots");

        let restored = stream::iter(agents)
            .map(|agent_id| async move {
                let (agentdir, workspace) = self.restore_pair(&agent_id, layout).await;
                let mut found = false;
                for (kind, result) in
                    [(ArtifactKind::Agentdir, agentdir), (ArtifactKind::Workspace, workspace)]
                {
                    match result {
                        Ok(hit) => found |= hit,
                        Err(e) => {
                            tracing::warn!(%agent_id, %kind, error = %e, "restore failed");
                        }
                    }
                }
                found
            })
            .buffer_unordered(self.concurrency)
            .filter(|found| std::future::ready(*found))
            .count()
            .await;

        tracing::info!(restored, "restore complete");
        Ok(restored)
    }

    /// Snapshot each listed agent, logging failures. Returns the number of
    /// agents whose snapshot succeeded.
    pub async fn snapshot_all(&self, agents: &[AgentId], layout: &StateLayout) -> usize {
        stream::iter(agents.iter().cloned())
            .map(|agent_id| async move {
                match self.snapshot_agent(&agent_id, layout).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(%agent_id, error = %e, "snapshot failed");
                        false
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter(|ok| std::future::ready(*ok))
            .count()
            .await
    }

    async fn timed<T>(
        &self,
        key: &str,
        call: impl std::future::Future<Output = Result<T, BlobError>>,
    ) -> Result<T, BlobError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BlobError::Transient(format!(
                "timed out after {}ms ({key})",
                self.call_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
