//! In-process versioned snapshot store

use super::{check_payload, check_project, PersistenceGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use inquiry_model::{codec, CodecError, EncodedSnapshot, ProjectId, Snapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One saved version
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    /// 1-based version within the project
    pub version: u64,
    /// Blob as saved
    pub data: EncodedSnapshot,
    /// Save time
    pub saved_at: DateTime<Utc>,
}

/// Versions kept per project unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

#[derive(Debug)]
struct MemoryShared {
    projects: DashMap<ProjectId, Vec<StoredSnapshot>>,
    latency: Mutex<Duration>,
    failing: AtomicBool,
    history_limit: AtomicUsize,
}

impl Default for MemoryShared {
    fn default() -> Self {
        Self {
            projects: DashMap::new(),
            latency: Mutex::new(Duration::ZERO),
            failing: AtomicBool::new(false),
            history_limit: AtomicUsize::new(DEFAULT_HISTORY_LIMIT),
        }
    }
}

/// Keeps the most recent saved versions per project; fetch returns the latest
///
/// Meant for tests and simulations. Older versions beyond the history limit
/// are dropped; version numbers keep counting.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    shared: Arc<MemoryShared>,
}

impl MemoryGateway {
    /// Create an empty gateway
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every request by `latency`
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Keep at most `limit` versions per project (at least one)
    #[must_use]
    pub fn with_history_limit(self, limit: usize) -> Self {
        self.shared
            .history_limit
            .store(limit.max(1), Ordering::Release);
        self
    }

    /// Change the request delay
    pub fn set_latency(&self, latency: Duration) {
        *self.shared.latency.lock() = latency;
    }

    /// Make every request fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::Release);
    }

    /// Retained versions of `project`, oldest first
    #[must_use]
    pub fn history(&self, project: &ProjectId) -> Vec<StoredSnapshot> {
        self.shared
            .projects
            .get(project)
            .map(|versions| versions.value().clone())
            .unwrap_or_default()
    }

    /// Latest version number of `project`
    #[must_use]
    pub fn latest_version(&self, project: &ProjectId) -> Option<u64> {
        self.shared
            .projects
            .get(project)
            .and_then(|versions| versions.last().map(|v| v.version))
    }

    /// Decoded latest snapshot of `project`
    ///
    /// # Errors
    /// Returns error if the stored blob does not decode
    pub fn latest_snapshot(&self, project: &ProjectId) -> Result<Option<Snapshot>, CodecError> {
        let latest = self
            .shared
            .projects
            .get(project)
            .and_then(|versions| versions.last().map(|v| v.data.clone()));
        latest.as_ref().map(codec::decode).transpose()
    }

    /// Projects with at least one saved version
    #[must_use]
    pub fn projects(&self) -> Vec<ProjectId> {
        let mut projects: Vec<_> = self
            .shared
            .projects
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        projects.sort();
        projects
    }

    async fn simulate_request(&self) -> Result<(), GatewayError> {
        let latency = *self.shared.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.shared.failing.load(Ordering::Acquire) {
            return Err(GatewayError::Request("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn fetch_snapshot(
        &self,
        project: &ProjectId,
    ) -> Result<Option<EncodedSnapshot>, GatewayError> {
        check_project(project)?;
        self.simulate_request().await?;

        Ok(self
            .shared
            .projects
            .get(project)
            .and_then(|versions| versions.last().map(|v| v.data.clone())))
    }

    async fn save_snapshot(
        &self,
        project: &ProjectId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), GatewayError> {
        check_project(project)?;
        check_payload(snapshot)?;
        self.simulate_request().await?;

        let mut versions = self.shared.projects.entry(project.clone()).or_default();
        let version = versions.last().map_or(1, |v| v.version + 1);
        versions.push(StoredSnapshot {
            version,
            data: snapshot.clone(),
            saved_at: Utc::now(),
        });
        let limit = self.shared.history_limit.load(Ordering::Acquire);
        if versions.len() > limit {
            let excess = versions.len() - limit;
            versions.drain(..excess);
        }

        tracing::debug!(project = %project, version, "snapshot stored");
        Ok(())
    }
}
