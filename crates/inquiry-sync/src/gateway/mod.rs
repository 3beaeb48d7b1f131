//! Persistence gateway
//!
//! Fetches and stores the opaque encoded snapshot of one project. The blob
//! is passed through untouched; validation beyond "is it base64 text" is
//! left to the coordinator's codec.

mod file;
mod memory;

pub use file::FileGateway;
pub use memory::{MemoryGateway, StoredSnapshot, DEFAULT_HISTORY_LIMIT};

use crate::error::GatewayError;
use async_trait::async_trait;
use inquiry_model::{EncodedSnapshot, ProjectId};
use std::sync::Arc;

/// Snapshot storage keyed by project
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Latest snapshot of `project`; `None` when nothing was ever saved
    async fn fetch_snapshot(
        &self,
        project: &ProjectId,
    ) -> Result<Option<EncodedSnapshot>, GatewayError>;

    /// Store a new snapshot of `project`
    async fn save_snapshot(
        &self,
        project: &ProjectId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: PersistenceGateway + ?Sized> PersistenceGateway for Arc<T> {
    async fn fetch_snapshot(
        &self,
        project: &ProjectId,
    ) -> Result<Option<EncodedSnapshot>, GatewayError> {
        (**self).fetch_snapshot(project).await
    }

    async fn save_snapshot(
        &self,
        project: &ProjectId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), GatewayError> {
        (**self).save_snapshot(project, snapshot).await
    }
}

pub(crate) fn check_project(project: &ProjectId) -> Result<(), GatewayError> {
    let id = project.as_str();
    if id.trim().is_empty()
        || id.contains(['/', '\\'])
        || id == "."
        || id == ".."
    {
        return Err(GatewayError::InvalidProject(id.to_string()));
    }
    Ok(())
}

pub(crate) fn check_payload(snapshot: &EncodedSnapshot) -> Result<(), GatewayError> {
    if snapshot.is_empty() {
        return Err(GatewayError::InvalidPayload("empty snapshot".to_string()));
    }
    snapshot
        .to_text()
        .map(|_| ())
        .map_err(|e| GatewayError::InvalidPayload(e.to_string()))
}
