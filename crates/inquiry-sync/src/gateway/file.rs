//! Directory-backed snapshot store
//!
//! One `{project}.json` resource per project holding
//! `{"project_id": ..., "data": "<base64>"}`. Each write goes to its own
//! staging file and is renamed into place, so concurrent saves of one
//! project never share a temp file; the last rename wins.

use super::{check_payload, check_project, PersistenceGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use inquiry_model::{EncodedSnapshot, ProjectId, SnapshotResource};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

const STAGING_PREFIX: &str = ".inquiry.tmp";

/// Snapshot files under a root directory
#[derive(Debug, Clone)]
pub struct FileGateway {
    root: PathBuf,
}

impl FileGateway {
    /// Store under `root`; created on first save
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resource path of `project`
    #[must_use]
    pub fn path_for(&self, project: &ProjectId) -> PathBuf {
        self.root.join(format!("{}.json", project.as_str()))
    }

    fn staging_path(&self, project: &ProjectId) -> PathBuf {
        self.root
            .join(format!("{STAGING_PREFIX}.{}.{}", project.as_str(), Ulid::new()))
    }
}

async fn write_staged(staging: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
    let written = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging)
            .await?;
        file.write_all(body).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(staging, path).await
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(staging).await;
    }
    written
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    async fn fetch_snapshot(
        &self,
        project: &ProjectId,
    ) -> Result<Option<EncodedSnapshot>, GatewayError> {
        check_project(project)?;

        let text = match tokio::fs::read_to_string(self.path_for(project)).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let resource: SnapshotResource = serde_json::from_str(&text)?;
        Ok(Some(resource.data))
    }

    async fn save_snapshot(
        &self,
        project: &ProjectId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), GatewayError> {
        check_project(project)?;
        check_payload(snapshot)?;

        tokio::fs::create_dir_all(&self.root).await?;

        let resource = SnapshotResource::new(snapshot.clone()).with_project(project.as_str());
        let body = serde_json::to_vec_pretty(&resource)?;

        let path = self.path_for(project);
        write_staged(&self.staging_path(project), &path, &body).await?;

        tracing::debug!(project = %project, path = %path.display(), "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn staging_files(root: &Path) -> usize {
        std::fs::read_dir(root)
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(STAGING_PREFIX)
            })
            .count()
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path());
        assert!(gateway
            .fetch_snapshot(&ProjectId::new("p"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn save_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path().join("nested"));
        let project = ProjectId::new("p");
        let blob = EncodedSnapshot::from_text(r#"{"nodes":[],"edges":[]}"#);

        gateway.save_snapshot(&project, &blob).await.unwrap();

        assert_eq!(gateway.fetch_snapshot(&project).await.unwrap(), Some(blob));
        assert_eq!(staging_files(gateway.root()), 0);

        let written = std::fs::read_to_string(gateway.path_for(&project)).unwrap();
        assert!(written.contains("\"project_id\": \"p\""));
    }

    #[tokio::test]
    async fn corrupt_resource_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path());
        let project = ProjectId::new("p");
        std::fs::write(gateway.path_for(&project), "not json").unwrap();

        let err = gateway.fetch_snapshot(&project).await.unwrap_err();
        assert!(matches!(err, GatewayError::Resource(_)));
    }

    #[tokio::test]
    async fn path_escaping_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path());
        let err = gateway
            .save_snapshot(
                &ProjectId::new("../escape"),
                &EncodedSnapshot::from_text("{}"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidProject(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_of_one_project_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(FileGateway::new(dir.path()));
        let project = ProjectId::new("p1");

        let saves: Vec<_> = (0..64)
            .map(|i| {
                let gateway = Arc::clone(&gateway);
                let project = project.clone();
                tokio::spawn(async move {
                    let text = format!(r#"{{"nodes":[],"edges":[],"n":{i}}}"#);
                    let blob = EncodedSnapshot::from_text(&text);
                    gateway.save_snapshot(&project, &blob).await
                })
            })
            .collect();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let stored = gateway.fetch_snapshot(&project).await.unwrap().unwrap();
        assert!(stored.to_text().unwrap().starts_with(r#"{"nodes":[],"edges":[],"n":"#));
        assert_eq!(staging_files(dir.path()), 0);
    }
}
