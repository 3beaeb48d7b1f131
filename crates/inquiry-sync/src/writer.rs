//! External writer adapter
//!
//! Lets a surface without a canvas session (a browser extension, an
//! importer) drop material into a project's scrapbook. It reads the latest
//! persisted snapshot, appends one card, saves the whole aggregate and
//! announces the new state to the room.
//!
//! The read-modify-write is not guarded: a canvas save landing between the
//! fetch and the save is overwritten, and the next canvas save overwrites
//! the card if that session never received the announcement.

use crate::error::WriterError;
use crate::gateway::PersistenceGateway;
use crate::transport::RoomChannel;
use inquiry_model::{
    codec, now_millis, Author, CardDraft, ClientId, ProjectId, RoomId, ScrapbookCard, Snapshot,
    SyncOperation,
};
use std::sync::Arc;

/// Adds scrapbook cards from outside a canvas session
#[derive(Clone)]
pub struct ScrapbookWriter {
    gateway: Arc<dyn PersistenceGateway>,
    channel: Arc<dyn RoomChannel>,
    author: Author,
    client_id: ClientId,
}

impl std::fmt::Debug for ScrapbookWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapbookWriter")
            .field("author", &self.author)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ScrapbookWriter {
    /// Writer acting as `author`, announcing as `external-{author.id}`
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        channel: Arc<dyn RoomChannel>,
        author: Author,
    ) -> Self {
        let client_id = ClientId::external(&author.id);
        Self {
            gateway,
            channel,
            author,
            client_id,
        }
    }

    /// Announcing client id
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Append a card to `project`'s scrapbook
    ///
    /// An unreadable or missing snapshot starts from an empty aggregate.
    /// Announcement failures are logged only.
    ///
    /// # Errors
    /// Returns error if the aggregate cannot be encoded or saved
    pub async fn add_material(
        &self,
        project: &ProjectId,
        draft: CardDraft,
    ) -> Result<ScrapbookCard, WriterError> {
        let mut base = self.latest(project).await;

        let card = draft.into_card(&self.author, now_millis());
        base.scrapbook_cards.push(card.clone());

        let blob = codec::encode(&base)?;
        self.gateway.save_snapshot(project, &blob).await?;

        let operation =
            SyncOperation::full_state(RoomId::for_project(project), self.client_id.clone(), &base)?;
        if let Err(e) = self.channel.send_operation(&operation).await {
            tracing::warn!(project = %project, error = %e, "material saved but not announced");
        }

        tracing::info!(
            project = %project,
            card = %card.id,
            kind = card.kind.as_str(),
            "material added to scrapbook"
        );
        Ok(card)
    }

    async fn latest(&self, project: &ProjectId) -> Snapshot {
        match self.gateway.fetch_snapshot(project).await {
            Ok(Some(blob)) => codec::decode(&blob).unwrap_or_else(|e| {
                tracing::warn!(project = %project, error = %e, "stored snapshot is malformed; starting empty");
                Snapshot::new()
            }),
            Ok(None) => Snapshot::new(),
            Err(e) => {
                tracing::warn!(project = %project, error = %e, "snapshot fetch failed; starting empty");
                Snapshot::new()
            }
        }
    }
}
