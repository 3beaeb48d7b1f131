//! Scrapbook cards
//!
//! Cards are created whole and deleted whole; nothing edits a card in
//! place.

use crate::graph::Position;
use crate::ids::CardId;
use serde::{Deserialize, Serialize};

/// Content kind of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Plain text excerpt
    Text,
    /// Image reference
    Image,
    /// Web link
    Link,
    /// Result of an AI action
    AiResponse,
}

impl CardKind {
    /// Wire name of the kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardKind::Text => "text",
            CardKind::Image => "image",
            CardKind::Link => "link",
            CardKind::AiResponse => "ai_response",
        }
    }
}

/// Item of collected material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapbookCard {
    /// Card id
    pub id: CardId,
    /// Content kind
    #[serde(rename = "type")]
    pub kind: CardKind,
    /// Text, URL or AI output
    pub content: String,
    /// Author id
    #[serde(default)]
    pub author_id: String,
    /// Author display name
    #[serde(default)]
    pub author_name: String,
    /// Creation time, Unix millis
    pub created_at: i64,
    /// Origin URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Origin title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    /// Image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Free tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Position inside the scrapbook panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Who creates cards in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User id
    pub id: String,
    /// Display name
    pub name: String,
}

impl Author {
    /// Create an author
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Author used when no user is known
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("", "Anonymous")
    }
}

/// Card content before an id, author and timestamp are assigned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardDraft {
    /// Text, URL or AI output
    pub content: String,
    /// Explicit kind; inferred when absent
    pub kind: Option<CardKind>,
    /// Origin URL
    pub source_url: Option<String>,
    /// Origin title
    pub source_title: Option<String>,
    /// Image reference
    pub image_url: Option<String>,
    /// Free tags
    pub tags: Option<Vec<String>>,
}

impl CardDraft {
    /// Draft with content only
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// With explicit kind
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: CardKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// With origin URL and title
    #[inline]
    #[must_use]
    pub fn with_source(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self.source_title = Some(title.into());
        self
    }

    /// With image reference
    #[inline]
    #[must_use]
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Kind the card will get: explicit, else `image` when an image is
    /// attached, else `text`
    #[must_use]
    pub fn resolved_kind(&self) -> CardKind {
        match (self.kind, &self.image_url) {
            (Some(kind), _) => kind,
            (None, Some(_)) => CardKind::Image,
            (None, None) => CardKind::Text,
        }
    }

    /// Materialize the card
    #[must_use]
    pub fn into_card(self, author: &Author, created_at: i64) -> ScrapbookCard {
        let kind = self.resolved_kind();
        ScrapbookCard {
            id: CardId::generate(),
            kind,
            content: self.content,
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            created_at,
            source_url: self.source_url,
            source_title: self.source_title,
            image_url: self.image_url,
            tags: self.tags,
            position: None,
        }
    }
}
