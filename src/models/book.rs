use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog book.
///
/// Books arrive from an external catalog search. They are resolved into a
/// local row exactly once per `external_ref` and are immutable afterwards,
/// so every rating refers to a stable local id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: Uuid,
    /// Identifier in the external catalog (e.g. a volume id).
    pub external_ref: String,
    pub title: String,
    pub author: Option<String>,
    /// Cover image reference as provided by the catalog.
    pub cover_url: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for resolving a catalog book into a local [`Book`].
///
/// Only `external_ref` participates in the lookup. The remaining fields are
/// used when the book is created and ignored when it already exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRef {
    pub external_ref: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl BookRef {
    pub fn new(external_ref: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_ref: external_ref.into(),
            title: title.into(),
            author: None,
            cover_url: None,
            category: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}
