use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rating::{RatedBook, SentimentBand};

/// What the user answered when shown the new book against a comparison book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// The new book is better than the comparison book.
    PreferNew,
    /// The comparison book is better than the new book.
    PreferExisting,
    /// Equally good, or too tough to decide.
    #[serde(alias = "too_tough")]
    Tie,
    /// Show a different comparison book.
    Skip,
}

/// Terminal position of a comparison flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "position", rename_all = "snake_case")]
pub enum Placement {
    /// Better than every existing rating in the band.
    Top,
    /// Worse than every existing rating in the band.
    Bottom,
    /// No existing ratings in the band.
    Middle,
    /// Tied with an existing rating.
    Tied { book_id: Uuid },
}

/// Input for starting a comparison session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionInput {
    pub book_id: Uuid,
    pub sentiment: SentimentBand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceInput {
    pub choice: Choice,
}

/// Client-facing snapshot of a comparison session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub sentiment: SentimentBand,
    #[serde(flatten)]
    pub state: SessionState,
    pub can_undo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Comparing {
        comparison: RatedBook,
        cursor: usize,
        /// Candidates still inside the undecided window.
        remaining: usize,
    },
    Finished {
        placement: Placement,
        /// Display value only; the submitted rating is recomputed.
        provisional_rating: f64,
    },
}
