use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's rating of a single book.
///
/// Ratings live on a 1–10 scale and always fall inside the range of their
/// [`SentimentBand`]. Tie links are symmetric: when `a` lists `b` in
/// `tied_book_ids`, `b` lists `a`, and both carry the same `rating`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatedBook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub rating: f64,
    pub sentiment: SentimentBand,
    /// Books this one is tied with, in the order the ties were recorded.
    pub tied_book_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The coarse sentiment a user picks before comparisons start.
///
/// - `Loved`: top of the scale
/// - `Liked`: middle of the scale
/// - `Hated`: bottom of the scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SentimentBand {
    Loved,
    Liked,
    Hated,
}

impl SentimentBand {
    /// All bands, highest first.
    pub const ALL: [SentimentBand; 3] = [Self::Loved, Self::Liked, Self::Hated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loved => "loved",
            Self::Liked => "liked",
            Self::Hated => "hated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "loved" => Some(Self::Loved),
            "liked" => Some(Self::Liked),
            "hated" => Some(Self::Hated),
            _ => None,
        }
    }
}

/// New rating row produced by the resolver, before it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingDraft {
    pub book_id: Uuid,
    pub rating: f64,
    pub sentiment: SentimentBand,
    pub tied_book_ids: Vec<Uuid>,
}

/// Change to an existing rating caused by inserting a new book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingUpdate {
    pub book_id: Uuid,
    pub rating: f64,
    pub tied_book_ids: Vec<Uuid>,
}

/// Everything that must be written, atomically, to record one new rating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingPlan {
    pub draft: RatingDraft,
    pub updates: Vec<RatingUpdate>,
}

/// Result of submitting a comparison session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingOutcome {
    pub rated: RatedBook,
    /// Existing ratings whose value or tie list changed.
    pub updated: Vec<RatedBook>,
}

/// Range of a band as exposed to clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BandInfo {
    pub sentiment: SentimentBand,
    pub min: f64,
    pub max: f64,
}
