use anyhow::Result;
use uuid::Uuid;

use crate::models::{Book, BookRef, RatedBook, RatingOutcome, RatingPlan, SentimentBand};

/// Persistence collaborator used by the rating engine.
///
/// Implementations report failures as `anyhow` errors; the engine surfaces
/// them as retryable I/O errors and never substitutes a default rating.
pub trait RatingStore: Send + Sync {
    /// The user's ratings in `band`, highest first.
    fn fetch_rated_books(&self, user_id: Uuid, band: SentimentBand) -> Result<Vec<RatedBook>>;

    /// Every rating of the user, highest first.
    fn fetch_all_rated_books(&self, user_id: Uuid) -> Result<Vec<RatedBook>>;

    fn get_rating(&self, user_id: Uuid, book_id: Uuid) -> Result<Option<RatedBook>>;

    fn get_book(&self, book_id: Uuid) -> Result<Option<Book>>;

    /// Look up a book by its external reference, creating it when missing.
    fn ensure_book_exists(&self, book: BookRef) -> Result<Book>;

    /// Insert the new rating and apply every update of `plan` as one unit.
    ///
    /// Either everything is written or nothing is.
    fn commit_rating_plan(&self, user_id: Uuid, plan: &RatingPlan) -> Result<RatingOutcome>;
}
