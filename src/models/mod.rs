//! Domain models for RankShelf.
//!
//! # Core Concepts
//!
//! ## Permanent Entities
//!
//! - [`Book`]: Catalog entry keyed by an external reference, created once via
//!   `ensure_book_exists` and never mutated afterwards.
//! - [`RatedBook`]: One user's rating of one book, placed inside a
//!   [`SentimentBand`] and optionally tied with other books of the same user.
//!
//! ## Ephemeral Entities
//!
//! These live only in memory while a user is rating a book:
//!
//! - [`SessionView`]: Snapshot of an in-progress comparison flow.
//! - [`Placement`]: Where the comparison flow decided the new book belongs.

mod book;
mod rating;
mod session;

pub use book::*;
pub use rating::*;
pub use session::*;
