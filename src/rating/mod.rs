//! Pairwise-comparison rating core.
//!
//! A new rating is first bucketed into a [`SentimentBand`](crate::models::SentimentBand),
//! then placed relative to the user's existing ratings in that band through a
//! sequence of binary comparisons ([`ComparisonSession`]). The [`resolver`]
//! turns the final placement into numeric ratings and keeps tie groups consistent.

pub mod band;
mod engine;
pub mod resolver;
mod sampler;
mod selector;
mod store;

pub use band::{range_for, BandRange};
pub use engine::RatingEngine;
pub use sampler::ComparisonSession;
pub use selector::{CandidateSelector, FirstSelector, MiddleSelector, RandomSelector, SelectionPolicy};
pub use store::RatingStore;
