pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rating;

pub use error::{RatingError, Result};
