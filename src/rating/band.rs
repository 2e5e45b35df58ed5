//! Fixed numeric ranges of the sentiment bands.
//!
//! The bands partition the 1.0–10.0 scale at a resolution of
//! [`RATING_STEP`]: Hated `[1.0, 4.9]`, Liked `[5.0, 6.9]`, Loved `[7.0, 10.0]`.

use crate::error::{RatingError, Result};
use crate::models::{BandInfo, SentimentBand};

pub const SCALE_MIN: f64 = 1.0;
pub const SCALE_MAX: f64 = 10.0;

/// Resolution of the rating scale. Adjacent bands are exactly one step apart.
pub const RATING_STEP: f64 = 0.1;

const EPSILON: f64 = 1e-9;

/// Closed numeric range `[min, max]` of a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

impl BandRange {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, rating: f64) -> bool {
        rating >= self.min - EPSILON && rating <= self.max + EPSILON
    }
}

pub fn range_for(band: SentimentBand) -> BandRange {
    match band {
        SentimentBand::Loved => BandRange { min: 7.0, max: 10.0 },
        SentimentBand::Liked => BandRange { min: 5.0, max: 6.9 },
        SentimentBand::Hated => BandRange { min: 1.0, max: 4.9 },
    }
}

impl SentimentBand {
    pub fn range(&self) -> BandRange {
        range_for(*self)
    }

    /// Classify an arbitrary scale value. Values falling between two bands
    /// belong to the lower one; values off the scale are clamped.
    pub fn for_rating(rating: f64) -> Self {
        if rating >= range_for(Self::Loved).min - EPSILON {
            Self::Loved
        } else if rating >= range_for(Self::Liked).min - EPSILON {
            Self::Liked
        } else {
            Self::Hated
        }
    }

    pub fn info(&self) -> BandInfo {
        let range = self.range();
        BandInfo {
            sentiment: *self,
            min: range.min,
            max: range.max,
        }
    }
}

/// Check that the band ranges are well formed, ordered, non-overlapping and
/// cover the whole scale without gaps wider than one step.
pub fn validate_partition() -> Result<()> {
    validate_ranges(&SentimentBand::ALL.map(range_for))
}

fn validate_ranges(ranges: &[BandRange]) -> Result<()> {
    for range in ranges {
        if range.min > range.max {
            return Err(RatingError::validation(format!(
                "band range inverted: [{}, {}]",
                range.min, range.max
            )));
        }
    }

    // Highest band first.
    for pair in ranges.windows(2) {
        let (upper, lower) = (pair[0], pair[1]);
        if lower.max >= upper.min {
            return Err(RatingError::validation(format!(
                "bands overlap: [{}, {}] and [{}, {}]",
                lower.min, lower.max, upper.min, upper.max
            )));
        }
        if upper.min - lower.max > RATING_STEP + EPSILON {
            return Err(RatingError::validation(format!(
                "gap between {} and {}",
                lower.max, upper.min
            )));
        }
    }

    let (Some(top), Some(bottom)) = (ranges.first(), ranges.last()) else {
        return Err(RatingError::validation("no bands defined"));
    };
    if (top.max - SCALE_MAX).abs() > EPSILON || (bottom.min - SCALE_MIN).abs() > EPSILON {
        return Err(RatingError::validation("bands do not cover the full scale"));
    }

    Ok(())
}
