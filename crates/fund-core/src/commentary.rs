//! Weekly market commentary keyed by date string.

use crate::calendar::nearest_date_key;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_REVIEW: &str = "No market commentary for this week yet.";

fn default_review() -> String {
    DEFAULT_REVIEW.to_string()
}

/// Commentary dataset as delivered by the loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawCommentary {
    #[serde(default)]
    pub reviews: BTreeMap<String, String>,
    #[serde(default = "default_review", rename = "defaultReview")]
    pub default_review: String,
}

impl Default for RawCommentary {
    fn default() -> Self {
        Self {
            reviews: BTreeMap::new(),
            default_review: default_review(),
        }
    }
}

/// Commentary lookup with a tolerance window and a fallback text.
#[derive(Clone, Debug)]
pub struct CommentaryBook {
    reviews: BTreeMap<String, String>,
    default_text: String,
    tolerance_days: i64,
}

impl CommentaryBook {
    pub fn new(raw: RawCommentary, tolerance_days: i64) -> Self {
        Self {
            reviews: raw.reviews,
            default_text: raw.default_review,
            tolerance_days,
        }
    }

    /// Book with no entries; every lookup yields the default text.
    pub fn empty(tolerance_days: i64) -> Self {
        Self::new(RawCommentary::default(), tolerance_days)
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    /// Key matched for `date`, if any.
    pub fn key_for(&self, date: NaiveDate) -> Option<&str> {
        nearest_date_key(
            date,
            self.reviews.keys().map(String::as_str),
            self.tolerance_days,
        )
    }

    /// Commentary text to show at `date`.
    pub fn lookup(&self, date: NaiveDate) -> &str {
        self.key_for(date)
            .and_then(|k| self.reviews.get(k))
            .map_or(self.default_text.as_str(), String::as_str)
    }
}
