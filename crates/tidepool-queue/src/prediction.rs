// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Performance prediction.
//!
//! A placeholder heuristic, not a trained model: scores are useful for
//! ordering the review backlog and nothing more.
//!
//! ```text
//! score = (50 + length_band + hashtag_band) * post_type_multiplier
//!         + 5 if carousel
//! clamped to [0, 100]
//! ```
//!
//! `length_band` is +10 for 100..=500 rendered characters and -5 above 1000;
//! `hashtag_band` is +15 for 15..=25 hashtags and -10 below 5.

use tidepool_core::{ContentBody, PostType};

const BASE_SCORE: f64 = 50.0;
const CAROUSEL_BONUS: f64 = 5.0;

fn length_band(length: usize) -> f64 {
    match length {
        100..=500 => 10.0,
        1001.. => -5.0,
        _ => 0.0,
    }
}

fn hashtag_band(count: usize) -> f64 {
    match count {
        15..=25 => 15.0,
        0..5 => -10.0,
        _ => 0.0,
    }
}

/// Predicted engagement score in `[0, 100]`.
pub fn predict_performance(body: &ContentBody, post_type: PostType) -> f64 {
    let mut score =
        BASE_SCORE + length_band(body.total_length()) + hashtag_band(body.hashtags.len());
    score *= post_type.engagement_multiplier();
    if body.media.is_carousel() {
        score += CAROUSEL_BONUS;
    }
    score.clamp(0.0, 100.0)
}
