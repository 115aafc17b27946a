use crate::config::TemporalWeights;
use crate::models::PostSnapshot;
use crate::utils::{elapsed_minutes, safe_div};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalScore {
    pub score: f64,
    pub age_minutes: f64,
    /// Engagements per hour since posting
    pub velocity: f64,
    pub velocity_multiplier: f64,
    pub band_score: f64,
}

/// Recency score: age band scaled by engagement velocity
pub struct TemporalScorer<'a> {
    weights: &'a TemporalWeights,
}

impl<'a> TemporalScorer<'a> {
    pub fn new(weights: &'a TemporalWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, post: &PostSnapshot, now: DateTime<Utc>) -> TemporalScore {
        let age_minutes = elapsed_minutes(post.created_at, now);
        let band_score = self.band_score(age_minutes);

        let velocity = safe_div(
            post.total_engagement() as f64,
            age_minutes / 60.0,
            self.weights.min_age_hours,
        );
        let velocity_multiplier = self.velocity_multiplier(velocity);

        TemporalScore {
            score: band_score * velocity_multiplier,
            age_minutes,
            velocity,
            velocity_multiplier,
            band_score,
        }
    }

    /// Bands have an inclusive lower and exclusive upper bound
    pub fn band_score(&self, age_minutes: f64) -> f64 {
        self.weights
            .bands
            .iter()
            .find(|band| age_minutes < band.max_age_minutes)
            .map(|band| band.score)
            .unwrap_or(self.weights.stale_score)
    }

    pub fn velocity_multiplier(&self, velocity: f64) -> f64 {
        (1.0 + velocity / self.weights.velocity_scale)
            .min(self.weights.max_velocity_multiplier)
            .max(1.0)
    }
}
