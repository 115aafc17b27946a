use crate::config::AudienceWeights;
use crate::models::AuthorSnapshot;
use crate::utils::elapsed_days;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudienceScore {
    pub score: f64,
    pub account_age_days: i64,
    pub account_age_points: f64,
    pub follower_points: f64,
}

/// Discovery boost for new creators plus a capped follower term
pub struct AudienceScorer<'a> {
    weights: &'a AudienceWeights,
}

impl<'a> AudienceScorer<'a> {
    pub fn new(weights: &'a AudienceWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, author: &AuthorSnapshot, now: DateTime<Utc>) -> AudienceScore {
        let account_age_days = elapsed_days(author.account_created_at, now);
        let account_age_points = self.account_age_points(account_age_days);
        let follower_points = (author.follower_count as f64 * self.weights.points_per_follower)
            .min(self.weights.max_follower_points);

        AudienceScore {
            score: account_age_points + follower_points,
            account_age_days,
            account_age_points,
            follower_points,
        }
    }

    pub fn account_age_points(&self, age_days: i64) -> f64 {
        self.weights
            .bands
            .iter()
            .find(|band| age_days < band.max_age_days)
            .map(|band| band.score)
            .unwrap_or(self.weights.established_score)
    }
}
