use crate::config::EngagementWeights;
use crate::models::PostSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementScore {
    pub score: f64,
    pub raw: f64,
    pub authenticity_multiplier: f64,
}

/// Weighted interaction score, scaled by how many distinct users engaged
pub struct EngagementScorer<'a> {
    weights: &'a EngagementWeights,
}

impl<'a> EngagementScorer<'a> {
    pub fn new(weights: &'a EngagementWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, post: &PostSnapshot) -> EngagementScore {
        let raw = post.like_count as f64 * self.weights.like
            + post.repost_count as f64 * self.weights.repost
            + post.reply_count as f64 * self.weights.reply
            + post.view_count as f64 * self.weights.view;

        let authenticity_multiplier = self.authenticity_multiplier(post.unique_engager_count);

        EngagementScore {
            score: raw * authenticity_multiplier,
            raw,
            authenticity_multiplier,
        }
    }

    /// `1 + engagers * per_engager`, capped so one viral post cannot run away
    pub fn authenticity_multiplier(&self, unique_engagers: u64) -> f64 {
        (1.0 + unique_engagers as f64 * self.weights.authenticity_per_engager)
            .min(self.weights.max_authenticity_multiplier)
    }
}
