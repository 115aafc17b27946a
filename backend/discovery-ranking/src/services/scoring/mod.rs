//! Per-post scoring.
//!
//! Four independent component scorers feed one aggregation:
//!
//! ```text
//! base    = temporal + engagement + audience + content
//! network = base * relationship multiplier
//! final   = network * verification multiplier
//! ```
//!
//! Every intermediate value lands in a [`ScoreBreakdown`] so a caller can
//! re-derive the final score from the parts.

pub mod audience;
pub mod content;
pub mod engagement;
pub mod temporal;

pub use audience::{AudienceScore, AudienceScorer};
pub use content::{originality, ContentScore, ContentScorer, DuplicateIndex};
pub use engagement::{EngagementScore, EngagementScorer};
pub use temporal::{TemporalScore, TemporalScorer};

use crate::config::ScoringWeights;
use crate::models::{Candidate, ScoreBreakdown, ScoreDetails, ScoredPost, Viewer};
use crate::services::network::{verification_multiplier, RelationshipResolver};
use chrono::{DateTime, Utc};

/// Scores candidates against one weight set. Pure: identical inputs always
/// produce identical breakdowns.
pub struct PostScorer<'a> {
    weights: &'a ScoringWeights,
}

impl<'a> PostScorer<'a> {
    pub fn new(weights: &'a ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        candidate: &Candidate,
        viewer: Option<&Viewer>,
        duplicate_score: f64,
        now: DateTime<Utc>,
    ) -> ScoredPost {
        let post = &candidate.post;
        let author = &candidate.author;

        let temporal = TemporalScorer::new(&self.weights.temporal).score(post, now);
        let engagement = EngagementScorer::new(&self.weights.engagement).score(post);
        let audience = AudienceScorer::new(&self.weights.audience).score(author, now);
        let content = ContentScorer::new(&self.weights.content).score(post, duplicate_score);

        let resolver = RelationshipResolver::new(&self.weights.network);
        let context = viewer.map(|v| v.context_for(author));
        let relationship = resolver.resolve(context.as_ref(), author.user_id);

        let breakdown = ScoreBreakdown::compose(
            temporal.score,
            engagement.score,
            audience.score,
            content.score,
            resolver.multiplier(relationship),
            verification_multiplier(author, &self.weights.verification),
        );

        let details = ScoreDetails {
            age_minutes: temporal.age_minutes,
            engagement_velocity: temporal.velocity,
            velocity_multiplier: temporal.velocity_multiplier,
            recency_band_score: temporal.band_score,
            raw_engagement: engagement.raw,
            authenticity_multiplier: engagement.authenticity_multiplier,
            account_age_days: audience.account_age_days,
            account_age_points: audience.account_age_points,
            follower_points: audience.follower_points,
            content_length: content.content_length,
            media_points: content.media_points,
            poll_points: content.poll_points,
            length_points: content.length_points,
            originality_points: content.originality_points,
            duplicate_score: content.duplicate_score,
        };

        ScoredPost {
            post: post.clone(),
            relationship,
            breakdown,
            details,
        }
    }
}
