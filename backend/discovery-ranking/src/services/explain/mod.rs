//! Human-readable score explanations for the analytics view

use crate::models::{Relationship, ScoreBreakdown, ScoredPost};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostExplanation {
    pub post_id: Uuid,
    pub relationship: Relationship,
    pub breakdown: ScoreBreakdown,
    pub lines: Vec<String>,
}

impl PostExplanation {
    pub fn from_scored(scored: &ScoredPost) -> Self {
        Self {
            post_id: scored.post.id,
            relationship: scored.relationship,
            breakdown: scored.breakdown,
            lines: explain(scored),
        }
    }
}

/// One line per contributing factor, in aggregation order
pub fn explain(scored: &ScoredPost) -> Vec<String> {
    let b = &scored.breakdown;
    let d = &scored.details;
    let mut lines = Vec::with_capacity(16);

    lines.push(format!(
        "Recency: {:.0} min old, band {:.0} x velocity {:.2} ({:.1}/h) = {:.1}",
        d.age_minutes, d.recency_band_score, d.velocity_multiplier, d.engagement_velocity, b.temporal
    ));
    lines.push(format!(
        "Engagement: raw {:.1} x authenticity {:.2} = {:.1}",
        d.raw_engagement, d.authenticity_multiplier, b.engagement
    ));
    lines.push(format!(
        "Audience: account {} days = {:.0} points, followers = {:.1} points",
        d.account_age_days, d.account_age_points, d.follower_points
    ));

    if d.media_points > 0.0 {
        lines.push(format!("Media attached = {:.0} points", d.media_points));
    }
    if d.poll_points > 0.0 {
        lines.push(format!("Poll attached = {:.0} points", d.poll_points));
    }
    if d.length_points > 0.0 {
        lines.push(format!(
            "Optimal length ({} chars) = {:.0} points",
            d.content_length, d.length_points
        ));
    }
    lines.push(format!("Originality = {:.1} points", d.originality_points));
    if d.duplicate_score > 0.0 {
        lines.push(format!("Duplicate score: {:.0}%", d.duplicate_score * 100.0));
    }

    lines.push(format!("Base score = {:.1}", b.base_score));
    lines.push(format!(
        "Relationship: {} x{:.1} = {:.1}",
        relationship_label(scored.relationship),
        b.network_multiplier,
        b.network_adjusted_score
    ));
    if b.verified_multiplier != 1.0 {
        lines.push(format!("Verified author x{:.1}", b.verified_multiplier));
    }
    lines.push(format!("Final score = {:.1}", b.final_score));

    lines
}

fn relationship_label(relationship: Relationship) -> &'static str {
    match relationship {
        Relationship::SelfAuthored => "your own post",
        Relationship::MutualFollow => "mutual follow",
        Relationship::OneWayFollow => "you follow the author",
        Relationship::DiverseInterest => "outside your usual interests",
        Relationship::NoRelationship => "discovery",
    }
}
