use crate::error::{RankingError, Result};
use crate::utils::jaccard_similarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

/// Relative tolerance used when re-checking a breakdown against its final score.
pub const BREAKDOWN_TOLERANCE: f64 = 1e-6;

/// Post as supplied by the data layer at query time. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_count: u32,
    #[serde(default)]
    pub has_poll: bool,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub unique_engager_count: u64,
    /// Near-duplicate score (0.0 - 1.0) against the author's recent posts,
    /// when the data layer already computed one.
    #[serde(default)]
    pub recent_duplicate_score: Option<f64>,
}

impl PostSnapshot {
    /// likes + reposts + replies + views
    pub fn total_engagement(&self) -> u64 {
        self.like_count
            .saturating_add(self.repost_count)
            .saturating_add(self.reply_count)
            .saturating_add(self.view_count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub user_id: Uuid,
    pub account_created_at: DateTime<Utc>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub verified: bool,
    /// Topics the author posts about (used for the diverse-interest signal)
    #[serde(default)]
    pub interest_tags: Vec<String>,
}

/// A post paired with its author, one unit of the candidate set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub post: PostSnapshot,
    pub author: AuthorSnapshot,
}

/// Viewer identity and social graph, pre-fetched once per ranking request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
    pub viewer_id: Uuid,
    /// Authors the viewer follows
    #[serde(default)]
    pub following: HashSet<Uuid>,
    /// Users following the viewer
    #[serde(default)]
    pub followers: HashSet<Uuid>,
    #[serde(default)]
    pub interest_tags: Vec<String>,
}

impl Viewer {
    pub fn new(viewer_id: Uuid) -> Self {
        Self {
            viewer_id,
            ..Default::default()
        }
    }

    pub fn following(mut self, author_id: Uuid) -> Self {
        self.following.insert(author_id);
        self
    }

    pub fn followed_by(mut self, user_id: Uuid) -> Self {
        self.followers.insert(user_id);
        self
    }

    pub fn with_interests(mut self, tags: Vec<String>) -> Self {
        self.interest_tags = tags;
        self
    }

    /// Derive the per-author relationship flags for this viewer
    pub fn context_for(&self, author: &AuthorSnapshot) -> ViewerContext {
        ViewerContext {
            viewer_id: self.viewer_id,
            viewer_follows_author: self.following.contains(&author.user_id),
            author_follows_viewer: self.followers.contains(&author.user_id),
            interest_overlap: jaccard_similarity(&self.interest_tags, &author.interest_tags),
        }
    }
}

/// Relationship flags between one viewer and one author
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerContext {
    pub viewer_id: Uuid,
    pub viewer_follows_author: bool,
    pub author_follows_viewer: bool,
    /// Jaccard overlap of viewer and author interest tags, `None` if either is untagged
    pub interest_overlap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Viewer is the author
    SelfAuthored,
    MutualFollow,
    /// Viewer follows the author, not the other way around
    OneWayFollow,
    DiverseInterest,
    NoRelationship,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::SelfAuthored => "self",
            Relationship::MutualFollow => "mutual_follow",
            Relationship::OneWayFollow => "one_way_follow",
            Relationship::DiverseInterest => "diverse_interest",
            Relationship::NoRelationship => "no_relationship",
        }
    }

    /// Viewer's own posts and followed authors
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Relationship::SelfAuthored | Relationship::MutualFollow | Relationship::OneWayFollow
        )
    }

    /// Content counted toward the discovery quota
    pub fn is_discovery(&self) -> bool {
        !self.is_network()
    }
}

/// Every intermediate value leading to a post's final score.
///
/// Built only through [`ScoreBreakdown::compose`] so the derived fields always
/// agree with their inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub temporal: f64,
    pub engagement: f64,
    pub audience: f64,
    pub content: f64,
    pub base_score: f64,
    pub network_multiplier: f64,
    pub network_adjusted_score: f64,
    pub verified_multiplier: f64,
    pub final_score: f64,
}

impl ScoreBreakdown {
    pub fn compose(
        temporal: f64,
        engagement: f64,
        audience: f64,
        content: f64,
        network_multiplier: f64,
        verified_multiplier: f64,
    ) -> Self {
        let base_score = temporal + engagement + audience + content;
        let network_adjusted_score = base_score * network_multiplier;
        let final_score = network_adjusted_score * verified_multiplier;

        Self {
            temporal,
            engagement,
            audience,
            content,
            base_score,
            network_multiplier,
            network_adjusted_score,
            verified_multiplier,
            final_score,
        }
    }

    /// `base_score * network_multiplier * verified_multiplier`
    pub fn recomputed_final(&self) -> f64 {
        self.base_score * self.network_multiplier * self.verified_multiplier
    }

    pub fn is_consistent(&self, tolerance: f64) -> bool {
        let scale = self.final_score.abs().max(1.0);
        let base = self.temporal + self.engagement + self.audience + self.content;

        self.final_score.is_finite()
            && (base - self.base_score).abs() <= tolerance * scale
            && (self.base_score * self.network_multiplier - self.network_adjusted_score).abs()
                <= tolerance * scale
            && (self.recomputed_final() - self.final_score).abs() <= tolerance * scale
    }

    /// Check the aggregation identity, failing with `BreakdownMismatch`
    pub fn verify(&self, post_id: Uuid) -> Result<()> {
        if self.is_consistent(BREAKDOWN_TOLERANCE) {
            Ok(())
        } else {
            Err(RankingError::BreakdownMismatch {
                post_id,
                final_score: self.final_score,
                recomputed: self.recomputed_final(),
            })
        }
    }
}

/// Raw inputs behind each component, kept for the explanation view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    // Temporal
    pub age_minutes: f64,
    pub engagement_velocity: f64,
    pub velocity_multiplier: f64,
    pub recency_band_score: f64,

    // Engagement
    pub raw_engagement: f64,
    pub authenticity_multiplier: f64,

    // Audience
    pub account_age_days: i64,
    pub account_age_points: f64,
    pub follower_points: f64,

    // Content
    pub content_length: usize,
    pub media_points: f64,
    pub poll_points: f64,
    pub length_points: f64,
    pub originality_points: f64,
    pub duplicate_score: f64,
}

/// A scored candidate: the post, how it relates to the viewer, and its breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPost {
    pub post: PostSnapshot,
    pub relationship: Relationship,
    pub breakdown: ScoreBreakdown,
    pub details: ScoreDetails,
}

impl ScoredPost {
    pub fn final_score(&self) -> f64 {
        self.breakdown.final_score
    }

    pub fn is_discovery(&self) -> bool {
        self.relationship.is_discovery()
    }

    /// Feed order: final score descending, then newest first, then id ascending
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .final_score()
            .total_cmp(&self.final_score())
            .then_with(|| other.post.created_at.cmp(&self.post.created_at))
            .then_with(|| self.post.id.cmp(&other.post.id))
    }
}

/// One page of the ranked feed
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub items: Vec<ScoredPost>,
    pub has_more: bool,
    /// Opaque token for the next page
    pub next_cursor: Option<String>,
    pub total_candidates: usize,
    pub discovery_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl FeedPage {
    pub fn find(&self, post_id: Uuid) -> Option<&ScoredPost> {
        self.items.iter().find(|item| item.post.id == post_id)
    }
}

/// A ranking request from the feed consumer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedRequest {
    /// `None` for anonymous viewers
    #[serde(default)]
    pub viewer: Option<Viewer>,
    /// Feed filter such as a hashtag
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(score: f64, created_at: DateTime<Utc>, id: Uuid) -> ScoredPost {
        ScoredPost {
            post: PostSnapshot {
                id,
                author_id: Uuid::new_v4(),
                created_at,
                content: String::new(),
                media_count: 0,
                has_poll: false,
                like_count: 0,
                repost_count: 0,
                reply_count: 0,
                view_count: 0,
                unique_engager_count: 0,
                recent_duplicate_score: None,
            },
            relationship: Relationship::NoRelationship,
            breakdown: ScoreBreakdown::compose(score, 0.0, 0.0, 0.0, 1.0, 1.0),
            details: ScoreDetails::default(),
        }
    }

    #[test]
    fn test_compose_verified_mutual_follow() {
        let breakdown = ScoreBreakdown::compose(50.0, 100.0, 30.0, 20.0, 2.0, 1.5);

        assert_eq!(breakdown.base_score, 200.0);
        assert_eq!(breakdown.network_adjusted_score, 400.0);
        assert_eq!(breakdown.final_score, 600.0);
        assert!(breakdown.verify(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_tampered_breakdown_fails_verification() {
        let mut breakdown = ScoreBreakdown::compose(10.0, 10.0, 10.0, 10.0, 1.0, 1.0);
        breakdown.final_score += 1.0;

        assert!(!breakdown.is_consistent(BREAKDOWN_TOLERANCE));
        assert!(matches!(
            breakdown.verify(Uuid::new_v4()),
            Err(RankingError::BreakdownMismatch { .. })
        ));
    }

    #[test]
    fn test_rank_cmp_tie_breaks() {
        let now = Utc::now();
        let older = now - chrono::Duration::hours(1);
        let low_id = Uuid::from_u128(1);
        let high_id = Uuid::from_u128(2);

        let mut posts = vec![
            scored(10.0, older, low_id),
            scored(10.0, now, high_id),
            scored(10.0, now, low_id),
            scored(20.0, older, high_id),
        ];
        posts.sort_by(|a, b| a.rank_cmp(b));

        assert_eq!(posts[0].final_score(), 20.0);
        assert_eq!((posts[1].post.created_at, posts[1].post.id), (now, low_id));
        assert_eq!((posts[2].post.created_at, posts[2].post.id), (now, high_id));
        assert_eq!(posts[3].post.created_at, older);
    }

    #[test]
    fn test_relationship_classes() {
        assert!(Relationship::SelfAuthored.is_network());
        assert!(Relationship::MutualFollow.is_network());
        assert!(Relationship::OneWayFollow.is_network());
        assert!(Relationship::DiverseInterest.is_discovery());
        assert!(Relationship::NoRelationship.is_discovery());
    }

    #[test]
    fn test_viewer_context_flags() {
        let author_id = Uuid::new_v4();
        let author = AuthorSnapshot {
            user_id: author_id,
            account_created_at: Utc::now(),
            follower_count: 0,
            verified: false,
            interest_tags: vec!["rust".to_string()],
        };
        let viewer = Viewer::new(Uuid::new_v4())
            .following(author_id)
            .with_interests(vec!["rust".to_string(), "design".to_string()]);

        let ctx = viewer.context_for(&author);
        assert!(ctx.viewer_follows_author);
        assert!(!ctx.author_follows_viewer);
        assert_eq!(ctx.interest_overlap, Some(0.5));
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let json = format!(
            r#"{{"id":"{}","author_id":"{}","created_at":"2026-01-01T00:00:00Z"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let post: PostSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(post.total_engagement(), 0);
        assert_eq!(post.media_count, 0);
        assert!(post.content.is_empty());
        assert!(post.recent_duplicate_score.is_none());
    }
}
