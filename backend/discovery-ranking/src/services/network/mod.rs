//! Network relationship resolution and the verification multiplier.
//!
//! Resolution order is Self, Mutual, One-way, Diverse-interest, None. Self and
//! one-way follow share a multiplier but stay distinct states because the
//! diversity layer counts them as network content.

use crate::config::{NetworkWeights, VerificationWeights};
use crate::models::{AuthorSnapshot, Relationship, ViewerContext};
use uuid::Uuid;

pub struct RelationshipResolver<'a> {
    weights: &'a NetworkWeights,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(weights: &'a NetworkWeights) -> Self {
        Self { weights }
    }

    /// A missing viewer context always resolves to `NoRelationship`
    pub fn resolve(&self, context: Option<&ViewerContext>, author_id: Uuid) -> Relationship {
        let Some(ctx) = context else {
            return Relationship::NoRelationship;
        };

        if ctx.viewer_id == author_id {
            Relationship::SelfAuthored
        } else if ctx.viewer_follows_author && ctx.author_follows_viewer {
            Relationship::MutualFollow
        } else if ctx.viewer_follows_author {
            Relationship::OneWayFollow
        } else if self.is_diverse_interest(ctx) {
            Relationship::DiverseInterest
        } else {
            Relationship::NoRelationship
        }
    }

    /// Neither side follows the other, both are tagged, and their interests
    /// barely overlap
    fn is_diverse_interest(&self, ctx: &ViewerContext) -> bool {
        !ctx.author_follows_viewer
            && ctx
                .interest_overlap
                .is_some_and(|overlap| overlap < self.weights.diverse_interest_max_overlap)
    }

    pub fn multiplier(&self, relationship: Relationship) -> f64 {
        match relationship {
            Relationship::SelfAuthored => self.weights.self_authored,
            Relationship::MutualFollow => self.weights.mutual_follow,
            Relationship::OneWayFollow => self.weights.one_way_follow,
            Relationship::DiverseInterest => self.weights.diverse_interest,
            Relationship::NoRelationship => self.weights.no_relationship,
        }
    }
}

pub fn verification_multiplier(author: &AuthorSnapshot, weights: &VerificationWeights) -> f64 {
    if author.verified {
        weights.verified_multiplier
    } else {
        1.0
    }
}
