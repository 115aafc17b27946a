use crate::config::{ContentWeights, OriginalityRules};
use crate::models::{Candidate, PostSnapshot};
use std::collections::HashMap;
use uuid::Uuid;

/// Characters of normalized content compared for duplicates
const DUPLICATE_PREFIX_CHARS: usize = 200;
/// Shorter normalized content is never treated as a duplicate
const DUPLICATE_MIN_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentScore {
    pub score: f64,
    pub content_length: usize,
    pub media_points: f64,
    pub poll_points: f64,
    pub length_points: f64,
    pub originality_points: f64,
    pub duplicate_score: f64,
}

/// Structural quality bonuses: media, poll, length, originality
pub struct ContentScorer<'a> {
    weights: &'a ContentWeights,
}

impl<'a> ContentScorer<'a> {
    pub fn new(weights: &'a ContentWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, post: &PostSnapshot, duplicate_score: f64) -> ContentScore {
        let content_length = post.content.chars().count();
        let duplicate_score = duplicate_score.clamp(0.0, 1.0);

        let media_points = if post.media_count > 0 {
            self.weights.media
        } else {
            0.0
        };
        let poll_points = if post.has_poll { self.weights.poll } else { 0.0 };
        let length_points = if (self.weights.optimal_length_min..=self.weights.optimal_length_max)
            .contains(&content_length)
        {
            self.weights.optimal_length
        } else {
            0.0
        };
        let originality_points = originality(&post.content, &self.weights.originality)
            * (1.0 - duplicate_score)
            * self.weights.originality_max;

        ContentScore {
            score: media_points + poll_points + length_points + originality_points,
            content_length,
            media_points,
            poll_points,
            length_points,
            originality_points,
            duplicate_score,
        }
    }
}

/// Originality heuristic in 0.0 - 1.0.
///
/// Spam and engagement-bait phrases subtract; substantial length, questions,
/// hashtags and mentions add.
pub fn originality(content: &str, rules: &OriginalityRules) -> f64 {
    let lowered = content.to_lowercase();
    let mut score = 0.0;

    for phrase in &rules.spam_phrases {
        if !phrase.is_empty() && lowered.contains(phrase.to_lowercase().as_str()) {
            score -= rules.spam_penalty;
        }
    }

    if content.chars().count() > rules.long_content_chars {
        score += rules.long_content_bonus;
    }
    if content.contains('?') {
        score += rules.question_bonus;
    }
    if content.contains('#') {
        score += rules.hashtag_bonus;
    }
    if content.contains('@') {
        score += rules.mention_bonus;
    }

    f64::clamp(score, 0.0, 1.0)
}

/// Same-author near-duplicate detection across one candidate batch.
///
/// Content is trimmed, lowercased and cut to its first 200 characters; a group
/// of `c > 1` identical posts by one author scores `min(1, (c - 1) / 3)`.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    counts: HashMap<(Uuid, String), usize>,
}

impl DuplicateIndex {
    pub fn build(candidates: &[Candidate]) -> Self {
        let mut counts = HashMap::new();
        for candidate in candidates {
            if let Some(key) = normalize(&candidate.post.content) {
                *counts.entry((candidate.post.author_id, key)).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    /// A score supplied by the data layer wins over the batch estimate
    pub fn score_for(&self, post: &PostSnapshot) -> f64 {
        if let Some(score) = post.recent_duplicate_score {
            return score.clamp(0.0, 1.0);
        }

        normalize(&post.content)
            .and_then(|key| self.counts.get(&(post.author_id, key)))
            .filter(|count| **count > 1)
            .map(|count| ((*count - 1) as f64 / 3.0).min(1.0))
            .unwrap_or(0.0)
    }
}

fn normalize(content: &str) -> Option<String> {
    let normalized: String = content
        .trim()
        .to_lowercase()
        .chars()
        .take(DUPLICATE_PREFIX_CHARS)
        .collect();

    if normalized.chars().count() > DUPLICATE_MIN_CHARS {
        Some(normalized)
    } else {
        None
    }
}
