use crate::models::ScoredPost;
use std::collections::VecDeque;
use tracing::debug;

/// Guard so `0.3 * 10` lands on 3 rather than 4 after float rounding
const QUOTA_EPSILON: f64 = 1e-9;

/// Diversity Layer - discovery floor re-ranking.
///
/// Walks a score-sorted list one window at a time. Whenever discovery posts
/// (no follow relationship to the viewer) make up less than the floor of a
/// window, the best remaining discovery post is swapped in for the
/// lowest-scoring network post of that window. The displaced post goes back
/// to the head of the remainder so it leads the next window.
pub struct DiversityLayer {
    discovery_floor: f64,
}

impl Default for DiversityLayer {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl DiversityLayer {
    pub fn new(discovery_floor: f64) -> Self {
        Self {
            discovery_floor: discovery_floor.clamp(0.0, 1.0),
        }
    }

    /// Discovery posts a window of `window_len` must contain
    pub fn required_discovery(&self, window_len: usize) -> usize {
        let quota = (self.discovery_floor * window_len as f64 - QUOTA_EPSILON).ceil();
        (quota.max(0.0) as usize).min(window_len)
    }

    /// Re-rank `posts` (already in feed order) in windows of `window` items.
    ///
    /// Never drops or duplicates a post. When the pool runs out of discovery
    /// posts a window keeps whatever it has.
    pub fn rerank(&self, posts: Vec<ScoredPost>, window: usize) -> Vec<ScoredPost> {
        if window == 0 || posts.is_empty() {
            return posts;
        }

        let mut output = Vec::with_capacity(posts.len());
        let mut remaining: VecDeque<ScoredPost> = posts.into();

        while !remaining.is_empty() {
            let take = window.min(remaining.len());
            let mut page: Vec<ScoredPost> = remaining.drain(..take).collect();
            self.enforce_floor(&mut page, &mut remaining);
            output.extend(page);
        }

        output
    }

    fn enforce_floor(&self, page: &mut Vec<ScoredPost>, remaining: &mut VecDeque<ScoredPost>) {
        let required = self.required_discovery(page.len());
        let mut discovery = page.iter().filter(|p| p.is_discovery()).count();
        let mut swaps = 0;

        while discovery < required {
            let Some(incoming_idx) = remaining.iter().position(|p| p.is_discovery()) else {
                break;
            };
            let Some(outgoing_idx) = page.iter().rposition(|p| !p.is_discovery()) else {
                break;
            };
            let Some(incoming) = remaining.remove(incoming_idx) else {
                break;
            };

            let displaced = page.remove(outgoing_idx);
            remaining.push_front(displaced);
            page.push(incoming);
            discovery += 1;
            swaps += 1;
        }

        if swaps > 0 {
            page.sort_by(|a, b| a.rank_cmp(b));
            debug!(
                swaps = swaps,
                required = required,
                discovery = discovery,
                window = page.len(),
                "Applied discovery floor"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostSnapshot, Relationship, ScoreBreakdown, ScoreDetails};
    use chrono::Utc;
    use uuid::Uuid;

    fn scored(score: f64, relationship: Relationship) -> ScoredPost {
        ScoredPost {
            post: PostSnapshot {
                id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                created_at: Utc::now(),
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
            relationship,
            breakdown: ScoreBreakdown::compose(score, 0.0, 0.0, 0.0, 1.0, 1.0),
            details: ScoreDetails::default(),
        }
    }

    fn sorted(mut posts: Vec<ScoredPost>) -> Vec<ScoredPost> {
        posts.sort_by(|a, b| a.rank_cmp(b));
        posts
    }

    #[test]
    fn test_required_discovery() {
        let layer = DiversityLayer::default();

        assert_eq!(layer.required_discovery(0), 0);
        assert_eq!(layer.required_discovery(1), 1);
        assert_eq!(layer.required_discovery(3), 1);
        assert_eq!(layer.required_discovery(4), 2);
        assert_eq!(layer.required_discovery(10), 3);
        assert_eq!(layer.required_discovery(20), 6);
        assert_eq!(layer.required_discovery(50), 15);
    }

    #[test]
    fn test_floor_pulls_discovery_into_window() {
        let layer = DiversityLayer::default();

        let mut posts: Vec<ScoredPost> = (0..10)
            .map(|i| scored(1000.0 - i as f64, Relationship::MutualFollow))
            .collect();
        posts.extend((0..5).map(|i| scored(100.0 - i as f64, Relationship::NoRelationship)));
        let posts = sorted(posts);

        let reranked = layer.rerank(posts, 10);

        assert_eq!(reranked.len(), 15);
        let first_window = &reranked[..10];
        assert_eq!(first_window.iter().filter(|p| p.is_discovery()).count(), 3);

        // The three best network posts survive, the weakest are displaced
        let network_scores: Vec<f64> = first_window
            .iter()
            .filter(|p| !p.is_discovery())
            .map(|p| p.final_score())
            .collect();
        assert_eq!(network_scores.first(), Some(&1000.0));
        assert_eq!(network_scores.last(), Some(&994.0));

        // Best discovery posts were the ones pulled forward
        let discovery_scores: Vec<f64> = first_window
            .iter()
            .filter(|p| p.is_discovery())
            .map(|p| p.final_score())
            .collect();
        assert_eq!(discovery_scores, vec![100.0, 99.0, 98.0]);
    }

    #[test]
    fn test_window_stays_sorted_after_swaps() {
        let layer = DiversityLayer::default();
        let mut posts: Vec<ScoredPost> = (0..8)
            .map(|i| scored(500.0 - i as f64, Relationship::OneWayFollow))
            .collect();
        posts.push(scored(10.0, Relationship::DiverseInterest));
        posts.push(scored(9.0, Relationship::NoRelationship));
        posts.push(scored(8.0, Relationship::NoRelationship));

        let reranked = layer.rerank(sorted(posts), 10);

        for pair in reranked[..10].windows(2) {
            assert!(pair[0].final_score() >= pair[1].final_score());
        }
    }

    #[test]
    fn test_insufficient_discovery_fills_with_what_exists() {
        let layer = DiversityLayer::default();
        let mut posts: Vec<ScoredPost> = (0..12)
            .map(|i| scored(300.0 - i as f64, Relationship::SelfAuthored))
            .collect();
        posts.push(scored(1.0, Relationship::NoRelationship));

        let reranked = layer.rerank(sorted(posts), 10);

        assert_eq!(reranked.len(), 13);
        assert_eq!(reranked[..10].iter().filter(|p| p.is_discovery()).count(), 1);
    }

    #[test]
    fn test_no_network_content_is_untouched() {
        let layer = DiversityLayer::default();
        let posts = sorted(
            (0..12)
                .map(|i| scored(50.0 - i as f64, Relationship::NoRelationship))
                .collect(),
        );
        let expected: Vec<Uuid> = posts.iter().map(|p| p.post.id).collect();

        let reranked = layer.rerank(posts, 10);

        let actual: Vec<Uuid> = reranked.iter().map(|p| p.post.id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_every_window_honors_floor_while_supply_lasts() {
        let layer = DiversityLayer::default();
        let mut posts: Vec<ScoredPost> = (0..30)
            .map(|i| scored(1000.0 - i as f64, Relationship::MutualFollow))
            .collect();
        posts.extend((0..9).map(|i| scored(10.0 - i as f64, Relationship::NoRelationship)));

        let reranked = layer.rerank(sorted(posts), 10);

        assert_eq!(reranked.len(), 39);
        for window in reranked.chunks(10).take(3) {
            assert!(window.iter().filter(|p| p.is_discovery()).count() >= 3);
        }
    }

    #[test]
    fn test_zero_window_is_identity() {
        let layer = DiversityLayer::default();
        let posts = sorted(vec![
            scored(3.0, Relationship::MutualFollow),
            scored(2.0, Relationship::MutualFollow),
        ]);
        let expected: Vec<Uuid> = posts.iter().map(|p| p.post.id).collect();

        let reranked = layer.rerank(posts, 0);

        assert_eq!(reranked.iter().map(|p| p.post.id).collect::<Vec<_>>(), expected);
    }
}
