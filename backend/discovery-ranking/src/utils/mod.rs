// Utility functions for discovery-ranking

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Divide with a floor on the denominator so a zero or tiny age can never
/// produce `NaN` or `Inf`.
pub fn safe_div(numerator: f64, denominator: f64, epsilon: f64) -> f64 {
    numerator / denominator.max(epsilon)
}

/// Minutes elapsed between `from` and `now`, clamped to zero for clock skew.
pub fn elapsed_minutes(from: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - from).num_milliseconds().max(0);
    millis as f64 / 60_000.0
}

/// Whole days elapsed between `from` and `now`, clamped to zero.
pub fn elapsed_days(from: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - from).num_days().max(0)
}

/// Jaccard similarity between two tag lists (case-insensitive).
///
/// Returns `None` when either side has no tags, since overlap is undefined.
pub fn jaccard_similarity(left: &[String], right: &[String]) -> Option<f64> {
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let left: HashSet<String> = left.iter().map(|t| t.trim().to_lowercase()).collect();
    let right: HashSet<String> = right.iter().map(|t| t.trim().to_lowercase()).collect();

    let union = left.union(&right).count();
    if union == 0 {
        return None;
    }

    let intersection = left.intersection(&right).count();
    Some(intersection as f64 / union as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_safe_div_guards_zero() {
        let value = safe_div(10.0, 0.0, 0.5);
        assert!((value - 20.0).abs() < 1e-9);
        assert!(value.is_finite());
    }

    #[test]
    fn test_elapsed_minutes_clamps_future_timestamps() {
        let now = Utc::now();
        assert_eq!(elapsed_minutes(now + Duration::minutes(5), now), 0.0);
        assert!((elapsed_minutes(now - Duration::minutes(90), now) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_days() {
        let now = Utc::now();
        assert_eq!(elapsed_days(now - Duration::days(45), now), 45);
        assert_eq!(elapsed_days(now + Duration::days(2), now), 0);
    }

    #[test]
    fn test_jaccard_similarity() {
        let score = jaccard_similarity(&tags(&["rust", "gamedev"]), &tags(&["Rust", "Gamedev"]));
        assert_eq!(score, Some(1.0));

        let score = jaccard_similarity(&tags(&["rust", "gamedev"]), &tags(&["rust", "design"]))
            .unwrap();
        assert!((score - 1.0 / 3.0).abs() < 1e-9);

        assert_eq!(
            jaccard_similarity(&tags(&["rust"]), &tags(&["design"])),
            Some(0.0)
        );
        assert_eq!(jaccard_similarity(&[], &tags(&["design"])), None);
    }
}
