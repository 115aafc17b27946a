use crate::error::{RankingError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub weights: ScoringWeights,
}

/// Service-level settings, read from `DISCOVERY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Batches larger than this are scored in parallel chunks
    #[serde(default = "default_parallel_scoring_threshold")]
    pub parallel_scoring_threshold: usize,
    /// JSON file with scoring weight overrides
    #[serde(default)]
    pub weights_path: Option<String>,
    #[serde(default)]
    pub log_json: bool,
}

fn default_service_name() -> String {
    "discovery-ranking".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_cache_max_entries() -> u64 {
    10_000
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    50
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

fn default_parallel_scoring_threshold() -> usize {
    256
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
            parallel_scoring_threshold: default_parallel_scoring_threshold(),
            weights_path: None,
            log_json: false,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(RankingError::InvalidConfig(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(RankingError::InvalidConfig(format!(
                "default_page_size must be within 1..={}",
                self.max_page_size
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(RankingError::InvalidConfig(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let service = envy::prefixed("DISCOVERY_")
            .from_env::<ServiceConfig>()
            .map_err(|e| RankingError::InvalidConfig(format!("environment: {}", e)))?;
        service.validate()?;

        let weights = match service.weights_path.as_deref() {
            Some(path) => ScoringWeights::from_file(path)?,
            None => ScoringWeights::default(),
        };
        weights.validate()?;

        Ok(Self { service, weights })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            weights: ScoringWeights::default(),
        }
    }
}

// ============================================
// Scoring weights
// ============================================

/// Every tunable number used by the scorers.
///
/// All sections default independently, so a weights file (or a runtime patch)
/// only needs the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub temporal: TemporalWeights,
    pub engagement: EngagementWeights,
    pub audience: AudienceWeights,
    pub content: ContentWeights,
    pub network: NetworkWeights,
    pub verification: VerificationWeights,
    pub diversity: DiversityWeights,
}

/// Recency band with an exclusive upper bound on post age
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyBand {
    pub max_age_minutes: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalWeights {
    pub bands: Vec<RecencyBand>,
    /// Score for posts older than the last band
    pub stale_score: f64,
    /// Engagements per hour that add +1.0 to the velocity multiplier
    pub velocity_scale: f64,
    pub max_velocity_multiplier: f64,
    /// Floor on post age when computing velocity
    pub min_age_hours: f64,
}

impl Default for TemporalWeights {
    fn default() -> Self {
        let band = |max_age_minutes, score| RecencyBand {
            max_age_minutes,
            score,
        };
        Self {
            bands: vec![
                band(10.0, 100.0),
                band(30.0, 80.0),
                band(60.0, 60.0),
                band(120.0, 40.0),
                band(360.0, 20.0),
                band(720.0, 10.0),
                band(1440.0, 5.0),
            ],
            stale_score: 1.0,
            velocity_scale: 600.0,
            max_velocity_multiplier: 3.0,
            min_age_hours: 1.0 / 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub reply: f64,
    pub repost: f64,
    pub like: f64,
    pub view: f64,
    pub authenticity_per_engager: f64,
    pub max_authenticity_multiplier: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            reply: 25.0,
            repost: 15.0,
            like: 5.0,
            view: 0.5,
            authenticity_per_engager: 0.05,
            max_authenticity_multiplier: 3.0,
        }
    }
}

/// Account-age band with an exclusive upper bound in days
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountAgeBand {
    pub max_age_days: i64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceWeights {
    pub bands: Vec<AccountAgeBand>,
    /// Score for accounts older than the last band
    pub established_score: f64,
    pub points_per_follower: f64,
    pub max_follower_points: f64,
}

impl Default for AudienceWeights {
    fn default() -> Self {
        Self {
            bands: vec![
                AccountAgeBand {
                    max_age_days: 30,
                    score: 50.0,
                },
                AccountAgeBand {
                    max_age_days: 180,
                    score: 30.0,
                },
            ],
            established_score: 10.0,
            points_per_follower: 0.1,
            max_follower_points: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentWeights {
    pub media: f64,
    pub poll: f64,
    pub optimal_length: f64,
    pub optimal_length_min: usize,
    pub optimal_length_max: usize,
    /// Points for a fully original post (heuristic score 1.0)
    pub originality_max: f64,
    pub originality: OriginalityRules,
}

impl Default for ContentWeights {
    fn default() -> Self {
        Self {
            media: 15.0,
            poll: 12.0,
            optimal_length: 8.0,
            optimal_length_min: 50,
            optimal_length_max: 500,
            originality_max: 20.0,
            originality: OriginalityRules::default(),
        }
    }
}

/// Terms of the originality heuristic; the result is clamped to 0.0 - 1.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginalityRules {
    /// Lowercase phrases treated as spam or engagement bait
    pub spam_phrases: Vec<String>,
    pub spam_penalty: f64,
    pub long_content_chars: usize,
    pub long_content_bonus: f64,
    pub question_bonus: f64,
    pub hashtag_bonus: f64,
    pub mention_bonus: f64,
}

impl Default for OriginalityRules {
    fn default() -> Self {
        Self {
            spam_phrases: ["follow me", "like this if", "comment below", "share this", "check out my"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            spam_penalty: 0.3,
            long_content_chars: 100,
            long_content_bonus: 0.3,
            question_bonus: 0.2,
            hashtag_bonus: 0.1,
            mention_bonus: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkWeights {
    pub self_authored: f64,
    pub mutual_follow: f64,
    pub one_way_follow: f64,
    pub diverse_interest: f64,
    pub no_relationship: f64,
    /// Interest overlap strictly below this counts as diverse-interest
    pub diverse_interest_max_overlap: f64,
}

impl Default for NetworkWeights {
    fn default() -> Self {
        Self {
            self_authored: 1.5,
            mutual_follow: 2.0,
            one_way_follow: 1.5,
            diverse_interest: 1.2,
            no_relationship: 1.0,
            diverse_interest_max_overlap: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationWeights {
    pub verified_multiplier: f64,
}

impl Default for VerificationWeights {
    fn default() -> Self {
        Self {
            verified_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityWeights {
    /// Minimum share of discovery content per result window
    pub discovery_floor: f64,
}

impl Default for DiversityWeights {
    fn default() -> Self {
        Self {
            discovery_floor: 0.3,
        }
    }
}

impl ScoringWeights {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RankingError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let weights: ScoringWeights = serde_json::from_str(raw)
            .map_err(|e| RankingError::InvalidConfig(format!("weights: {}", e)))?;
        weights.validate()?;
        Ok(weights)
    }

    /// Deep-merge a partial JSON object over these weights and validate the result
    pub fn merge_patch(&self, patch: &Value) -> Result<Self> {
        if !patch.is_object() {
            return Err(RankingError::InvalidConfig(
                "weights patch must be a JSON object".to_string(),
            ));
        }

        let mut merged = serde_json::to_value(self)
            .map_err(|e| RankingError::Internal(format!("weights serialization: {}", e)))?;
        merge_json(&mut merged, patch);

        let weights: ScoringWeights = serde_json::from_value(merged)
            .map_err(|e| RankingError::InvalidConfig(format!("weights patch: {}", e)))?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.temporal;
        if t.bands.is_empty() {
            return invalid("temporal.bands must not be empty");
        }
        for pair in t.bands.windows(2) {
            if pair[1].max_age_minutes <= pair[0].max_age_minutes {
                return invalid("temporal.bands must have ascending age bounds");
            }
            if pair[1].score > pair[0].score {
                return invalid("temporal.bands scores must not increase with age");
            }
        }
        if t.bands.iter().any(|b| b.score < 0.0) || t.stale_score < 0.0 {
            return invalid("temporal scores must be non-negative");
        }
        if t.bands.last().is_some_and(|b| b.score < t.stale_score) {
            return invalid("temporal.stale_score must not exceed the last band score");
        }
        if t.velocity_scale <= 0.0 || t.min_age_hours <= 0.0 {
            return invalid("temporal.velocity_scale and min_age_hours must be positive");
        }
        if t.max_velocity_multiplier < 1.0 {
            return invalid("temporal.max_velocity_multiplier must be at least 1.0");
        }

        let e = &self.engagement;
        if [e.reply, e.repost, e.like, e.view, e.authenticity_per_engager]
            .iter()
            .any(|w| *w < 0.0)
        {
            return invalid("engagement weights must be non-negative");
        }
        if e.max_authenticity_multiplier < 1.0 {
            return invalid("engagement.max_authenticity_multiplier must be at least 1.0");
        }

        let a = &self.audience;
        for pair in a.bands.windows(2) {
            if pair[1].max_age_days <= pair[0].max_age_days {
                return invalid("audience.bands must have ascending age bounds");
            }
        }
        if a.bands.iter().any(|b| b.score < 0.0)
            || a.established_score < 0.0
            || a.points_per_follower < 0.0
            || a.max_follower_points < 0.0
        {
            return invalid("audience weights must be non-negative");
        }

        let c = &self.content;
        if [c.media, c.poll, c.optimal_length, c.originality_max]
            .iter()
            .any(|w| *w < 0.0)
        {
            return invalid("content weights must be non-negative");
        }
        if c.optimal_length_min > c.optimal_length_max {
            return invalid("content.optimal_length_min must not exceed optimal_length_max");
        }

        let n = &self.network;
        if [
            n.self_authored,
            n.mutual_follow,
            n.one_way_follow,
            n.diverse_interest,
            n.no_relationship,
        ]
        .iter()
        .any(|m| *m <= 0.0)
        {
            return invalid("network multipliers must be positive");
        }
        if !(0.0..=1.0).contains(&n.diverse_interest_max_overlap) {
            return invalid("network.diverse_interest_max_overlap must be within 0.0..=1.0");
        }

        if self.verification.verified_multiplier <= 0.0 {
            return invalid("verification.verified_multiplier must be positive");
        }

        if !(0.0..=1.0).contains(&self.diversity.discovery_floor) {
            return invalid("diversity.discovery_floor must be within 0.0..=1.0");
        }

        Ok(())
    }
}

fn invalid(message: &str) -> Result<()> {
    Err(RankingError::InvalidConfig(message.to_string()))
}

fn merge_json(target: &mut Value, patch: &Value) {
    if let (Some(target_map), Value::Object(patch_map)) = (target.as_object_mut(), patch) {
        for (key, value) in patch_map {
            merge_json(target_map.entry(key.clone()).or_insert(Value::Null), value);
        }
        return;
    }
    *target = patch.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_weights_are_valid() {
        assert!(ScoringWeights::default().validate().is_ok());
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_weights_file_keeps_defaults() {
        let weights = ScoringWeights::from_json(r#"{"engagement": {"like": 7.5}}"#).unwrap();

        assert_eq!(weights.engagement.like, 7.5);
        assert_eq!(weights.engagement.reply, 25.0);
        assert_eq!(weights.network, NetworkWeights::default());
    }

    #[test]
    fn test_merge_patch_deep_merges() {
        let base = ScoringWeights::default();
        let patched = base
            .merge_patch(&json!({
                "network": { "mutual_follow": 2.5 },
                "diversity": { "discovery_floor": 0.4 }
            }))
            .unwrap();

        assert_eq!(patched.network.mutual_follow, 2.5);
        assert_eq!(patched.network.one_way_follow, 1.5);
        assert_eq!(patched.diversity.discovery_floor, 0.4);
        assert_eq!(patched.temporal, base.temporal);
    }

    #[test]
    fn test_merge_patch_rejects_invalid_values() {
        let base = ScoringWeights::default();

        assert!(matches!(
            base.merge_patch(&json!({ "diversity": { "discovery_floor": 1.5 } })),
            Err(RankingError::InvalidConfig(_))
        ));
        assert!(matches!(
            base.merge_patch(&json!([1, 2, 3])),
            Err(RankingError::InvalidConfig(_))
        ));
        assert!(matches!(
            base.merge_patch(&json!({ "engagement": { "like": "many" } })),
            Err(RankingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_increasing_band_scores() {
        let mut weights = ScoringWeights::default();
        weights.temporal.bands[1].score = 150.0;
        assert!(weights.validate().is_err());

        let mut weights = ScoringWeights::default();
        weights.temporal.bands.clear();
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_caps() {
        let mut weights = ScoringWeights::default();
        weights.engagement.max_authenticity_multiplier = 0.5;
        assert!(weights.validate().is_err());

        let mut weights = ScoringWeights::default();
        weights.temporal.velocity_scale = 0.0;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_service_config_page_bounds() {
        let config = ServiceConfig {
            default_page_size: 80,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
