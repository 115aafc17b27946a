pub mod cache;
pub mod diversity;
pub mod engine;
pub mod explain;
pub mod feed;
pub mod network;
pub mod ranking;
pub mod scoring;

pub use cache::{FeedCache, Fingerprint};
pub use diversity::DiversityLayer;
pub use engine::DiscoveryEngine;
pub use explain::{explain, PostExplanation};
pub use feed::{CandidateSource, FeedRankingService, InMemoryCandidateSource};
pub use network::RelationshipResolver;
pub use ranking::RankingLayer;
pub use scoring::PostScorer;
