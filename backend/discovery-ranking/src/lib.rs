pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{Config, ScoringWeights, ServiceConfig};
pub use error::{RankingError, Result};
pub use services::{
    CandidateSource, DiscoveryEngine, DiversityLayer, FeedCache, FeedRankingService,
    InMemoryCandidateSource, RankingLayer,
};
