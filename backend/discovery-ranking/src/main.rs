use anyhow::{Context, Result};
use discovery_ranking::{
    models::{Candidate, FeedPage, FeedRequest, Viewer},
    services::PostExplanation,
    Config, FeedRankingService, InMemoryCandidateSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Candidate batch plus request parameters, as handed over by the data layer
#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    viewer: Option<Viewer>,
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Output<'a> {
    page: &'a FeedPage,
    explanations: Vec<PostExplanation>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load config")?;

    // Initialize tracing; stdout carries the ranked page
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.service.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let path = std::env::args()
        .nth(1)
        .context("usage: discovery-ranking <snapshot.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", path))?;
    let snapshot: Snapshot =
        serde_json::from_str(&raw).with_context(|| format!("invalid snapshot {}", path))?;

    let source = Arc::new(InMemoryCandidateSource::new(snapshot.candidates));
    info!(
        "Starting {} with {} candidates",
        config.service.service_name,
        source.len()
    );

    let service = FeedRankingService::new(config, source)?;

    let request = FeedRequest {
        viewer: snapshot.viewer,
        filter: snapshot.filter,
        cursor: snapshot.cursor,
        limit: snapshot.limit,
    };
    let page = service.rank_feed(&request).await?;

    let output = Output {
        page: page.as_ref(),
        explanations: page.items.iter().map(PostExplanation::from_scored).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
