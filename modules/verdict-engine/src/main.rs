use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ai_client::Claude;
use verdict_common::{AppConfig, FileConfig, Indicator, Issue, MeasureType};
use verdict_engine::{
    ClaudeClassifier, DetectionSettings, Detector, HttpIndicatorSource, IndicatorRefresher,
    IndicatorService, RepresentativeSynthesizer, ResolutionEngine, ResolutionSweeper, RssFeed,
};
use verdict_store::{MemoryStore, PgStore, Store};

#[derive(Parser)]
#[command(name = "verdict", about = "Track public decisions and resolve their outcomes")]
struct Cli {
    /// Path to policy TOML file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch feeds and create Decisions for new events
    Detect,
    /// Record every indicator window that has come due
    RefreshIndicators,
    /// Resolve every mature, unresolved Decision
    ResolveSweep,
    /// Resolve one Decision now
    Resolve { decision: Uuid },
    /// Record one indicator measurement by hand
    Record {
        decision: Uuid,
        indicator: String,
        /// baseline, 30d, 90d, 180d or 365d
        window: MeasureType,
        value: f64,
        /// RFC 3339 observation date; now when omitted
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
    /// Replace a Decision's resolution with an operator verdict
    Override {
        decision: Uuid,
        /// works, partial or fails
        issue: Issue,
        confidence: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Register an indicator definition
    RegisterIndicator {
        id: String,
        name: String,
        #[arg(long, default_value = "manual")]
        source_kind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("verdict_engine=info,verdict_store=info,ai_client=info"));
    if cli.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let file_config = match &cli.config {
        Some(path) => {
            info!(config = %path.display(), "Loading config");
            FileConfig::load(path)?
        }
        None => FileConfig::default(),
    };
    let config = AppConfig::from_env()?;
    let store = connect_store(&config).await?;

    match cli.command {
        Command::Detect => {
            let detector = build_detector(&config, &file_config, store)?;
            let report = detector.run_detection().await;
            println!("{report}");
        }
        Command::RefreshIndicators => {
            let url = config
                .indicator_source_url
                .as_deref()
                .context("INDICATOR_SOURCE_URL is required for refresh-indicators")?;
            let source = Arc::new(HttpIndicatorSource::new(url)?);
            let report = IndicatorRefresher::new(store, source)
                .run_indicator_refresh()
                .await?;
            println!("{report}");
        }
        Command::ResolveSweep => {
            let engine = ResolutionEngine::new(store.clone(), file_config.resolution.clone());
            let report = ResolutionSweeper::new(store, engine)
                .run_resolution_sweep()
                .await?;
            println!("{report}");
        }
        Command::Resolve { decision } => {
            let engine = ResolutionEngine::new(store, file_config.resolution.clone());
            let resolution = engine.resolve_by_id(decision).await?;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Command::Record {
            decision,
            indicator,
            window,
            value,
            date,
        } => {
            let service = IndicatorService::new(store);
            let point = service
                .record(decision, &indicator, window, value, date.unwrap_or_else(Utc::now))
                .await?;
            println!("{}", serde_json::to_string_pretty(&point)?);
        }
        Command::Override {
            decision,
            issue,
            confidence,
            note,
        } => {
            let engine = ResolutionEngine::new(store, file_config.resolution.clone());
            let resolution = engine
                .resolve_manual(decision, issue, confidence, note)
                .await?;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Command::RegisterIndicator {
            id,
            name,
            source_kind,
        } => {
            let service = IndicatorService::new(store);
            let indicator = service
                .register(&Indicator {
                    id,
                    name,
                    source_kind,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&indicator)?);
        }
    }

    Ok(())
}

async fn connect_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            store.migrate().await.context("Failed to run migrations")?;
            info!("Connected to Postgres");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store (nothing persists)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_detector(
    config: &AppConfig,
    file_config: &FileConfig,
    store: Arc<dyn Store>,
) -> Result<Detector> {
    let classifier_timeout = Duration::from_secs(config.classifier_timeout_secs);
    let settings = DetectionSettings::from_config(file_config, classifier_timeout);
    let synthesizer = Arc::new(RepresentativeSynthesizer::new(
        file_config.detection.default_indicator_ids.clone(),
    ));

    let mut detector = Detector::new(store, synthesizer, settings);
    for url in &config.feed_urls {
        detector = detector.with_feed(Arc::new(RssFeed::new(url.as_str())?));
    }
    if config.feed_urls.is_empty() {
        warn!("FEED_URLS not set, detection has nothing to fetch");
    }

    match &config.anthropic_api_key {
        Some(key) => {
            let claude = Claude::new(key.as_str(), config.classifier_model.as_str())
                .with_timeout(classifier_timeout);
            detector = detector.with_classifier(Arc::new(ClaudeClassifier::new(claude)));
        }
        None => warn!("ANTHROPIC_API_KEY not set, semantic dedup and sentiment filter disabled"),
    }

    Ok(detector)
}
