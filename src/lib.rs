pub mod analytics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod search;
pub mod swr;
pub mod upstream;
pub mod warmer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use analytics::{AnalyticsRecorder, SystemClock};
use cache::CacheTiers;
use config::EngineConfig;
use engine::SearchEngine;
use model::{PageRequest, SearchFilters, SortOrder};
use upstream::catalog::HttpCatalogClient;
use upstream::sqlite::SqliteGameStore;

/// `--version` output with the vergen build metadata emitted by `build.rs`.
fn long_version() -> String {
    format!(
        "{} (built {}, {} profile)",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        option_env!("VERGEN_CARGO_OPT_LEVEL")
            .map(|lvl| if lvl == "0" { "debug" } else { "optimized" })
            .unwrap_or("unknown"),
    )
}

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "gamesearch",
    version,
    long_version = long_version(),
    about = "Relevance ranking and tiered caching engine for game catalog search"
)]
pub struct Cli {
    /// Override data dir (game db, cache tiers, analytics)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a search query
    Search {
        query: String,

        /// Restrict to genres (repeatable)
        #[arg(long)]
        genre: Vec<String>,

        /// Restrict to platforms (repeatable)
        #[arg(long)]
        platform: Vec<String>,

        /// Minimum average rating
        #[arg(long)]
        min_rating: Option<f32>,

        #[arg(long, value_enum, default_value_t = SortArg::Relevance)]
        sort: SortArg,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Emit the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load game records from a JSON file into the local store
    Import {
        /// Path to a JSON array of game records
        file: PathBuf,
    },
    /// Run one cache-warming sweep over the top popular queries
    Warm,
    /// Print cache statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Clear every cache tier
    ClearCache,
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum SortArg {
    Relevance,
    Rating,
    Newest,
    Title,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Relevance => SortOrder::Relevance,
            SortArg::Rating => SortOrder::RatingDesc,
            SortArg::Newest => SortOrder::NewestFirst,
            SortArg::Title => SortOrder::TitleAsc,
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    match cli.command {
        Commands::Search {
            query,
            genre,
            platform,
            min_rating,
            sort,
            limit,
            offset,
            json,
        } => {
            let engine = build_engine(&data_dir)?;
            let filters = SearchFilters {
                genres: genre.into_iter().collect(),
                platforms: platform.into_iter().collect(),
                rating_floor: min_rating,
                released_from: None,
                released_to: None,
            };
            let page = PageRequest { offset, limit };
            let response = engine
                .search(&query, filters, sort.into(), page, None)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for r in &response.results {
                    println!("{:>8.1}  {}", r.score, r.game.title);
                }
                println!(
                    "-- {} results (cache_hit={}, degraded={})",
                    response.total_count, response.cache_hit, response.degraded
                );
                if !response.suggestions.is_empty() {
                    println!("did you mean: {}", response.suggestions.join(", "));
                }
            }
            Ok(())
        }
        Commands::Import { file } => {
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data dir {}", data_dir.display()))?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let games: Vec<model::GameRecord> =
                serde_json::from_str(&raw).context("parsing game records")?;
            let store = SqliteGameStore::open(&data_dir.join("games.db"))?;
            let count = games.len();
            for game in &games {
                store.upsert_game(game, "")?;
            }
            println!("imported {count} games");
            Ok(())
        }
        Commands::Warm => {
            let engine = build_engine(&data_dir)?;
            let warmed = engine.warm_cache().await;
            println!("warmed {warmed} queries");
            Ok(())
        }
        Commands::Stats { json } => {
            let engine = build_engine(&data_dir)?;
            let stats = engine.cache_stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "hit_rate={:.3} searches={} entries={} size={}B",
                    stats.hit_rate, stats.total_searches, stats.entry_count, stats.size_bytes
                );
            }
            Ok(())
        }
        Commands::ClearCache => {
            let engine = build_engine(&data_dir)?;
            engine.clear_cache();
            println!("cache cleared");
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "gamesearch", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Wire up an engine against the on-disk stores in `data_dir`.
pub fn build_engine(data_dir: &std::path::Path) -> Result<Arc<SearchEngine>> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let config = EngineConfig::from_env();
    let store = Arc::new(SqliteGameStore::open(&data_dir.join("games.db"))?);
    let cache = Arc::new(CacheTiers::open(
        &config,
        Some(&data_dir.join("warm_cache.db")),
        Some(&data_dir.join("cold_cache.db")),
    )?);
    let clock = Arc::new(SystemClock);
    let analytics = Arc::new(AnalyticsRecorder::start(
        config.analytics_window_secs,
        config.anonymous_analytics,
        Some(&data_dir.join("analytics.db")),
        clock.clone() as Arc<dyn analytics::Clock>,
    )?);

    let catalog = match dotenvy::var("GAMESEARCH_CATALOG_URL") {
        Ok(url) => Some(Arc::new(HttpCatalogClient::new(url, config.upstream_timeout)
            .map_err(|e| anyhow::anyhow!("catalog client: {e}"))?)
            as Arc<dyn upstream::CatalogClient>),
        Err(_) => None,
    };

    Ok(SearchEngine::new(
        config,
        store,
        catalog,
        cache,
        analytics,
        clock,
    ))
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "game-search", "game-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".gamesearch"))
}
