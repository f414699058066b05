//! Command-line node: crawl a query, print a round's proof, or audit one.
//!
//! Records, ItemCids and proofs live in SQLite; blobs go to a
//! web3.storage-compatible service; pages render through a WebDriver
//! endpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use proof_crawler::{
    ClockRounds, CrawlQuery, CrawlTask, CrawlerConfig, Credentials, Cid, FixedRound,
    ProofAggregator, RoundProvider, SecretString, SqliteStore, Web3StorageClient,
    WebDriverLauncher,
};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "proof-crawler")]
#[command(about = "Session-managed crawler that anchors items into content-addressed storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a search URL and anchor what is found
    Crawl {
        /// Seed URL (usually a platform search page)
        query: String,

        /// Term combined with reply authors when expanding replies
        #[arg(long, default_value = "")]
        term: String,

        /// Stop after this many stored items
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Round the crawl starts in
        #[arg(long, default_value_t = 0)]
        round: u64,

        /// Search reply authors for the term
        #[arg(long)]
        replies: bool,

        /// Follow links found on visited item pages
        #[arg(long)]
        follow: bool,
    },

    /// Print (creating if needed) the proof CID of a round
    Proof { round: u64 },

    /// Audit a proof CID for a round
    Audit { cid: String, round: u64 },
}

/// Configuration loaded from environment variables.
struct AppConfig {
    username: String,
    password: SecretString,
    webdriver_url: String,
    web3storage_token: SecretString,
    database_url: String,
    round_length: Duration,
}

impl AppConfig {
    fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            username: env::var("PLATFORM_USERNAME").context("PLATFORM_USERNAME must be set")?,
            password: env::var("PLATFORM_PASSWORD")
                .context("PLATFORM_PASSWORD must be set")?
                .into(),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            web3storage_token: env::var("WEB3STORAGE_TOKEN")
                .context("WEB3STORAGE_TOKEN must be set")?
                .into(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:proof-crawler.db?mode=rwc".to_string()),
            round_length: parse_round_length(
                &env::var("ROUND_LENGTH_SECS").unwrap_or_else(|_| "3600".to_string()),
            )?,
        })
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

fn parse_round_length(raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .context("ROUND_LENGTH_SECS must be a valid number")?;
    anyhow::ensure!(secs > 0, "ROUND_LENGTH_SECS must be greater than zero");
    Ok(Duration::from_secs(secs))
}

fn build_task(
    app: &AppConfig,
    store: Arc<SqliteStore>,
    content: Arc<Web3StorageClient>,
    rounds: Arc<dyn RoundProvider>,
) -> Result<CrawlTask<WebDriverLauncher, SqliteStore, Web3StorageClient>> {
    let launcher = WebDriverLauncher::new(&app.webdriver_url)
        .context("Failed to create WebDriver client")?;
    CrawlTask::new(
        launcher,
        app.credentials(),
        store,
        content,
        rounds,
        CrawlerConfig::default(),
    )
    .context("Invalid crawler configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,proof_crawler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let app = AppConfig::from_env()?;

    let store = Arc::new(
        SqliteStore::new(&app.database_url)
            .await
            .context("Failed to open database")?,
    );
    let content = Arc::new(
        Web3StorageClient::new(app.web3storage_token.clone())
            .context("Failed to create storage client")?,
    );

    match cli.command {
        Commands::Crawl {
            query,
            term,
            limit,
            round,
            replies,
            follow,
        } => {
            let rounds = Arc::new(ClockRounds::new(round, app.round_length));
            let mut task = build_task(&app, store, content, rounds)?;

            let query = CrawlQuery::new(query, term)
                .with_limit(limit)
                .with_reply_expansion(replies)
                .with_link_following(follow);
            task.start(query).await?;

            let outcome = tokio::select! {
                outcome = task.join() => outcome,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping crawl");
                    task.stop();
                    task.join().await
                }
            };
            task.shutdown().await;

            if let Some(outcome) = outcome {
                let summary = outcome.context("Crawl failed")?;
                println!(
                    "{}",
                    json!({
                        "parsed": summary.parsed,
                        "remaining": summary.remaining,
                        "reason": format!("{:?}", summary.reason),
                    })
                );
            }
        }
        Commands::Proof { round } => {
            let aggregator = ProofAggregator::new(store, content);
            let cid = aggregator
                .get_proof_cid(round)
                .await
                .with_context(|| format!("No proof for round {}", round))?;
            println!("{}", json!({ "round": round, "cid": cid }));
        }
        Commands::Audit { cid, round } => {
            let rounds = Arc::new(FixedRound::new(round));
            let mut task = build_task(&app, store, content, rounds)?;
            let verdict = task.audit_submission(&Cid::new(cid.clone()), round).await?;
            task.shutdown().await;
            println!(
                "{}",
                json!({ "cid": cid, "round": round, "valid": verdict.is_valid(), "verdict": format!("{:?}", verdict) })
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_length_parsing() {
        assert_eq!(parse_round_length("3600").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_round_length(" 60 ").unwrap(), Duration::from_secs(60));
        assert!(parse_round_length("0").is_err());
        assert!(parse_round_length("hourly").is_err());
    }
}
