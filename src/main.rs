//! # RAG Harness CLI (`rag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the index database and schema |
//! | `rag ingest --url <U>...` | Replace the collection with the content of the URLs |
//! | `rag ask "<question>" [--url <U>...]` | Answer a question, ingesting first when URLs are given |
//! | `rag chat --url <U>...` | Ingest, then answer one question per stdin line |
//! | `rag status` | Show the persisted collection |
//!
//! ## Examples
//!
//! ```bash
//! rag ingest --url https://example.com/rates --url https://example.com/fed
//! rag ask "What was the 30-year fixed mortgage rate and on what date?"
//! rag --config ./rag.toml status
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};

use rag_harness::config::{self, Config};
use rag_harness::ingest::ingest;
use rag_harness::progress::ProgressMode;
use rag_harness::query::answer;
use rag_harness::session::Session;
use rag_harness::sqlite_index::SqliteIndex;
use rag_harness::{logging, Answer, RagError};

const NO_URLS_MESSAGE: &str = "You must provide at least one valid URL!";
const NOT_INITIALIZED_MESSAGE: &str = "You must process the URLs first!";

/// An error the user fixes by changing the invocation. Printed without the
/// `Error:` prefix and mapped to exit status 2.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

/// RAG Harness: ingest web pages, then ask questions answered from them with
/// cited sources.
#[derive(Parser)]
#[command(name = "rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and schema. Safe to run repeatedly.
    Init,

    /// Fetch, split and embed the URLs, replacing the collection.
    Ingest {
        /// Page to ingest. Repeat for several pages.
        #[arg(long = "url")]
        urls: Vec<String>,

        #[arg(long, value_enum, default_value = "human")]
        progress: ProgressMode,
    },

    /// Answer a question from the collection.
    ///
    /// With `--url`, the URLs are ingested first. Without, the persisted
    /// collection from an earlier `rag ingest` is used.
    Ask {
        question: String,

        #[arg(long = "url")]
        urls: Vec<String>,

        #[arg(long, value_enum, default_value = "off")]
        progress: ProgressMode,

        /// Print the answer, sources and retrieved context as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ingest the URLs, then answer each question read from stdin.
    Chat {
        #[arg(long = "url")]
        urls: Vec<String>,

        #[arg(long, value_enum, default_value = "human")]
        progress: ProgressMode,
    },

    /// Show the persisted collection.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<UsageError>() {
            Some(usage) => {
                eprintln!("{}", usage);
                ExitCode::from(2)
            }
            None => {
                eprintln!("Error: {:?}", err);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::open(&cfg).await?;
            index.pool().close().await;
            println!(
                "Index initialized at {}.",
                cfg.index.db_path().display()
            );
        }
        Commands::Ingest { urls, progress } => {
            let urls = checked_urls(&cfg, urls)?;
            let session = Session::new(cfg);
            let summary = ingest(&session, &urls, progress.reporter().as_ref())
                .await
                .map_err(user_facing)?;
            tracing::info!(chunks = summary.chunks, failed = summary.failed.len(), "ingestion finished");
        }
        Commands::Ask {
            question,
            urls,
            progress,
            json,
        } => {
            let session = if urls.is_empty() {
                let session = Session::new(cfg);
                session.attach().await.map_err(user_facing)?;
                session
            } else {
                let urls = checked_urls(&cfg, urls)?;
                let session = Session::new(cfg);
                ingest(&session, &urls, progress.reporter().as_ref())
                    .await
                    .map_err(user_facing)?;
                session
            };
            let result = answer(&session, &question).await.map_err(user_facing)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_answer(&result);
            }
        }
        Commands::Chat { urls, progress } => {
            let urls = checked_urls(&cfg, urls)?;
            let session = Session::new(cfg);
            ingest(&session, &urls, progress.reporter().as_ref())
                .await
                .map_err(user_facing)?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                match answer(&session, &line).await {
                    Ok(result) => print_answer(&result),
                    Err(e) => eprintln!("Error: {}", e),
                }
                println!();
            }
        }
        Commands::Status => {
            let session = Session::new(cfg);
            match session.status().await.map_err(user_facing)? {
                Some(info) => {
                    println!("Collection:      {}", info.name);
                    println!("Index:           {}", session.config().index.db_path().display());
                    println!("Embedding model: {} ({} dims)", info.embedding_model, info.dims);
                    println!("Records:         {}", info.records);
                    println!(
                        "Complete:        {}",
                        if info.completed { "yes" } else { "no (re-run ingest)" }
                    );
                }
                None => {
                    println!(
                        "Collection '{}' does not exist yet. Run `rag ingest` first.",
                        session.config().index.collection
                    );
                }
            }
        }
    }

    Ok(())
}

/// Drop blank entries and enforce the configured URL limit.
fn checked_urls(cfg: &Config, urls: Vec<String>) -> Result<Vec<String>> {
    let urls: Vec<String> = urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if urls.is_empty() {
        return Err(UsageError(NO_URLS_MESSAGE.to_string()).into());
    }
    if urls.len() > cfg.fetch.max_urls {
        bail!(
            "at most {} URLs can be ingested at once (got {}); raise fetch.max_urls to allow more",
            cfg.fetch.max_urls,
            urls.len()
        );
    }
    Ok(urls)
}

/// Turn errors the user can fix by running another command into a
/// [`UsageError`] with an instructive message. Anything else propagates.
fn user_facing(err: RagError) -> anyhow::Error {
    match err {
        RagError::NotInitialized => UsageError(NOT_INITIALIZED_MESSAGE.to_string()).into(),
        RagError::InvalidInput(reason) => UsageError(format!("Invalid input: {}", reason)).into(),
        other => other.into(),
    }
}

fn print_answer(result: &Answer) {
    println!("Answer:");
    println!("{}", result.text);
    if !result.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &result.sources {
            println!("- {}", source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_urls_are_a_usage_error() {
        let err = checked_urls(&Config::default(), vec!["  ".to_string()]).unwrap_err();
        let usage = err.downcast_ref::<UsageError>().unwrap();
        assert_eq!(usage.to_string(), NO_URLS_MESSAGE);
    }

    #[test]
    fn test_too_many_urls_is_not_a_usage_error() {
        let urls = (0..4).map(|i| format!("https://{}.example", i)).collect();
        let err = checked_urls(&Config::default(), urls).unwrap_err();
        assert!(err.downcast_ref::<UsageError>().is_none());
        assert!(err.to_string().contains("fetch.max_urls"));
    }

    #[test]
    fn test_not_initialized_maps_to_instructive_message() {
        let err = user_facing(RagError::NotInitialized);
        let usage = err.downcast_ref::<UsageError>().unwrap();
        assert_eq!(usage.to_string(), NOT_INITIALIZED_MESSAGE);

        let err = user_facing(RagError::InvalidInput("question is empty".to_string()));
        assert!(err.downcast_ref::<UsageError>().is_some());

        let err = user_facing(RagError::Index("disk full".to_string()));
        assert!(err.downcast_ref::<UsageError>().is_none());
        assert!(err.downcast_ref::<RagError>().is_some());
    }
}
