//! CLI entry point.
//!
//! # Responsibility
//! - Verify `quoty_core` linkage (`quoty_cli` with no arguments).
//! - Inspect a quote cache offline (`quoty_cli saved [db-path]`).
//!
//! The database path falls back to `QUOTY_DB_PATH` when not given.

use offline::OfflineProvider;
use quoty_core::db::open_db;
use quoty_core::{init_logging, CoreConfig, QuoteRepository, SqliteQuoteStore};
use std::process::ExitCode;
use std::sync::Arc;

mod offline {
    use async_trait::async_trait;
    use quoty_core::{Quote, QuoteCategory, QuoteProvider, TransportError};

    /// Provider for offline inspection; every fetch fails as unreachable.
    pub struct OfflineProvider;

    #[async_trait]
    impl QuoteProvider for OfflineProvider {
        async fn fetch(&self, _category: Option<&QuoteCategory>) -> Result<Quote, TransportError> {
            Err(TransportError::Unreachable("offline inspection".to_string()))
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {
            println!("quoty_core ping={}", quoty_core::ping());
            println!("quoty_core version={}", quoty_core::core_version());
            ExitCode::SUCCESS
        }
        Some("saved") => match list_saved(args.get(1).cloned()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("error: {message}");
                ExitCode::FAILURE
            }
        },
        Some(other) => {
            eprintln!("unknown command `{other}`; usage: quoty_cli [saved [db-path]]");
            ExitCode::from(2)
        }
    }
}

fn list_saved(db_path: Option<String>) -> Result<(), String> {
    let config = match db_path {
        Some(path) => CoreConfig::new(path),
        None => CoreConfig::from_env()?,
    };
    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level.as_str(), log_dir).map_err(|e| e.to_string())?;
    }

    let conn = open_db(&config.db_path).map_err(|e| e.to_string())?;
    let store = SqliteQuoteStore::try_new(conn).map_err(|e| e.to_string())?;
    let repo = QuoteRepository::new(Arc::new(store), Arc::new(OfflineProvider))
        .with_fetch_timeout(config.fetch_timeout);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    let quotes = runtime
        .block_on(repo.list_saved())
        .map_err(|e| e.to_string())?;

    log::info!(
        "event=cli_saved module=cli status=ok count={}",
        quotes.len()
    );
    for quote in &quotes {
        println!("[{}] {} - {}", quote.id, quote.content, quote.author_or_unknown());
    }
    println!("{} saved quote(s)", quotes.len());
    Ok(())
}
