//! Quote store contract and SQLite implementation.
//!
//! # Responsibility
//! - Upsert quotes keyed by provider id.
//! - Serve point reads, bulk reads and live per-id watches.
//!
//! # Invariants
//! - Write paths call `Quote::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - A live watch observes every committed change to its id, in commit order.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::live::{Publisher, Subscription};
use crate::model::quote::{Quote, QuoteValidationError};
use log::{debug, error};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

const QUOTE_SELECT_SQL: &str = "SELECT id, content, author FROM quotes";
const REQUIRED_COLUMNS: &[&str] = &["id", "content", "author", "created_at", "updated_at"];

pub type StoreResult<T> = Result<T, StorageError>;

type WatcherMap = HashMap<String, Publisher<Quote>>;

/// Storage-layer failure for quote persistence and queries.
#[derive(Debug)]
pub enum StorageError {
    Validation(QuoteValidationError),
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// A previous holder of the connection lock panicked.
    LockPoisoned,
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted quote data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
            Self::LockPoisoned => write!(f, "quote store lock poisoned"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuoteValidationError> for StorageError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistent store contract for cached quotes.
///
/// Implementations must be shareable across threads: the repository writes
/// from worker threads while presentation code reads concurrently.
pub trait QuoteStore: Send + Sync {
    /// Inserts `quote`, fully replacing any record with the same id.
    fn upsert(&self, quote: &Quote) -> StoreResult<()>;
    /// Single-shot point read.
    fn get_quote(&self, id: &str) -> StoreResult<Option<Quote>>;
    /// Live view bound to `id`.
    ///
    /// Yields the current record as soon as one exists, then every later
    /// change to it.
    fn watch_quote(&self, id: &str) -> StoreResult<Subscription<Quote>>;
    /// Single-shot read of every stored quote.
    fn get_all(&self) -> StoreResult<Vec<Quote>>;
    fn count(&self) -> StoreResult<u64>;
}

/// SQLite-backed quote store.
pub struct SqliteQuoteStore {
    conn: Mutex<Connection>,
    // Lock order: `conn` first, then `watchers`.
    watchers: Mutex<WatcherMap>,
}

impl SqliteQuoteStore {
    /// Wraps a migrated connection after checking its schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` for foreign schemas.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let actual_version = current_version(&conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StorageError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        ensure_quotes_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            watchers: Mutex::new(HashMap::new()),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // The map only ever holds whole entries, so a panicked holder cannot
    // leave it half-updated.
    fn watchers(&self) -> MutexGuard<'_, WatcherMap> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, quote: &Quote) {
        let mut watchers = self.watchers();
        watchers.retain(|_, publisher| publisher.subscriber_count() > 0);
        if let Some(publisher) = watchers.get(&quote.id) {
            if publisher.current().as_ref() != Some(quote) {
                publisher.publish(quote.clone());
            }
        }
    }
}

impl QuoteStore for SqliteQuoteStore {
    fn upsert(&self, quote: &Quote) -> StoreResult<()> {
        quote.validate()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO quotes (id, content, author)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                author = excluded.author,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![quote.id.as_str(), quote.content.as_str(), quote.author.as_str()],
        )
        .map_err(|err| {
            error!(
                "event=quote_upsert module=store status=error quote_id={} error={}",
                quote.id, err
            );
            err
        })?;
        debug!(
            "event=quote_upsert module=store status=ok quote_id={}",
            quote.id
        );

        // Still holding `conn`: watchers see changes in commit order.
        self.notify(quote);
        Ok(())
    }

    fn get_quote(&self, id: &str) -> StoreResult<Option<Quote>> {
        let conn = self.conn()?;
        select_quote(&conn, id)
    }

    fn watch_quote(&self, id: &str) -> StoreResult<Subscription<Quote>> {
        let conn = self.conn()?;
        let mut watchers = self.watchers();

        if let Some(publisher) = watchers.get(id) {
            return Ok(publisher.subscribe());
        }

        let publisher = Publisher::new(select_quote(&conn, id)?);
        let subscription = publisher.subscribe();
        watchers.insert(id.to_string(), publisher);
        debug!("event=quote_watch module=store status=ok quote_id={id}");
        Ok(subscription)
    }

    fn get_all(&self) -> StoreResult<Vec<Quote>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{QUOTE_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut quotes = Vec::new();

        while let Some(row) = rows.next()? {
            quotes.push(parse_quote_row(row)?);
        }

        Ok(quotes)
    }

    fn count(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM quotes;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| StorageError::InvalidData(format!("negative row count {count}")))
    }
}

fn select_quote(conn: &Connection, id: &str) -> StoreResult<Option<Quote>> {
    let mut stmt = conn.prepare(&format!("{QUOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_quote_row(row)?)),
        None => Ok(None),
    }
}

fn parse_quote_row(row: &Row<'_>) -> StoreResult<Quote> {
    let quote = Quote {
        id: row.get("id")?,
        content: row.get("content")?,
        author: row.get("author")?,
    };
    check_persisted(&quote)?;
    Ok(quote)
}

fn check_persisted(quote: &Quote) -> StoreResult<()> {
    quote
        .validate()
        .map_err(|err| StorageError::InvalidData(err.to_string()))
}

fn ensure_quotes_schema(conn: &Connection) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'quotes'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(StorageError::MissingRequiredTable("quotes"));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(quotes);")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;

    for column in REQUIRED_COLUMNS {
        if !columns.iter().any(|name| name == *column) {
            return Err(StorageError::MissingRequiredColumn {
                table: "quotes",
                column: *column,
            });
        }
    }

    Ok(())
}
