// Price Store
// SQLite-backed table of historical daily prices per token.
//
// Rows are keyed by (token_id, timestamp); inserts are conflict-safe so the
// same sample can be ingested any number of times.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{PricePoint, PriceSeries};

/// Which rows `clear` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope<'a> {
    Token(&'a str),
    All,
}

pub struct PriceStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl PriceStore {
    /// Open (or create) the database file and make sure the table exists
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self {
            conn,
            path: Some(db_path.to_path_buf()),
        };
        store.init()?;
        info!("Price store initialized: {}", db_path.display());

        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the prices table if absent. Safe to call repeatedly.
    pub fn init(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS prices (
                token_id TEXT NOT NULL,
                token_name TEXT NOT NULL,
                token_symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                datetime_utc TEXT NOT NULL,
                price REAL NOT NULL,
                PRIMARY KEY (token_id, timestamp)
            )",
            [],
        )?;

        debug!("Price schema created/verified");
        Ok(())
    }

    /// Insert points, ignoring ones already stored. All-or-nothing per call.
    ///
    /// Returns the number of rows actually inserted.
    pub fn upsert(&mut self, points: &[PricePoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let inserted = insert_points(&tx, points)?;
        tx.commit()?;

        debug!(
            "Upserted {} points, {} new",
            points.len(),
            inserted
        );
        Ok(inserted)
    }

    /// Swap a token's rows for `points` in one transaction
    pub fn replace(&mut self, token_id: &str, points: &[PricePoint]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM prices WHERE token_id = ?1", params![token_id])?;
        let inserted = insert_points(&tx, points)?;
        tx.commit()?;

        debug!(
            "Replaced {} rows for {} with {} new",
            removed, token_id, inserted
        );
        Ok(inserted)
    }

    /// Newest stored timestamp for a token, `0` when there is none
    pub fn latest_timestamp(&self, token_id: &str) -> Result<i64> {
        let latest: Option<i64> = self.conn.query_row(
            "SELECT MAX(timestamp) FROM prices WHERE token_id = ?1",
            params![token_id],
            |row| row.get(0),
        )?;
        Ok(latest.unwrap_or(0))
    }

    /// All stored points for a token, oldest first
    pub fn read_series(&self, token_id: &str) -> Result<PriceSeries> {
        let mut stmt = self.conn.prepare(
            "SELECT token_id, token_name, token_symbol, timestamp, price
             FROM prices WHERE token_id = ?1 ORDER BY timestamp ASC",
        )?;

        let points = stmt
            .query_map(params![token_id], |row| {
                Ok(PricePoint {
                    token_id: row.get(0)?,
                    token_name: row.get(1)?,
                    token_symbol: row.get(2)?,
                    timestamp: row.get(3)?,
                    price: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Loaded {} points for {}", points.len(), token_id);
        Ok(PriceSeries::from_points(points))
    }

    pub fn count(&self, token_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM prices WHERE token_id = ?1",
            params![token_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete rows for one token or for every token
    pub fn clear(&self, scope: ClearScope<'_>) -> Result<usize> {
        let removed = match scope {
            ClearScope::Token(token_id) => self
                .conn
                .execute("DELETE FROM prices WHERE token_id = ?1", params![token_id])?,
            ClearScope::All => self.conn.execute("DELETE FROM prices", [])?,
        };

        info!("Cleared {} price rows ({:?})", removed, scope);
        Ok(removed)
    }
}

fn insert_points(conn: &Connection, points: &[PricePoint]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO prices
         (token_id, token_name, token_symbol, timestamp, datetime_utc, price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut inserted = 0;
    for point in points {
        inserted += stmt.execute(params![
            point.token_id,
            point.token_name,
            point.token_symbol,
            point.timestamp,
            point.datetime_utc(),
            point.price,
        ])?;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenWatchEntry;

    fn eth() -> TokenWatchEntry {
        TokenWatchEntry::new("ethereum", "Ethereum", "ETH")
    }

    #[test]
    fn test_init_is_idempotent() {
        let store = PriceStore::in_memory().unwrap();
        store.init().unwrap();
        store.init().unwrap();
        assert_eq!(store.count("ethereum").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_insert_keeps_one_row() {
        let mut store = PriceStore::in_memory().unwrap();
        let point = eth().point(1_700_000_000, 2_000.0);

        assert_eq!(store.upsert(&[point.clone()]).unwrap(), 1);
        assert_eq!(store.upsert(&[point.clone()]).unwrap(), 0);
        assert_eq!(store.upsert(&[point.clone(), point]).unwrap(), 0);
        assert_eq!(store.count("ethereum").unwrap(), 1);
    }

    #[test]
    fn test_latest_timestamp_sentinel() {
        let mut store = PriceStore::in_memory().unwrap();
        assert_eq!(store.latest_timestamp("ethereum").unwrap(), 0);

        let token = eth();
        store
            .upsert(&[token.point(200, 2.0), token.point(100, 1.0)])
            .unwrap();
        assert_eq!(store.latest_timestamp("ethereum").unwrap(), 200);
        assert_eq!(store.latest_timestamp("bitcoin").unwrap(), 0);
    }

    #[test]
    fn test_read_series_ascending() {
        let mut store = PriceStore::in_memory().unwrap();
        let token = eth();
        store
            .upsert(&[
                token.point(300, 3.0),
                token.point(100, 1.0),
                token.point(200, 2.0),
            ])
            .unwrap();

        let series = store.read_series("ethereum").unwrap();
        let timestamps: Vec<i64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
        assert_eq!(series.prices(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_clear_scopes() {
        let mut store = PriceStore::in_memory().unwrap();
        let btc = TokenWatchEntry::new("bitcoin", "Bitcoin", "BTC");
        store
            .upsert(&[eth().point(100, 1.0), btc.point(100, 1.0), btc.point(200, 2.0)])
            .unwrap();

        assert_eq!(store.clear(ClearScope::Token("bitcoin")).unwrap(), 2);
        assert_eq!(store.count("ethereum").unwrap(), 1);
        assert_eq!(store.clear(ClearScope::All).unwrap(), 1);
        assert!(store.read_series("ethereum").unwrap().is_empty());
    }

    #[test]
    fn test_replace_swaps_rows() {
        let mut store = PriceStore::in_memory().unwrap();
        let token = eth();
        store
            .upsert(&[token.point(100, 1.0), token.point(200, 2.0)])
            .unwrap();

        let inserted = store
            .replace("ethereum", &[token.point(300, 3.0)])
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(store.read_series("ethereum").unwrap().prices(), vec![3.0]);
    }

    #[test]
    fn test_open_file_database() {
        let dir = std::env::temp_dir().join(format!("rsi-monitor-store-{}", std::process::id()));
        let db_path = dir.join("nested").join("prices.db");

        {
            let mut store = PriceStore::open(&db_path).unwrap();
            store.upsert(&[eth().point(100, 1.0)]).unwrap();
            assert_eq!(store.path(), Some(db_path.as_path()));
        }

        let store = PriceStore::open(&db_path).unwrap();
        assert_eq!(store.latest_timestamp("ethereum").unwrap(), 100);

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
