use rusqlite::Connection;
use std::path::Path;
use crate::error::{Result, P2pError};

pub mod migrate;

/// Table names for one site, derived from its table prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub prefix: String,
    pub posts: String,
    pub p2p: String,
    pub p2pmeta: String,
}

impl TableNames {
    /// Build table names from a prefix (`wp_` gives `wp_posts`, `wp_p2p`, `wp_p2pmeta`).
    ///
    /// The prefix is formatted into SQL; callers validate it (see `Config`).
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            posts: format!("{}posts", prefix),
            p2p: format!("{}p2p", prefix),
            p2pmeta: format!("{}p2pmeta", prefix),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::with_prefix("wp_")
    }
}

/// Database connection wrapper
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Open a new database connection with the standard pragmas
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(P2pError::Database)?;

        // WAL for readers during long imports, NORMAL sync for speed, foreign keys for integrity
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA temp_store = MEMORY;"
        )?;

        Ok(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check whether a table exists
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
