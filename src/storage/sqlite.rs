use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{
    ColumnValue, ContentItem, ContentStore, ItemId, NewItem, RelationshipId, RelationshipMeta,
    RelationshipRow, RelationshipStore, RelationshipTable,
};
use crate::db::{migrate, table_exists, Db, TableNames};
use crate::error::{P2pError, Result};

/// Columns of the relationship table that `insert_row` accepts
const P2P_COLUMNS: &[&str] = &["p2p_from", "p2p_to", "p2p_type"];

/// SQLite-backed content and relationship store for one site
pub struct SqliteStore {
    conn: Connection,
    tables: TableNames,
}

impl SqliteStore {
    pub fn new(conn: Connection, tables: TableNames) -> Self {
        Self { conn, tables }
    }

    /// Open the database file behind `db` for the site using `table_prefix`
    pub fn open(db: &Db, table_prefix: &str) -> Result<Self> {
        Ok(Self::new(db.open_connection()?, TableNames::with_prefix(table_prefix)))
    }

    /// Fresh in-memory site with the content table installed
    pub fn in_memory(table_prefix: &str) -> Result<Self> {
        let store = Self::new(Db::open_in_memory()?, TableNames::with_prefix(table_prefix));
        store.install_content()?;
        Ok(store)
    }

    /// Create the content items table if missing
    pub fn install_content(&self) -> Result<()> {
        migrate::install_content(&self.conn, &self.tables)
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Count rows of a table, `None` when the table is missing
    pub fn count_rows(&self, table: &str) -> Result<Option<i64>> {
        if !table_exists(&self.conn, table)? {
            return Ok(None);
        }
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(Some(count))
    }
}

impl ContentStore for SqliteStore {
    fn find_item(&self, slug: &str, item_type: &str) -> Result<Option<ItemId>> {
        let sql = format!(
            "SELECT ID FROM {} WHERE post_name = ?1 AND post_type = ?2 LIMIT 1",
            self.tables.posts
        );
        let id = self
            .conn
            .query_row(&sql, params![slug, item_type], |row| row.get::<_, ItemId>(0))
            .optional()?;
        Ok(id)
    }

    fn item(&self, id: ItemId) -> Result<Option<ContentItem>> {
        let sql = format!(
            "SELECT ID, post_name, post_type, post_title FROM {} WHERE ID = ?1",
            self.tables.posts
        );
        let item = self
            .conn
            .query_row(&sql, params![id], |row| {
                Ok(ContentItem {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    item_type: row.get(2)?,
                    title: row.get(3)?,
                })
            })
            .optional()?;
        Ok(item)
    }

    fn items(&self) -> Result<Vec<ContentItem>> {
        let sql = format!(
            "SELECT ID, post_name, post_type, post_title FROM {} ORDER BY ID",
            self.tables.posts
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map([], |row| {
                Ok(ContentItem {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    item_type: row.get(2)?,
                    title: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(P2pError::Database)?;
        Ok(items)
    }

    fn insert_item(&self, item: &NewItem) -> Result<ItemId> {
        let sql = format!(
            "INSERT INTO {} (post_name, post_type, post_title) VALUES (?1, ?2, ?3)",
            self.tables.posts
        );
        self.conn
            .execute(&sql, params![item.slug, item.item_type, item.title])?;
        Ok(ItemId(self.conn.last_insert_rowid()))
    }
}

impl RelationshipStore for SqliteStore {
    fn table_exists(&self, table: RelationshipTable) -> Result<bool> {
        let name = match table {
            RelationshipTable::Relationships => &self.tables.p2p,
            RelationshipTable::Metadata => &self.tables.p2pmeta,
        };
        table_exists(&self.conn, name)
    }

    fn install(&self) -> Result<()> {
        migrate::install_relationships(&self.conn, &self.tables)
    }

    fn relationships_from(&self, from: ItemId) -> Result<Vec<RelationshipRow>> {
        let sql = format!(
            "SELECT p2p_id, p2p_from, p2p_to, p2p_type FROM {} WHERE p2p_from = ?1",
            self.tables.p2p
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![from], |row| {
                Ok(RelationshipRow {
                    id: row.get(0)?,
                    from: row.get(1)?,
                    to: row.get(2)?,
                    rel_type: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(P2pError::Database)?;
        Ok(rows)
    }

    fn metadata_for(&self, id: RelationshipId) -> Result<Vec<RelationshipMeta>> {
        let sql = format!(
            "SELECT meta_key, meta_value FROM {} WHERE p2p_id = ?1 ORDER BY meta_id",
            self.tables.p2pmeta
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let metas = stmt
            .query_map(params![id], |row| {
                Ok(RelationshipMeta {
                    key: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(P2pError::Database)?;
        Ok(metas)
    }

    fn insert_row(&self, columns: &[(&str, ColumnValue)]) -> Result<RelationshipId> {
        if let Some((name, _)) = columns.iter().find(|(name, _)| !P2P_COLUMNS.contains(name)) {
            return Err(P2pError::InvalidInput(format!(
                "unknown relationship column: {}",
                name
            )));
        }

        if columns.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {} DEFAULT VALUES", self.tables.p2p), [])?;
        } else {
            let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.tables.p2p,
                names.join(", "),
                placeholders.join(", ")
            );
            self.conn
                .execute(&sql, params_from_iter(columns.iter().map(|(_, value)| value)))?;
        }

        Ok(RelationshipId(self.conn.last_insert_rowid()))
    }

    fn attach_metadata(&self, id: RelationshipId, key: &str, value: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (p2p_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
            self.tables.p2pmeta
        );
        self.conn.execute(&sql, params![id, key, value])?;
        Ok(())
    }
}
