//! Storage seams: content item lookup and the relationship tables.
//!
//! The exporter and importer only talk to these traits; `SqliteStore` is the
//! implementation the binaries use.

mod sqlite;

pub use sqlite::SqliteStore;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Identity of a content item on the local site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub i64);

/// Storage-assigned identity of a relationship row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for ItemId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for ItemId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(ItemId)
    }
}

impl ToSql for RelationshipId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for RelationshipId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(RelationshipId)
    }
}

/// A content item as seen by the relationship code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    /// Human-readable slug (`post_name`), stable across sites
    pub slug: String,
    /// Content type (`post_type`)
    pub item_type: String,
    pub title: String,
}

/// A content item about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub slug: String,
    pub item_type: String,
    pub title: String,
}

/// One directed link between two content items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub id: RelationshipId,
    pub from: ItemId,
    pub to: ItemId,
    /// Free-form tag, e.g. `related`
    pub rel_type: String,
}

/// A key/value pair attached to one relationship row. Keys need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipMeta {
    pub key: String,
    pub value: String,
}

impl RelationshipMeta {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Relationship tables whose presence can be checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipTable {
    Relationships,
    Metadata,
}

/// Value written to a relationship column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Item(ItemId),
    Text(String),
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            ColumnValue::Item(id) => id.to_sql(),
            ColumnValue::Text(text) => text.to_sql(),
        }
    }
}

/// Content item lookup and creation
pub trait ContentStore {
    /// Find an item by slug and type. First match wins when the pair is not unique.
    fn find_item(&self, slug: &str, item_type: &str) -> Result<Option<ItemId>>;

    /// Fetch one item by identity
    fn item(&self, id: ItemId) -> Result<Option<ContentItem>>;

    /// All items, in identity order
    fn items(&self) -> Result<Vec<ContentItem>>;

    /// Create an item and return its new identity
    fn insert_item(&self, item: &NewItem) -> Result<ItemId>;
}

/// The `p2p` / `p2pmeta` tables
pub trait RelationshipStore {
    fn table_exists(&self, table: RelationshipTable) -> Result<bool>;

    /// Create the relationship tables if missing
    fn install(&self) -> Result<()>;

    /// Rows whose `from` is the given item, in storage order
    fn relationships_from(&self, from: ItemId) -> Result<Vec<RelationshipRow>>;

    fn metadata_for(&self, id: RelationshipId) -> Result<Vec<RelationshipMeta>>;

    /// Insert one row from storage-named columns and return its generated id
    fn insert_row(&self, columns: &[(&str, ColumnValue)]) -> Result<RelationshipId>;

    fn attach_metadata(&self, id: RelationshipId, key: &str, value: &str) -> Result<()>;
}
