use rusqlite::{params, Connection};
use super::{table_exists, TableNames};
use crate::error::{Result, P2pError};

/// An embedded schema step, rendered against a site's table names
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    table: fn(&TableNames) -> &str,
    sql: fn(&TableNames) -> String,
}

/// Content items table. Owned by the host engine.
pub const CONTENT: &[Migration] = &[Migration {
    version: 1,
    name: "001_posts",
    table: posts_table,
    sql: posts_sql,
}];

/// Relationship tables. `p2pmeta` is a separate step so a site may carry `p2p` alone.
pub const RELATIONSHIPS: &[Migration] = &[
    Migration {
        version: 2,
        name: "002_p2p",
        table: p2p_table,
        sql: p2p_sql,
    },
    Migration {
        version: 3,
        name: "003_p2pmeta",
        table: p2pmeta_table,
        sql: p2pmeta_sql,
    },
];

fn posts_table(tables: &TableNames) -> &str {
    &tables.posts
}

fn p2p_table(tables: &TableNames) -> &str {
    &tables.p2p
}

fn p2pmeta_table(tables: &TableNames) -> &str {
    &tables.p2pmeta
}

fn posts_sql(tables: &TableNames) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {posts} (
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            post_name TEXT NOT NULL DEFAULT '',
            post_type TEXT NOT NULL DEFAULT 'post',
            post_title TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_{posts}_name_type ON {posts} (post_name, post_type);",
        posts = tables.posts
    )
}

fn p2p_sql(tables: &TableNames) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {p2p} (
            p2p_id INTEGER PRIMARY KEY AUTOINCREMENT,
            p2p_from INTEGER NOT NULL,
            p2p_to INTEGER NOT NULL,
            p2p_type TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_{p2p}_from ON {p2p} (p2p_from);
        CREATE INDEX IF NOT EXISTS idx_{p2p}_to ON {p2p} (p2p_to);",
        p2p = tables.p2p
    )
}

fn p2pmeta_sql(tables: &TableNames) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {meta} (
            meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
            p2p_id INTEGER NOT NULL DEFAULT 0,
            meta_key TEXT,
            meta_value TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{meta}_p2p_id ON {meta} (p2p_id);",
        meta = tables.p2pmeta
    )
}

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations, as `{table prefix}:{migration name}` keys
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    ensure_migrations_table(conn)?;
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version, name")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(P2pError::Database)?;
    Ok(names)
}

fn migration_key(tables: &TableNames, migration: &Migration) -> String {
    format!("{}:{}", tables.prefix, migration.name)
}

/// Run the given migrations against one site's tables.
///
/// Idempotent: a step is skipped only when it was recorded and its table is still present.
pub fn run_migrations(conn: &Connection, tables: &TableNames, migrations: &[Migration]) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in migrations {
        let key = migration_key(tables, migration);
        if applied.contains(&key) && table_exists(conn, (migration.table)(tables))? {
            log::debug!("Migration {} already applied, skipping", key);
            continue;
        }

        log::info!("Applying migration: {} (version {})", key, migration.version);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(&(migration.sql)(tables))?;
        tx.execute(
            "INSERT OR REPLACE INTO schema_migrations (name, version) VALUES (?1, ?2)",
            params![key, migration.version],
        )?;
        tx.commit()?;
    }

    Ok(())
}

/// Create the content items table if missing
pub fn install_content(conn: &Connection, tables: &TableNames) -> Result<()> {
    run_migrations(conn, tables, CONTENT)
}

/// Create the `p2p` and `p2pmeta` tables if missing
pub fn install_relationships(conn: &Connection, tables: &TableNames) -> Result<()> {
    run_migrations(conn, tables, RELATIONSHIPS)
}
