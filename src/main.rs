use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use p2p_roundtrip::db::Db;
use p2p_roundtrip::{export_site, import_site, Config, SqliteStore};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "p2p")]
#[command(about = "Export and import item-to-item relationships alongside site content")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write every content item and its relationships to an export document
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Import an export document, rebuilding relationships by slug
    Import {
        #[arg(short, long)]
        input: PathBuf,

        /// Print the import report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Report which tables exist and how many rows they hold
    Verify,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.storage.log_level.as_str())
    ).init();

    log::info!("Configuration loaded successfully");
    let db = Db::new(config.db_path());
    log::info!("Database path: {}", db.path().display());
    log::info!("Table prefix: {}", config.table_prefix());

    let store = SqliteStore::open(&db, config.table_prefix())?;
    store.install_content()?;

    match args.command {
        Command::Export { output } => run_export(&store, &config, &output),
        Command::Import { input, json } => run_import(&store, &config, &input, json),
        Command::Verify => run_verify(&store),
    }
}

fn run_export(store: &SqliteStore, config: &Config, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    let export = export_site(store, &config.export, &mut out)?;
    out.flush()?;

    match export.relationships {
        Some(rows) => log::info!(
            "Exported {} items and {} relationships to {}",
            export.summary.items,
            rows,
            output.display()
        ),
        None => log::info!(
            "Exported {} items to {} (no relationship table)",
            export.summary.items,
            output.display()
        ),
    }

    Ok(())
}

fn run_import(store: &SqliteStore, config: &Config, input: &Path, json: bool) -> Result<()> {
    let xml = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let import = import_site(store, &config.import, &xml)?;
    let report = &import.relationships;

    log::info!(
        "Items: created={}, existing={}, skipped={}",
        import.summary.items_created,
        import.summary.items_existing,
        import.summary.items_skipped
    );
    log::info!(
        "Relationships: inserted={}, resolved on replay={}, dropped={}, malformed={}",
        report.inserted,
        report.resolved_on_replay,
        report.dropped,
        report.malformed
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&import)?);
    }

    Ok(())
}

fn run_verify(store: &SqliteStore) -> Result<()> {
    let tables = store.tables();
    let mut all_present = true;

    for table in [&tables.posts, &tables.p2p, &tables.p2pmeta] {
        match store.count_rows(table)? {
            Some(count) => log::info!("✓ {}: {} rows", table, count),
            None => {
                log::warn!("Missing table: {}", table);
                all_present = false;
            }
        }
    }

    if all_present {
        log::info!("All tables present");
    } else {
        log::info!("Relationship tables are created by the first import");
    }

    Ok(())
}
