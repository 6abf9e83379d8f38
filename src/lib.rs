pub mod config;
pub mod error;
pub mod db;
pub mod storage;
pub mod wxr;
pub mod export;
pub mod import;
pub mod roundtrip;

/// Namespace that relationship markup lives in, on export and import alike
pub const P2P_NAMESPACE_URI: &str = "http://scribu.net/wordpress/posts-to-posts/";

pub use config::Config;
pub use error::{P2pError, Result};
pub use export::RelationshipExporter;
pub use import::{ImportReport, ImportState, RelationshipImporter};
pub use roundtrip::{export_site, import_site, SiteExport, SiteImport};
pub use storage::SqliteStore;
