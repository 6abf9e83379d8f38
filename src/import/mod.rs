//! Relationship importer.
//!
//! Each imported item hands over its raw `<p2p>` elements. A relationship whose
//! target already exists locally is inserted at once; otherwise it is queued and
//! retried exactly once when the import ends.

mod parse;
mod pending;
mod remap;
mod resolve;

pub use parse::{parse_relationship, ParsedRelationship};
pub use pending::{PendingQueue, PendingRelationship};
pub use remap::remap_wire_fields;
pub use resolve::ResolutionCache;

use serde::Serialize;

use crate::config::ImportConfig;
use crate::error::{P2pError, Result};
use crate::storage::{
    ColumnValue, ContentStore, ItemId, RelationshipId, RelationshipMeta, RelationshipStore,
    RelationshipTable,
};
use crate::wxr::{ImportSink, ParsedItem, RawElement};
use crate::P2P_NAMESPACE_URI;

/// Lifecycle of one import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportState {
    Idle,
    /// Per-item phase
    Active,
    /// Replaying deferred relationships
    Finalizing,
    Done,
}

/// Counters for one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// `<p2p>` elements handed to the importer
    pub elements: usize,
    /// Elements with none of the recognized fields
    pub malformed: usize,
    /// Inserted during the per-item phase
    pub inserted: usize,
    /// Queued because the target was not imported yet
    pub deferred: usize,
    /// Deferred relationships inserted by the replay
    pub resolved_on_replay: usize,
    /// Deferred relationships whose target never appeared
    pub dropped: usize,
    pub metas_inserted: usize,
}

enum Outcome {
    Inserted(RelationshipId),
    Unresolved(ParsedRelationship),
}

/// Rebuilds relationship rows for one import run
pub struct RelationshipImporter<'s, S> {
    store: &'s S,
    default_item_type: String,
    state: ImportState,
    meta_exists: bool,
    cache: ResolutionCache,
    pending: PendingQueue,
    report: ImportReport,
}

impl<'s, S: ContentStore + RelationshipStore> RelationshipImporter<'s, S> {
    pub fn new(store: &'s S, config: &ImportConfig) -> Self {
        Self {
            store,
            default_item_type: config.default_item_type.clone(),
            state: ImportState::Idle,
            meta_exists: false,
            cache: ResolutionCache::new(),
            pending: PendingQueue::new(),
            report: ImportReport::default(),
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Idle → Active. Creates the relationship tables if they are missing.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(ImportState::Idle, "start")?;

        self.store.install()?;
        self.meta_exists = self.store.table_exists(RelationshipTable::Metadata)?;
        if !self.meta_exists {
            log::warn!("No relationship metadata table, metadata will not be imported");
        }

        self.state = ImportState::Active;
        log::info!("Relationship import started");
        Ok(())
    }

    /// Import the raw `<p2p>` elements found under one imported item
    pub fn parse_and_import(&mut self, item_id: ItemId, elements: &[&RawElement]) -> Result<()> {
        self.expect_state(ImportState::Active, "import an item")?;

        for element in elements {
            if !element.is(P2P_NAMESPACE_URI, "p2p") {
                log::debug!("Ignoring <{}> under item {}", element.local_name, item_id);
                continue;
            }
            self.report.elements += 1;

            let mut relationship = match parse_relationship(element) {
                Some(relationship) => relationship,
                None => {
                    log::warn!("Relationship under item {} has no recognized fields, skipped", item_id);
                    self.report.malformed += 1;
                    continue;
                }
            };
            relationship
                .fields
                .insert("from", ColumnValue::Item(item_id));

            match self.import_relationship(relationship)? {
                Outcome::Inserted(id) => {
                    log::debug!("Inserted relationship {} from {}", id, item_id);
                    self.report.inserted += 1;
                }
                Outcome::Unresolved(relationship) => {
                    log::debug!(
                        "Deferring relationship from {} to {:?}",
                        item_id,
                        relationship.text("to")
                    );
                    self.report.deferred += 1;
                    self.pending.push(item_id, relationship);
                }
            }
        }

        Ok(())
    }

    /// Active → Finalizing → Done. Replays every deferred relationship once.
    pub fn finalize(&mut self) -> Result<ImportReport> {
        self.expect_state(ImportState::Active, "finalize")?;
        self.state = ImportState::Finalizing;

        let pending = self.pending.take_all();
        log::info!("Replaying {} deferred relationship(s)", pending.len());

        for PendingRelationship { from, relationship } in pending {
            match self.import_relationship(relationship)? {
                Outcome::Inserted(id) => {
                    log::debug!("Inserted deferred relationship {} from {}", id, from);
                    self.report.resolved_on_replay += 1;
                }
                Outcome::Unresolved(relationship) => {
                    log::debug!(
                        "Dropping relationship from {}: {:?} ({:?}) was never imported",
                        from,
                        relationship.text("to"),
                        relationship.text("to_type")
                    );
                    self.report.dropped += 1;
                }
            }
        }

        if self.report.dropped > 0 {
            log::warn!(
                "{} relationship(s) dropped: target item not found after import",
                self.report.dropped
            );
        }

        self.state = ImportState::Done;
        log::info!(
            "Relationship import done: {} inserted, {} resolved on replay, {} dropped, {} malformed",
            self.report.inserted,
            self.report.resolved_on_replay,
            self.report.dropped,
            self.report.malformed
        );
        Ok(self.report.clone())
    }

    /// Resolve the target and insert, or hand the relationship back untouched
    fn import_relationship(&mut self, mut relationship: ParsedRelationship) -> Result<Outcome> {
        let to = match self.resolve(&relationship)? {
            Some(to) => to,
            None => return Ok(Outcome::Unresolved(relationship)),
        };

        relationship.fields.insert("to", ColumnValue::Item(to));
        relationship.fields.remove("to_type");
        let metas = std::mem::take(&mut relationship.metas);
        let columns = remap_wire_fields(relationship.fields);

        let id = self.insert(&columns, &metas)?;
        Ok(Outcome::Inserted(id))
    }

    fn resolve(&mut self, relationship: &ParsedRelationship) -> Result<Option<ItemId>> {
        let slug = match relationship.text("to") {
            Some(slug) => slug,
            None => return Ok(None),
        };
        let item_type = relationship
            .text("to_type")
            .unwrap_or(self.default_item_type.as_str());
        self.cache.resolve(self.store, slug, item_type)
    }

    /// Write the row, then each meta against its new id. Not transactional.
    fn insert(&mut self, columns: &[(&'static str, ColumnValue)], metas: &[RelationshipMeta]) -> Result<RelationshipId> {
        let id = self.store.insert_row(columns)?;

        if self.meta_exists {
            for meta in metas {
                self.store.attach_metadata(id, &meta.key, &meta.value)?;
                self.report.metas_inserted += 1;
            }
        }

        Ok(id)
    }

    fn expect_state(&self, expected: ImportState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(P2pError::InvalidState(format!(
                "cannot {} while {:?} (expected {:?})",
                action, self.state, expected
            )));
        }
        Ok(())
    }
}

impl<'s, S: ContentStore + RelationshipStore> ImportSink for RelationshipImporter<'s, S> {
    fn namespace_uri(&self) -> &str {
        P2P_NAMESPACE_URI
    }

    fn on_import_start(&mut self) -> Result<()> {
        self.start()
    }

    fn on_import_item(
        &mut self,
        item_id: ItemId,
        elements: &[&RawElement],
        _parsed: &ParsedItem,
        _node: &RawElement,
    ) -> Result<()> {
        self.parse_and_import(item_id, elements)
    }

    fn on_import_end(&mut self) -> Result<()> {
        self.finalize()?;
        Ok(())
    }
}
