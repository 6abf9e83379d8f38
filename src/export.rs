//! Relationship exporter: writes each item's `p2p` rows into the export
//! document, in the P2P namespace.

use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::config::ExportConfig;
use crate::error::Result;
use crate::storage::{ContentItem, ContentStore, RelationshipStore, RelationshipTable};
use crate::wxr::{write_text_element, ExportSink, PluginRegistration, XmlWriter};
use crate::P2P_NAMESPACE_URI;

/// Serializes relationship rows for one export run
pub struct RelationshipExporter<'s, S> {
    store: &'s S,
    registration: PluginRegistration,
    /// Whether the metadata table exists; metadata is skipped when it doesn't
    meta_exists: bool,
    used: bool,
    rows_written: usize,
}

impl<'s, S: ContentStore + RelationshipStore> RelationshipExporter<'s, S> {
    /// Returns `None` when the site has no relationship table: there is nothing to export.
    pub fn new(store: &'s S, config: &ExportConfig) -> Result<Option<Self>> {
        if !store.table_exists(RelationshipTable::Relationships)? {
            log::info!("No relationship table, relationship export disabled");
            return Ok(None);
        }

        let meta_exists = store.table_exists(RelationshipTable::Metadata)?;
        if !meta_exists {
            log::info!("No relationship metadata table, exporting rows without metadata");
        }

        Ok(Some(Self {
            store,
            registration: PluginRegistration {
                prefix: config.preferred_prefix.clone(),
                namespace_uri: P2P_NAMESPACE_URI.to_string(),
                slug: config.plugin_slug.clone(),
                url: config.plugin_url.clone(),
            },
            meta_exists,
            used: false,
            rows_written: 0,
        }))
    }

    /// Prefix currently used for emitted elements
    pub fn prefix(&self) -> &str {
        &self.registration.prefix
    }

    /// Whether any row was written during this run
    pub fn namespace_used(&self) -> bool {
        self.used
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Write one `<p2p>` block per relationship row whose `from` is `item`.
    ///
    /// Returns the number of rows written.
    pub fn write_rows(&mut self, writer: &mut XmlWriter<'_>, item: &ContentItem) -> Result<usize> {
        let rows = self.store.relationships_from(item.id)?;
        let mut written = 0;

        let p2p = self.qualified("p2p");
        let meta = self.qualified("meta");

        for row in rows {
            // p2p_id and p2p_from are not written: the id is local, from is the enclosing item
            let target = match self.store.item(row.to)? {
                Some(target) => target,
                None => {
                    log::warn!(
                        "Relationship {} from {} points at missing item {}, skipped",
                        row.id,
                        row.from,
                        row.to
                    );
                    continue;
                }
            };

            writer.write_event(Event::Start(BytesStart::new(p2p.as_str())))?;
            write_text_element(writer, &self.qualified("to"), &target.slug)?;
            write_text_element(writer, &self.qualified("to_type"), &target.item_type)?;
            write_text_element(writer, &self.qualified("type"), &row.rel_type)?;

            if self.meta_exists {
                for entry in self.store.metadata_for(row.id)? {
                    writer.write_event(Event::Start(BytesStart::new(meta.as_str())))?;
                    write_text_element(writer, &self.qualified("key"), &entry.key)?;
                    write_text_element(writer, &self.qualified("value"), &entry.value)?;
                    writer.write_event(Event::End(BytesEnd::new(meta.as_str())))?;
                }
            }

            writer.write_event(Event::End(BytesEnd::new(p2p.as_str())))?;
            written += 1;
        }

        if written > 0 {
            log::debug!("Wrote {} relationship(s) for {} ({})", written, item.slug, item.id);
            self.used = true;
            self.rows_written += written;
        }
        Ok(written)
    }

    fn qualified(&self, local_name: &str) -> String {
        format!("{}:{}", self.registration.prefix, local_name)
    }
}

impl<'s, S: ContentStore + RelationshipStore> ExportSink for RelationshipExporter<'s, S> {
    fn registration(&self) -> PluginRegistration {
        self.registration.clone()
    }

    fn unique_prefix(&mut self, prefix: &str) {
        self.registration.prefix = prefix.to_string();
    }

    fn on_export_item(&mut self, writer: &mut XmlWriter<'_>, item: &ContentItem) -> Result<()> {
        self.write_rows(writer, item)?;
        Ok(())
    }

    fn report_namespace_used(&self) -> Option<PluginRegistration> {
        self.used.then(|| self.registration.clone())
    }
}
