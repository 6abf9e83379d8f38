use serde::Serialize;

use super::{ImportSink, RawElement, WXR_NAMESPACE_URI};
use crate::error::{P2pError, Result};
use crate::storage::{ContentStore, ItemId, NewItem};

/// Core fields of one `<item>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    /// Identity on the exporting site; not meaningful locally
    pub original_id: Option<i64>,
    pub slug: String,
    pub item_type: String,
    pub title: String,
}

impl ParsedItem {
    /// `None` when the item has no slug: it cannot be matched or referenced by slug.
    fn from_element(item: &RawElement) -> Option<Self> {
        let wp_text = |name: &str| item.child(Some(WXR_NAMESPACE_URI), name).map(RawElement::text_content);

        let original_id: Option<i64> = wp_text("post_id").and_then(|s| s.trim().parse().ok());
        let slug = match wp_text("post_name").map(|s| s.trim().to_string()) {
            Some(slug) if !slug.is_empty() => slug,
            _ => {
                log::warn!("Item without wp:post_name (exported id {:?}), skipped", original_id);
                return None;
            }
        };
        let item_type = wp_text("post_type")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "post".to_string());
        let title = item
            .child(None, "title")
            .map(RawElement::text_content)
            .unwrap_or_default();

        Some(Self {
            original_id,
            slug,
            item_type,
            title,
        })
    }
}

/// Outcome of one import run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub items_created: usize,
    /// Items already present locally (matched by slug and type)
    pub items_existing: usize,
    /// Items without a slug, not imported
    pub items_skipped: usize,
}

/// Reads an export document, creates its items and feeds extension elements to the sinks
pub struct WxrImporter<'a, S: ContentStore> {
    store: &'a S,
    sinks: Vec<&'a mut dyn ImportSink>,
}

impl<'a, S: ContentStore> WxrImporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            sinks: Vec::new(),
        }
    }

    /// Register an extension
    pub fn register(&mut self, sink: &'a mut dyn ImportSink) {
        self.sinks.push(sink);
    }

    /// Import every item of `xml`
    pub fn import(&mut self, xml: &str) -> Result<ImportSummary> {
        let root = RawElement::parse(xml)?;
        if root.local_name != "rss" {
            return Err(P2pError::Parse(format!(
                "expected <rss> root element, found <{}>",
                root.local_name
            )));
        }
        let channel = root
            .child(None, "channel")
            .ok_or_else(|| P2pError::Parse("document has no <channel>".to_string()))?;

        for sink in self.sinks.iter_mut() {
            sink.on_import_start()?;
        }

        let mut summary = ImportSummary::default();
        for node in channel.children.iter().filter(|c| c.namespace.is_none() && c.local_name == "item") {
            let parsed = match ParsedItem::from_element(node) {
                Some(parsed) => parsed,
                None => {
                    summary.items_skipped += 1;
                    continue;
                }
            };
            let item_id = self.ensure_item(&parsed, &mut summary)?;

            for sink in self.sinks.iter_mut() {
                let namespace = sink.namespace_uri().to_string();
                let elements: Vec<&RawElement> = node
                    .children
                    .iter()
                    .filter(|c| c.in_namespace(&namespace))
                    .collect();
                if elements.is_empty() {
                    continue;
                }
                sink.on_import_item(item_id, &elements, &parsed, node)?;
            }
        }

        for sink in self.sinks.iter_mut() {
            sink.on_import_end()?;
        }

        log::info!(
            "Imported {} new item(s), {} already present, {} skipped",
            summary.items_created,
            summary.items_existing,
            summary.items_skipped
        );
        Ok(summary)
    }

    fn ensure_item(&self, parsed: &ParsedItem, summary: &mut ImportSummary) -> Result<ItemId> {
        if let Some(existing) = self.store.find_item(&parsed.slug, &parsed.item_type)? {
            log::debug!("{} ({}) already exists as {}", parsed.slug, parsed.item_type, existing);
            summary.items_existing += 1;
            return Ok(existing);
        }

        let id = self.store.insert_item(&NewItem {
            slug: parsed.slug.clone(),
            item_type: parsed.item_type.clone(),
            title: parsed.title.clone(),
        })?;
        log::debug!(
            "Created {} ({}) as {} (exported as {:?})",
            parsed.slug,
            parsed.item_type,
            id,
            parsed.original_id
        );
        summary.items_created += 1;
        Ok(id)
    }
}
