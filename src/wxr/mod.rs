//! Minimal WXR host: writes and reads the export document and drives the
//! extension sinks through explicit trait calls.
//!
//! Extensions implement [`ExportSink`] and [`ImportSink`] and are handed to
//! [`WxrExporter`] / [`WxrImporter`] at startup.

mod element;
mod reader;
mod writer;

pub use element::RawElement;
pub use reader::{ImportSummary, ParsedItem, WxrImporter};
pub use writer::{ExportSummary, WxrExporter};

use std::io::Write;

use crate::error::Result;
use crate::storage::{ContentItem, ItemId};

/// Namespace of the core WXR elements (`wp:post_name`, ...)
pub const WXR_NAMESPACE_URI: &str = "http://wordpress.org/export/1.3/";
pub const WXR_PREFIX: &str = "wp";
pub const WXR_VERSION: &str = "1.3";

/// Writer handed to export sinks while an item block is open
pub type XmlWriter<'w> = quick_xml::Writer<&'w mut dyn Write>;

/// What an extension tells the exporter about itself
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PluginRegistration {
    /// Preferred prefix; the exporter may assign another through `unique_prefix`
    pub prefix: String,
    pub namespace_uri: String,
    /// Plugin identifier, e.g. `p2p-export-import/plugin`
    pub slug: String,
    /// Where the plugin can be downloaded
    pub url: String,
}

/// Export-side extension contract
pub trait ExportSink {
    /// Declared once, before any item is written
    fn registration(&self) -> PluginRegistration;

    /// The preferred prefix collided; use `prefix` for all elements from now on
    fn unique_prefix(&mut self, prefix: &str);

    /// Write extension markup inside the item's block
    fn on_export_item(&mut self, writer: &mut XmlWriter<'_>, item: &ContentItem) -> Result<()>;

    /// `Some` only if this run actually wrote markup in the namespace
    fn report_namespace_used(&self) -> Option<PluginRegistration>;
}

/// Import-side extension contract
pub trait ImportSink {
    /// Namespace whose item children this sink consumes
    fn namespace_uri(&self) -> &str;

    fn on_import_start(&mut self) -> Result<()>;

    /// Called once per imported item that has children in `namespace_uri()`
    fn on_import_item(
        &mut self,
        item_id: ItemId,
        elements: &[&RawElement],
        parsed: &ParsedItem,
        node: &RawElement,
    ) -> Result<()>;

    fn on_import_end(&mut self) -> Result<()>;
}

/// Write `<name>text</name>`, escaping the text
pub fn write_text_element(writer: &mut XmlWriter<'_>, name: &str, text: &str) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(quick_xml::events::BytesText::new(text))?;
    Ok(())
}

/// Pick a prefix not in `taken`, appending a counter to `preferred` when needed
pub(crate) fn unique_prefix(preferred: &str, taken: &[String]) -> String {
    if !taken.iter().any(|p| p == preferred) {
        return preferred.to_string();
    }
    (1..)
        .map(|n| format!("{}{}", preferred, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| preferred.to_string())
}
