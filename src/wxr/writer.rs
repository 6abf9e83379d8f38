use std::io::Write;

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::Serialize;

use super::{
    unique_prefix, write_text_element, ExportSink, PluginRegistration, XmlWriter, WXR_NAMESPACE_URI,
    WXR_PREFIX, WXR_VERSION,
};
use crate::error::Result;
use crate::storage::ContentStore;

/// Outcome of one export run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub items: usize,
    /// Extensions that wrote markup, as reported after the last item
    pub extensions_used: Vec<PluginRegistration>,
}

/// Walks every content item and writes the export document
pub struct WxrExporter<'a, S: ContentStore> {
    store: &'a S,
    site_title: String,
    sinks: Vec<&'a mut dyn ExportSink>,
}

impl<'a, S: ContentStore> WxrExporter<'a, S> {
    pub fn new(store: &'a S, site_title: &str) -> Self {
        Self {
            store,
            site_title: site_title.to_string(),
            sinks: Vec::new(),
        }
    }

    /// Register an extension
    pub fn register(&mut self, sink: &'a mut dyn ExportSink) {
        self.sinks.push(sink);
    }

    /// Write the whole document to `out`
    pub fn export<W: Write>(&mut self, mut out: W) -> Result<ExportSummary> {
        let namespaces = self.negotiate_prefixes();

        let mut writer: XmlWriter<'_> = Writer::new_with_indent(&mut out as &mut dyn Write, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute((format!("xmlns:{}", WXR_PREFIX).as_str(), WXR_NAMESPACE_URI));
        for (prefix, uri) in &namespaces {
            rss.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        write_text_element(&mut writer, "title", &self.site_title)?;
        write_text_element(&mut writer, "pubDate", &Utc::now().to_rfc2822())?;
        write_text_element(&mut writer, &wp("wxr_version"), WXR_VERSION)?;

        let items = self.store.items()?;
        log::info!("Exporting {} item(s)", items.len());

        for item in &items {
            writer.write_event(Event::Start(BytesStart::new("item")))?;
            write_text_element(&mut writer, "title", &item.title)?;
            write_text_element(&mut writer, &wp("post_id"), &item.id.to_string())?;
            write_text_element(&mut writer, &wp("post_name"), &item.slug)?;
            write_text_element(&mut writer, &wp("post_type"), &item.item_type)?;

            for sink in self.sinks.iter_mut() {
                sink.on_export_item(&mut writer, item)?;
            }

            writer.write_event(Event::End(BytesEnd::new("item")))?;
        }

        let extension = wp("extension");
        let mut extensions_used = Vec::new();
        for sink in &self.sinks {
            if let Some(registration) = sink.report_namespace_used() {
                writer
                    .create_element(extension.as_str())
                    .with_attribute(("prefix", registration.prefix.as_str()))
                    .with_attribute(("namespace_uri", registration.namespace_uri.as_str()))
                    .with_attribute(("slug", registration.slug.as_str()))
                    .with_attribute(("url", registration.url.as_str()))
                    .write_empty()?;
                extensions_used.push(registration);
            }
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;
        out.flush()?;

        Ok(ExportSummary {
            items: items.len(),
            extensions_used,
        })
    }

    /// Assign every sink a prefix distinct from the core one and from each other
    fn negotiate_prefixes(&mut self) -> Vec<(String, String)> {
        let mut taken = vec![WXR_PREFIX.to_string()];
        let mut namespaces = Vec::new();

        for sink in self.sinks.iter_mut() {
            let registration = sink.registration();
            let prefix = unique_prefix(&registration.prefix, &taken);
            if prefix != registration.prefix {
                log::debug!(
                    "Prefix {} taken, using {} for {}",
                    registration.prefix,
                    prefix,
                    registration.namespace_uri
                );
                sink.unique_prefix(&prefix);
            }
            taken.push(prefix.clone());
            namespaces.push((prefix, registration.namespace_uri));
        }

        namespaces
    }
}

fn wp(local_name: &str) -> String {
    format!("{}:{}", WXR_PREFIX, local_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ContentItem, NewItem, SqliteStore};

    /// Writes one marker element per item and records the prefix it was given
    struct MarkerSink {
        prefix: String,
        namespace_uri: String,
        written: usize,
    }

    impl MarkerSink {
        fn new(prefix: &str) -> Self {
            Self {
                prefix: prefix.to_string(),
                namespace_uri: format!("urn:marker:{}", prefix),
                written: 0,
            }
        }
    }

    impl ExportSink for MarkerSink {
        fn registration(&self) -> PluginRegistration {
            PluginRegistration {
                prefix: self.prefix.clone(),
                namespace_uri: self.namespace_uri.clone(),
                slug: "marker/plugin".to_string(),
                url: "https://example.org/marker".to_string(),
            }
        }

        fn unique_prefix(&mut self, prefix: &str) {
            self.prefix = prefix.to_string();
        }

        fn on_export_item(&mut self, writer: &mut XmlWriter<'_>, item: &ContentItem) -> Result<()> {
            if item.item_type == "product" {
                write_text_element(writer, &format!("{}:mark", self.prefix), &item.slug)?;
                self.written += 1;
            }
            Ok(())
        }

        fn report_namespace_used(&self) -> Option<PluginRegistration> {
            (self.written > 0).then(|| self.registration())
        }
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory("wp_").unwrap();
        for (slug, item_type) in [("hello", "post"), ("widget", "product")] {
            store
                .insert_item(&NewItem {
                    slug: slug.to_string(),
                    item_type: item_type.to_string(),
                    title: format!("{} & co", slug),
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_export_writes_items_and_extension() {
        let store = store();
        let mut sink = MarkerSink::new("mk");
        let mut exporter = WxrExporter::new(&store, "Site");
        exporter.register(&mut sink);

        let mut out = Vec::new();
        let summary = exporter.export(&mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();

        assert_eq!(summary.items, 2);
        assert_eq!(summary.extensions_used.len(), 1);
        assert!(xml.contains(r#"xmlns:mk="urn:marker:mk""#));
        assert!(xml.contains("<wp:post_name>widget</wp:post_name>"));
        assert!(xml.contains("<mk:mark>widget</mk:mark>"));
        assert!(xml.contains("<title>hello &amp; co</title>"));
        assert!(xml.contains(r#"<wp:extension prefix="mk""#));
    }

    #[test]
    fn test_colliding_prefixes_renamed() {
        let store = store();
        let mut first = MarkerSink::new("wp");
        let mut second = MarkerSink::new("wp");
        let mut exporter = WxrExporter::new(&store, "Site");
        exporter.register(&mut first);
        exporter.register(&mut second);

        let mut out = Vec::new();
        exporter.export(&mut out).unwrap();
        drop(exporter);
        let xml = String::from_utf8(out).unwrap();

        assert_eq!(first.prefix, "wp1");
        assert_eq!(second.prefix, "wp2");
        assert!(xml.contains("<wp1:mark>widget</wp1:mark>"));
        assert!(xml.contains("<wp2:mark>widget</wp2:mark>"));
    }

    #[test]
    fn test_unused_extension_not_advertised() {
        let store = SqliteStore::in_memory("wp_").unwrap();
        let mut sink = MarkerSink::new("mk");
        let mut exporter = WxrExporter::new(&store, "Empty");
        exporter.register(&mut sink);

        let mut out = Vec::new();
        let summary = exporter.export(&mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();

        assert_eq!(summary.items, 0);
        assert!(summary.extensions_used.is_empty());
        assert!(!xml.contains("wp:extension"));
    }
}
