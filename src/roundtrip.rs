//! Wires the relationship exporter/importer into the WXR host for a whole site.

use std::io::Write;

use serde::Serialize;

use crate::config::{ExportConfig, ImportConfig};
use crate::error::Result;
use crate::export::RelationshipExporter;
use crate::import::{ImportReport, RelationshipImporter};
use crate::storage::{ContentStore, RelationshipStore};
use crate::wxr::{ExportSummary, ImportSummary, WxrExporter, WxrImporter};

/// Result of exporting a site
#[derive(Debug, Clone, Serialize)]
pub struct SiteExport {
    #[serde(flatten)]
    pub summary: ExportSummary,
    /// `None` when the site has no relationship table
    pub relationships: Option<usize>,
}

/// Result of importing a document into a site
#[derive(Debug, Clone, Serialize)]
pub struct SiteImport {
    #[serde(flatten)]
    pub summary: ImportSummary,
    pub relationships: ImportReport,
}

/// Export every item of `store`, with its relationships, to `out`
pub fn export_site<S, W>(store: &S, config: &ExportConfig, out: W) -> Result<SiteExport>
where
    S: ContentStore + RelationshipStore,
    W: Write,
{
    let mut relationships = RelationshipExporter::new(store, config)?;
    let mut exporter = WxrExporter::new(store, &config.site_title);
    if let Some(relationships) = relationships.as_mut() {
        exporter.register(relationships);
    }

    let summary = exporter.export(out)?;
    drop(exporter);

    Ok(SiteExport {
        summary,
        relationships: relationships.map(|r| r.rows_written()),
    })
}

/// Import an export document into `store`, rebuilding relationships
pub fn import_site<S>(store: &S, config: &ImportConfig, xml: &str) -> Result<SiteImport>
where
    S: ContentStore + RelationshipStore,
{
    let mut relationships = RelationshipImporter::new(store, config);
    let mut importer = WxrImporter::new(store);
    importer.register(&mut relationships);

    let summary = importer.import(xml)?;
    drop(importer);

    Ok(SiteImport {
        summary,
        relationships: relationships.report().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnValue, ItemId, NewItem, RelationshipMeta, SqliteStore};
    use crate::P2P_NAMESPACE_URI;

    fn insert(store: &SqliteStore, slug: &str, item_type: &str) -> ItemId {
        store
            .insert_item(&NewItem {
                slug: slug.to_string(),
                item_type: item_type.to_string(),
                title: slug.to_string(),
            })
            .unwrap()
    }

    fn relate(store: &SqliteStore, from: ItemId, to: ItemId, rel_type: &str, metas: &[(&str, &str)]) {
        let id = store
            .insert_row(&[
                ("p2p_from", ColumnValue::Item(from)),
                ("p2p_to", ColumnValue::Item(to)),
                ("p2p_type", ColumnValue::Text(rel_type.to_string())),
            ])
            .unwrap();
        for (key, value) in metas {
            store.attach_metadata(id, key, value).unwrap();
        }
    }

    fn export_to_string(store: &SqliteStore) -> (SiteExport, String) {
        let mut out = Vec::new();
        let export = export_site(store, &ExportConfig::default(), &mut out).unwrap();
        (export, String::from_utf8(out).unwrap())
    }

    /// Relationships of `slug` on `store` as (target slug, target type, rel type, metas)
    fn relationships_of(store: &SqliteStore, slug: &str, item_type: &str) -> Vec<(String, String, String, Vec<RelationshipMeta>)> {
        let from = store.find_item(slug, item_type).unwrap().unwrap();
        let mut out: Vec<_> = store
            .relationships_from(from)
            .unwrap()
            .into_iter()
            .map(|row| {
                let target = store.item(row.to).unwrap().unwrap();
                (target.slug, target.item_type, row.rel_type, store.metadata_for(row.id).unwrap())
            })
            .collect();
        out.sort();
        out
    }

    /// A (identity 1) → widget/product, `related`, {order: 1}
    fn source_site() -> SqliteStore {
        let store = SqliteStore::in_memory("wp_").unwrap();
        store.install().unwrap();
        let a = insert(&store, "a", "post");
        let widget = insert(&store, "widget", "product");
        relate(&store, a, widget, "related", &[("order", "1")]);
        store
    }

    #[test]
    fn test_export_scenario() {
        let store = source_site();
        let (export, xml) = export_to_string(&store);

        assert_eq!(export.summary.items, 2);
        assert_eq!(export.relationships, Some(1));
        assert_eq!(xml.matches("<p2p:p2p>").count(), 1);
        assert!(xml.contains(&format!(r#"xmlns:p2p="{}""#, P2P_NAMESPACE_URI)));
        assert!(xml.contains("<p2p:to>widget</p2p:to>"));
        assert!(xml.contains("<p2p:to_type>product</p2p:to_type>"));
        assert!(xml.contains("<p2p:type>related</p2p:type>"));
        assert!(xml.contains("<p2p:key>order</p2p:key>"));
        assert!(xml.contains("<p2p:value>1</p2p:value>"));
        assert!(!xml.contains("p2p_id"));
        assert_eq!(export.summary.extensions_used.len(), 1);
    }

    #[test]
    fn test_round_trip_forward_reference() {
        // "a" precedes "widget" in the document, so its relationship is deferred
        let source = source_site();
        let (_, xml) = export_to_string(&source);

        let target = SqliteStore::in_memory("wp_").unwrap();
        let import = import_site(&target, &ImportConfig::default(), &xml).unwrap();

        assert_eq!(import.summary.items_created, 2);
        assert_eq!(import.relationships.deferred, 1);
        assert_eq!(import.relationships.resolved_on_replay, 1);
        assert_eq!(import.relationships.dropped, 0);
        assert_eq!(
            relationships_of(&target, "a", "post"),
            relationships_of(&source, "a", "post")
        );
    }

    #[test]
    fn test_round_trip_target_first() {
        let source = SqliteStore::in_memory("wp_").unwrap();
        source.install().unwrap();
        let widget = insert(&source, "widget", "product");
        let a = insert(&source, "a", "post");
        relate(&source, a, widget, "related", &[("order", "1")]);
        let (_, xml) = export_to_string(&source);

        let target = SqliteStore::in_memory("wp_").unwrap();
        let import = import_site(&target, &ImportConfig::default(), &xml).unwrap();

        assert_eq!(import.relationships.inserted, 1);
        assert_eq!(import.relationships.deferred, 0);
        let rows = relationships_of(&target, "a", "post");
        assert_eq!(
            rows,
            vec![(
                "widget".to_string(),
                "product".to_string(),
                "related".to_string(),
                vec![RelationshipMeta::new("order", "1")]
            )]
        );
    }

    #[test]
    fn test_round_trip_many_relationships_and_metas() {
        let source = SqliteStore::in_memory("wp_").unwrap();
        source.install().unwrap();
        let hub = insert(&source, "hub", "page");
        let spokes: Vec<ItemId> = (0..4).map(|i| insert(&source, &format!("spoke-{}", i), "post")).collect();
        for (i, spoke) in spokes.iter().enumerate() {
            let metas: Vec<(String, String)> = (0..i).map(|n| (format!("k{}", n), format!("v & {}", n))).collect();
            let metas: Vec<(&str, &str)> = metas.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            relate(&source, hub, *spoke, "spoke", &metas);
            relate(&source, *spoke, hub, "hub", &[]);
        }
        let (_, xml) = export_to_string(&source);

        let target = SqliteStore::in_memory("site2_").unwrap();
        let import = import_site(&target, &ImportConfig::default(), &xml).unwrap();

        assert_eq!(import.relationships.elements, 8);
        assert_eq!(import.relationships.inserted + import.relationships.resolved_on_replay, 8);
        assert_eq!(import.relationships.metas_inserted, 6);
        assert_eq!(relationships_of(&target, "hub", "page"), relationships_of(&source, "hub", "page"));
        for i in 0..4 {
            let slug = format!("spoke-{}", i);
            assert_eq!(relationships_of(&target, &slug, "post"), relationships_of(&source, &slug, "post"));
        }
    }

    #[test]
    fn test_round_trip_with_slugless_item() {
        let source = SqliteStore::in_memory("wp_").unwrap();
        source.install().unwrap();
        let a = insert(&source, "a", "post");
        insert(&source, "", "post");
        let b = insert(&source, "b", "post");
        relate(&source, a, b, "related", &[]);
        let (_, xml) = export_to_string(&source);

        let target = SqliteStore::in_memory("wp_").unwrap();
        let import = import_site(&target, &ImportConfig::default(), &xml).unwrap();

        assert_eq!(import.summary.items_skipped, 1);
        assert_eq!(import.summary.items_created, 2);
        assert_eq!(import.relationships.resolved_on_replay, 1);
        assert_eq!(
            relationships_of(&target, "a", "post"),
            relationships_of(&source, "a", "post")
        );
        assert_eq!(target.find_item("", "post").unwrap(), None);
    }

    #[test]
    fn test_site_without_relationship_table() {
        let source = SqliteStore::in_memory("wp_").unwrap();
        insert(&source, "lonely", "post");
        let (export, xml) = export_to_string(&source);

        assert_eq!(export.relationships, None);
        assert!(!xml.contains(P2P_NAMESPACE_URI));
        assert!(export.summary.extensions_used.is_empty());
    }

    #[test]
    fn test_unused_namespace_not_reported() {
        let source = SqliteStore::in_memory("wp_").unwrap();
        source.install().unwrap();
        insert(&source, "a", "post");
        insert(&source, "b", "post");
        let (export, xml) = export_to_string(&source);

        assert_eq!(export.relationships, Some(0));
        assert!(export.summary.extensions_used.is_empty());
        assert!(!xml.contains("<p2p:p2p>"));
        assert!(!xml.contains("wp:extension"));
    }

    #[test]
    fn test_dangling_reference_in_document() {
        let xml = format!(
            r#"<rss version="2.0" xmlns:wp="http://wordpress.org/export/1.3/" xmlns:rel="{ns}">
  <channel>
    <item>
      <wp:post_name>a</wp:post_name>
      <wp:post_type>post</wp:post_type>
      <rel:p2p><rel:to>nowhere</rel:to><rel:to_type>post</rel:to_type><rel:type>related</rel:type></rel:p2p>
      <rel:p2p><rel:bogus/></rel:p2p>
    </item>
  </channel>
</rss>"#,
            ns = P2P_NAMESPACE_URI
        );

        let target = SqliteStore::in_memory("wp_").unwrap();
        let import = import_site(&target, &ImportConfig::default(), &xml).unwrap();

        assert_eq!(import.relationships.malformed, 1);
        assert_eq!(import.relationships.dropped, 1);
        assert!(relationships_of(&target, "a", "post").is_empty());
    }
}
