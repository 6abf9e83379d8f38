use std::collections::BTreeMap;

use crate::storage::{ColumnValue, RelationshipMeta};
use crate::wxr::RawElement;
use crate::P2P_NAMESPACE_URI;

/// Wire fields recognized inside `<p2p>`
const FIELDS: &[&str] = &["to", "to_type", "type"];

/// One `<p2p>` element, still in wire vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedRelationship {
    /// Keyed by wire name (`from`, `to`, `to_type`, `type`)
    pub fields: BTreeMap<&'static str, ColumnValue>,
    pub metas: Vec<RelationshipMeta>,
}

impl ParsedRelationship {
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(ColumnValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Parse one raw `<p2p>` element.
///
/// Returns `None` when none of `to`, `to_type`, `type` is present.
pub fn parse_relationship(element: &RawElement) -> Option<ParsedRelationship> {
    let mut parsed = ParsedRelationship::default();

    for child in element.children.iter().filter(|c| c.in_namespace(P2P_NAMESPACE_URI)) {
        if let Some(field) = FIELDS.iter().find(|f| **f == child.local_name) {
            parsed.fields.insert(*field, ColumnValue::Text(child.text_content()));
        } else if child.local_name == "meta" {
            if let Some(meta) = parse_meta(child) {
                parsed.metas.push(meta);
            }
        }
    }

    if parsed.fields.is_empty() {
        return None;
    }
    Some(parsed)
}

fn parse_meta(element: &RawElement) -> Option<RelationshipMeta> {
    let mut key = None;
    let mut value = None;

    for child in element.children.iter().filter(|c| c.in_namespace(P2P_NAMESPACE_URI)) {
        match child.local_name.as_str() {
            "key" => key = Some(child.text_content()),
            "value" => value = Some(child.text_content()),
            _ => {}
        }
    }

    match key {
        Some(key) => Some(RelationshipMeta {
            key,
            value: value.unwrap_or_default(),
        }),
        None => {
            log::warn!("Relationship meta without a key, skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2p(name: &str) -> RawElement {
        RawElement::new(Some(P2P_NAMESPACE_URI), name)
    }

    fn field(name: &str, text: &str) -> RawElement {
        p2p(name).with_text(text)
    }

    #[test]
    fn test_parse_full_element() {
        let element = RawElement::parse(&format!(
            r#"<p:p2p xmlns:p="{ns}">
                 <p:to>widget</p:to>
                 <p:to_type>product</p:to_type>
                 <p:type>related</p:type>
                 <p:meta><p:key>order</p:key><p:value>1</p:value></p:meta>
                 <p:meta><p:key>order</p:key><p:value>2</p:value></p:meta>
               </p:p2p>"#,
            ns = P2P_NAMESPACE_URI
        ))
        .unwrap();

        let parsed = parse_relationship(&element).unwrap();
        assert_eq!(parsed.text("to"), Some("widget"));
        assert_eq!(parsed.text("to_type"), Some("product"));
        assert_eq!(parsed.text("type"), Some("related"));
        assert_eq!(
            parsed.metas,
            vec![RelationshipMeta::new("order", "1"), RelationshipMeta::new("order", "2")]
        );
    }

    #[test]
    fn test_foreign_and_unknown_children_ignored() {
        let element = p2p("p2p")
            .with_child(field("to", "widget"))
            .with_child(RawElement::new(Some("urn:other"), "type").with_text("spoofed"))
            .with_child(RawElement::new(None, "to_type").with_text("unqualified"))
            .with_child(field("color", "blue"));

        let parsed = parse_relationship(&element).unwrap();
        assert_eq!(parsed.fields.len(), 1);
        assert_eq!(parsed.text("to"), Some("widget"));
        assert_eq!(parsed.text("type"), None);
    }

    #[test]
    fn test_no_recognized_fields_is_malformed() {
        assert!(parse_relationship(&p2p("p2p")).is_none());

        // metas alone do not make a relationship
        let only_meta = p2p("p2p").with_child(
            p2p("meta")
                .with_child(field("key", "k"))
                .with_child(field("value", "v")),
        );
        assert!(parse_relationship(&only_meta).is_none());

        let foreign = p2p("p2p").with_child(RawElement::new(Some("urn:other"), "to").with_text("x"));
        assert!(parse_relationship(&foreign).is_none());
    }

    #[test]
    fn test_meta_without_key_dropped_and_missing_value_empty() {
        let element = p2p("p2p")
            .with_child(field("to", "widget"))
            .with_child(p2p("meta").with_child(field("value", "orphan")))
            .with_child(p2p("meta").with_child(field("key", "flag")));

        let parsed = parse_relationship(&element).unwrap();
        assert_eq!(parsed.metas, vec![RelationshipMeta::new("flag", "")]);
    }
}
