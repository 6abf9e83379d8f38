use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::{P2pError, Result};

/// An owned, namespace-resolved XML element
///
/// Only element children are kept; text directly inside the element is
/// concatenated into `text`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawElement {
    /// Resolved namespace URI, `None` when the element is unqualified
    pub namespace: Option<String>,
    pub local_name: String,
    pub text: String,
    pub children: Vec<RawElement>,
}

impl RawElement {
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, child: RawElement) -> Self {
        self.children.push(child);
        self
    }

    /// Whether this element is `{namespace}local_name`
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.in_namespace(namespace) && self.local_name == local_name
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }

    /// First child named `{namespace}local_name`
    pub fn child(&self, namespace: Option<&str>, local_name: &str) -> Option<&RawElement> {
        self.children
            .iter()
            .find(|c| c.namespace.as_deref() == namespace && c.local_name == local_name)
    }

    /// Text of this element and all its descendants, in document order of elements
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Parse a complete XML document and return its root element
    pub fn parse(xml: &str) -> Result<RawElement> {
        let mut reader = NsReader::from_str(xml);

        let mut stack: Vec<RawElement> = Vec::new();
        let mut root: Option<RawElement> = None;

        loop {
            match reader.read_resolved_event() {
                Ok((ns, Event::Start(e))) => {
                    stack.push(RawElement {
                        namespace: namespace_of(ns),
                        local_name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        ..Default::default()
                    });
                }
                Ok((ns, Event::Empty(e))) => {
                    let element = RawElement {
                        namespace: namespace_of(ns),
                        local_name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        ..Default::default()
                    };
                    attach(&mut stack, &mut root, element)?;
                }
                Ok((_, Event::End(_))) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| P2pError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok((_, Event::Text(e))) => {
                    if let Some(current) = stack.last_mut() {
                        let text = e.unescape()?;
                        current.text.push_str(&text);
                    }
                }
                Ok((_, Event::CData(e))) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok((_, Event::Eof)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(P2pError::Xml(format!(
                        "parse error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if !stack.is_empty() {
            return Err(P2pError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| P2pError::Xml("no root element found".to_string()))
    }
}

fn namespace_of(ns: ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn attach(stack: &mut Vec<RawElement>, root: &mut Option<RawElement>, element: RawElement) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(P2pError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}
