use super::error::FilterError;
use super::matcher::MatchType;
use super::tree::{FilterTree, MatchFilter, NodeId, NodeKind};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Wrapper element holding several top-level filters
pub const DOCUMENT_TAG: &str = "FilterTree";

/// Deepest element nesting accepted when reading a document
pub const MAX_NESTING: usize = 256;

/// Child elements carrying node properties rather than nested filters
const PROPERTY_TAGS: [&str; 3] = ["Name", "Key", "Value"];

#[derive(Debug, Default)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn first_child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    fn child_text(&self, tag: &str) -> String {
        self.first_child(tag)
            .map(|child| child.text.clone())
            .unwrap_or_default()
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, FilterError> {
    let mut element = Element {
        tag: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Element::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| FilterError::DocumentParse(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| FilterError::DocumentParse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn close_element(
    stack: &mut [Element],
    document: &mut Option<Element>,
    element: Element,
) -> Result<(), FilterError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if document.is_some() {
        Err(FilterError::DocumentParse(format!(
            "unexpected second root element <{}>",
            element.tag
        )))
    } else {
        *document = Some(element);
        Ok(())
    }
}

/// Parse XML text into a lightweight element tree
fn parse_elements(xml: &str) -> Result<Element, FilterError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut document = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            FilterError::DocumentParse(format!(
                "{} (near byte {})",
                e,
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_NESTING {
                    return Err(FilterError::DocumentParse(format!(
                        "elements nested deeper than {MAX_NESTING} levels"
                    )));
                }
                stack.push(element_from(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from(&start)?;
                close_element(&mut stack, &mut document, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    FilterError::DocumentParse("closing tag without opening tag".to_string())
                })?;
                close_element(&mut stack, &mut document, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| FilterError::DocumentParse(e.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FilterError::DocumentParse(format!(
            "element <{}> is never closed",
            open.tag
        )));
    }

    document.ok_or_else(|| FilterError::DocumentParse("document has no root element".to_string()))
}

fn parse_match_type(element: &Element) -> MatchType {
    let Some(name) = element.attribute("type") else {
        return MatchType::Exact;
    };

    MatchType::ALL
        .into_iter()
        .find(|t| t.as_str() == name)
        .unwrap_or_else(|| {
            warn!(match_type = name, "unknown match type, falling back to Exact");
            MatchType::Exact
        })
}

/// Read one filter element and append it to `parent`
fn read_filter(tree: &mut FilterTree, element: &Element, parent: NodeId) {
    if PROPERTY_TAGS.contains(&element.tag.as_str()) {
        return;
    }

    let Some(kind) = NodeKind::from_tag_name(&element.tag) else {
        warn!(tag = %element.tag, "unknown filter type, element skipped");
        return;
    };

    let parent_is_combinator = tree.node(parent).is_some_and(|node| node.is_combinator());
    if !parent_is_combinator {
        warn!(tag = %element.tag, "parent is not a collection, element dropped");
        return;
    }

    let name = element.child_text("Name");
    let id = match kind {
        NodeKind::Match => {
            let filter = MatchFilter::new(
                parse_match_type(element),
                element.child_text("Key"),
                element.child_text("Value"),
            );
            tree.create_match(name, filter)
        }
        other => tree.create(other, name),
    };

    let enabled = element.attribute("active").is_none_or(|v| v == "true");
    if let Err(err) = tree.set_enabled(id, enabled) {
        warn!(error = %err, "failed to set enabled flag");
    }

    for child in &element.children {
        read_filter(tree, child, id);
    }

    if let Err(err) = tree.append_child(parent, id) {
        warn!(tag = %element.tag, error = %err, "failed to attach filter");
        if let Err(err) = tree.free_subtree(id) {
            warn!(tag = %element.tag, error = %err, "failed to free unattached filter");
        }
    }
}

fn write_error(err: impl Display) -> FilterError {
    FilterError::Serialize(err.to_string())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), FilterError> {
    if text.is_empty() {
        return writer
            .write_event(Event::Empty(BytesStart::new(tag)))
            .map_err(write_error);
    }

    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(write_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(write_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(write_error)
}

impl FilterTree {
    /// Build a tree from a filter document, under a root Union named `root`
    pub fn from_xml(xml: &str) -> Result<Self, FilterError> {
        Self::from_xml_with_root(xml, "root")
    }

    pub fn from_xml_with_root(xml: &str, root_name: &str) -> Result<Self, FilterError> {
        let document = parse_elements(xml)?;
        let mut tree = FilterTree::new(root_name);
        let root = tree.root();

        if document.tag == DOCUMENT_TAG {
            for child in &document.children {
                read_filter(&mut tree, child, root);
            }
        } else {
            read_filter(&mut tree, &document, root);
        }

        debug!(
            filters = tree.node_count() - 1,
            top_level = tree.child_count(root),
            "filter document loaded"
        );
        Ok(tree)
    }

    pub fn from_reader<R: Read>(mut reader: R, root_name: &str) -> Result<Self, FilterError> {
        let mut xml = String::new();
        reader
            .read_to_string(&mut xml)
            .map_err(|source| FilterError::Io {
                path: "<reader>".to_string(),
                source,
            })?;
        Self::from_xml_with_root(&xml, root_name)
    }

    pub fn from_path(path: &Path, root_name: &str) -> Result<Self, FilterError> {
        let xml = std::fs::read_to_string(path).map_err(|source| FilterError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_xml_with_root(&xml, root_name)
    }

    /// Serialize the root's children as a filter document
    pub fn to_xml(&self) -> Result<String, FilterError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        String::from_utf8(buffer).map_err(write_error)
    }

    pub fn write_to<W: Write>(&self, out: W) -> Result<(), FilterError> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;

        let children = self.children(self.root());
        if children.is_empty() {
            writer
                .write_event(Event::Empty(BytesStart::new(DOCUMENT_TAG)))
                .map_err(write_error)?;
        } else {
            writer
                .write_event(Event::Start(BytesStart::new(DOCUMENT_TAG)))
                .map_err(write_error)?;
            for child in children {
                self.write_filter(&mut writer, *child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(DOCUMENT_TAG)))
                .map_err(write_error)?;
        }

        writer.get_mut().write_all(b"\n").map_err(write_error)
    }

    fn write_filter<W: Write>(&self, writer: &mut Writer<W>, id: NodeId) -> Result<(), FilterError> {
        let node = self.get(id)?;
        let tag = node.kind().tag().tag_name();

        let mut start = BytesStart::new(tag);
        if let Some(m) = node.as_match() {
            start.push_attribute(("type", m.match_type().as_str()));
        }
        start.push_attribute(("active", if node.enabled() { "true" } else { "false" }));
        writer
            .write_event(Event::Start(start))
            .map_err(write_error)?;

        write_text_element(writer, "Name", node.name())?;
        if let Some(m) = node.as_match() {
            write_text_element(writer, "Key", m.key())?;
            write_text_element(writer, "Value", m.value())?;
        }
        for child in node.children() {
            self.write_filter(writer, *child)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE FilterTree>
<Union>
  <Name>Everything</Name>
  <Match type="Wildcard">
    <Name>Bobs</Name>
    <Key>Name</Key>
    <Value>B*b</Value>
  </Match>
  <Intersection active="false">
    <Name>Disabled group</Name>
    <Default><Name>all</Name></Default>
  </Intersection>
</Union>
"#;

    #[test]
    fn test_single_root_element_is_appended_to_root() {
        let tree = FilterTree::from_xml(SAMPLE).unwrap();
        let root = tree.root();
        assert_eq!(tree.child_count(root), 1);

        let top = tree.child(root, 0).unwrap();
        let node = tree.get(top).unwrap();
        assert_eq!(node.name(), "Everything");
        assert_eq!(node.kind().tag(), NodeKind::Union);
        assert_eq!(tree.child_count(top), 2);

        let m = tree.get(tree.child(top, 0).unwrap()).unwrap();
        let fields = m.as_match().unwrap();
        assert_eq!(m.name(), "Bobs");
        assert_eq!(fields.match_type(), MatchType::Wildcard);
        assert_eq!(fields.key(), "Name");
        assert_eq!(fields.value(), "B*b");

        let group = tree.get(tree.child(top, 1).unwrap()).unwrap();
        assert!(!group.enabled());
        assert_eq!(group.children().len(), 1);
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let xml = r#"<Union><Name>u</Name><Bogus/><Default><Name>d</Name></Default></Union>"#;
        let tree = FilterTree::from_xml(xml).unwrap();
        let top = tree.child(tree.root(), 0).unwrap();
        assert_eq!(tree.child_count(top), 1);
        assert_eq!(tree.get(tree.child(top, 0).unwrap()).unwrap().name(), "d");
    }

    #[test]
    fn test_filter_nested_in_match_is_dropped() {
        let xml = r#"<Union>
            <Match><Name>m</Name><Key>k</Key><Value>v</Value><Union><Name>lost</Name></Union></Match>
        </Union>"#;
        let tree = FilterTree::from_xml(xml).unwrap();
        let top = tree.child(tree.root(), 0).unwrap();
        let m = tree.child(top, 0).unwrap();
        assert_eq!(tree.child_count(m), 0);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_unknown_match_type_falls_back_to_exact() {
        let xml = r#"<Match type="Fuzzy"><Key>k</Key><Value>v</Value></Match>"#;
        let tree = FilterTree::from_xml(xml).unwrap();
        let m = tree.get(tree.child(tree.root(), 0).unwrap()).unwrap();
        assert_eq!(m.as_match().unwrap().match_type(), MatchType::Exact);
        assert_eq!(m.name(), "");
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(matches!(
            FilterTree::from_xml("<Union><Name>x</Name>"),
            Err(FilterError::DocumentParse(_))
        ));
        assert!(matches!(
            FilterTree::from_xml("<Union></Intersection>"),
            Err(FilterError::DocumentParse(_))
        ));
        assert!(matches!(
            FilterTree::from_xml(""),
            Err(FilterError::DocumentParse(_))
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| {
            format!(
                "{}<Default/>{}",
                "<Union>".repeat(depth),
                "</Union>".repeat(depth)
            )
        };

        let tree = FilterTree::from_xml(&nested(MAX_NESTING)).unwrap();
        assert_eq!(tree.node_count(), MAX_NESTING + 2);

        assert!(matches!(
            FilterTree::from_xml(&nested(MAX_NESTING + 1)),
            Err(FilterError::DocumentParse(_))
        ));
    }

    #[test]
    fn test_text_is_escaped_on_write() {
        let mut tree = FilterTree::default();
        let root = tree.root();
        let m = tree.create_match(
            "a < b & \"c\"",
            MatchFilter::new(MatchType::Regex, "Name", "<.*>"),
        );
        tree.append_child(root, m).unwrap();

        let xml = tree.to_xml().unwrap();
        assert!(xml.contains("a &lt; b &amp;"));

        let reread = FilterTree::from_xml(&xml).unwrap();
        let node = reread.get(reread.child(reread.root(), 0).unwrap()).unwrap();
        assert_eq!(node.name(), "a < b & \"c\"");
        assert_eq!(node.as_match().unwrap().value(), "<.*>");
    }

    #[test]
    fn test_empty_tree_writes_empty_document() {
        let xml = FilterTree::default().to_xml().unwrap();
        assert!(xml.contains("<FilterTree/>"));
        assert!(!FilterTree::from_xml(&xml).unwrap().has_filters());
    }
}
