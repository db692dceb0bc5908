//! Android manifest element tree
//!
//! The manifest is patched structurally rather than textually. The parser
//! keeps every non-element node verbatim and keeps the original start-tag
//! text of each element until one of its attributes changes, so an
//! untouched document serializes back byte for byte.

use crate::applicator::PatchOutcome;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use seva_core::error::{Error, Result};

/// Attribute with its value kept in escaped form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name, such as `android:name`
    pub name: String,
    raw_value: String,
}

impl Attribute {
    /// Unescaped value
    pub fn value(&self) -> String {
        unescape(&self.raw_value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| self.raw_value.clone())
    }
}

/// Element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified tag name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order
    pub children: Vec<Node>,
    self_closing: bool,
    /// Original text between `<` and `>` (or `/>`), dropped once modified
    raw_tag: Option<String>,
    /// Whitespace placed before each attribute when re-rendering
    separator: String,
}

impl Element {
    /// Empty self-closing element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
            raw_tag: None,
            separator: " ".to_string(),
        }
    }

    /// Unescaped value of the attribute named `name`
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(Attribute::value)
    }

    /// Set an attribute, returning whether anything changed
    pub fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        let raw_value = escape(value).into_owned();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) if existing.value() == value => return false,
            Some(existing) => existing.raw_value = raw_value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                raw_value,
            }),
        }
        self.raw_tag = None;
        true
    }

    /// First direct child element named `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Mutable variant of [`Element::child`]
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    fn from_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Self> {
        let raw = String::from_utf8_lossy(start).into_owned();
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| {
                Error::malformed(format!("invalid attribute on <{}>: {}", name, e))
            })?;
            attributes.push(Attribute {
                name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                raw_value: String::from_utf8_lossy(&attr.value).replace('"', "&quot;"),
            });
        }

        let leading: String = raw[name.len()..]
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect();
        let separator = if leading.is_empty() { " ".to_string() } else { leading };

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            self_closing,
            raw_tag: Some(raw),
            separator,
        })
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        match &self.raw_tag {
            Some(raw) => out.push_str(raw),
            None => {
                out.push_str(&self.name);
                for attr in &self.attributes {
                    out.push_str(&self.separator);
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&attr.raw_value);
                    out.push('"');
                }
            }
        }

        if self.self_closing && self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Any node in the document, non-element nodes kept as raw markup content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Character data, still escaped
    Text(String),
    /// CDATA section body
    CData(String),
    /// Comment body
    Comment(String),
    /// XML declaration body
    Declaration(String),
    /// Processing instruction body
    ProcessingInstruction(String),
    /// Doctype body
    DocType(String),
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write(out),
            Node::Text(raw) => out.push_str(raw),
            Node::CData(raw) => {
                out.push_str("<![CDATA[");
                out.push_str(raw);
                out.push_str("]]>");
            }
            Node::Comment(raw) => {
                out.push_str("<!--");
                out.push_str(raw);
                out.push_str("-->");
            }
            Node::Declaration(raw) | Node::ProcessingInstruction(raw) => {
                out.push_str("<?");
                out.push_str(raw);
                out.push_str("?>");
            }
            Node::DocType(raw) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(raw.trim_start());
                out.push('>');
            }
        }
    }
}

/// Parsed XML document with a single root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Nodes before the root element
    pub prolog: Vec<Node>,
    /// The root element
    pub root: Element,
    /// Nodes after the root element
    pub epilog: Vec<Node>,
}

impl XmlDocument {
    /// Parse `text`, failing with `MalformedStructuredInput` on invalid XML
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::malformed(format!(
                    "invalid XML near byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            let node = match event {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start, false)?);
                    continue;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::malformed("closing tag without matching start"))?;
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(Element::from_start(&start, true)?),
                Event::Text(t) => Node::Text(lossy(&t)),
                Event::CData(c) => Node::CData(lossy(&c)),
                Event::Comment(c) => Node::Comment(lossy(&c)),
                Event::Decl(d) => Node::Declaration(lossy(&d)),
                Event::PI(p) => Node::ProcessingInstruction(lossy(&p)),
                Event::DocType(d) => Node::DocType(lossy(&d)),
                Event::Eof => break,
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }
            match node {
                Node::Element(element) => {
                    if root.is_some() {
                        return Err(Error::malformed(format!(
                            "second root element <{}>",
                            element.name
                        )));
                    }
                    root = Some(element);
                }
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::malformed(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| Error::malformed("document has no root element"))?;

        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Serialize back to text; an unmodified document round-trips byte for byte
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            node.write(&mut out);
        }
        self.root.write(&mut out);
        for node in &self.epilog {
            node.write(&mut out);
        }
        out
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Attributes written by the manifest fix
pub const COMPONENT_FACTORY_ATTR: &str = "android:appComponentFactory";
/// Attribute naming the overridden manifest attributes
pub const TOOLS_REPLACE_ATTR: &str = "tools:replace";
/// Attribute declaring the tools namespace
pub const TOOLS_NAMESPACE_ATTR: &str = "xmlns:tools";

/// Overrides `android:appComponentFactory` so the AndroidX factory wins
/// over the one merged in from legacy support libraries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPatch {
    /// Patch name used in logs and reports
    pub name: String,
    /// Value for `xmlns:tools` on the root
    pub tools_namespace: String,
    /// Value for `android:appComponentFactory`
    pub component_factory: String,
}

impl ManifestPatch {
    /// Manifest fix with the given namespace and factory
    pub fn new(tools_namespace: impl Into<String>, component_factory: impl Into<String>) -> Self {
        Self {
            name: "manifest-fix".to_string(),
            tools_namespace: tools_namespace.into(),
            component_factory: component_factory.into(),
        }
    }

    /// Set the attributes on a parsed tree, returning how many changed
    pub fn apply_to_document(&self, doc: &mut XmlDocument) -> Result<usize> {
        if doc.root.name != "manifest" {
            return Err(Error::malformed(format!(
                "root element is <{}>, expected <manifest>",
                doc.root.name
            )));
        }
        if doc.root.child("application").is_none() {
            return Err(Error::malformed("<manifest> has no <application> element"));
        }

        let mut changed = usize::from(
            doc.root
                .set_attribute(TOOLS_NAMESPACE_ATTR, &self.tools_namespace),
        );

        if let Some(application) = doc.root.child_mut("application") {
            changed += usize::from(
                application.set_attribute(COMPONENT_FACTORY_ATTR, &self.component_factory),
            );
            changed += usize::from(
                application.set_attribute(TOOLS_REPLACE_ATTR, COMPONENT_FACTORY_ATTR),
            );
        }

        Ok(changed)
    }

    /// Parse, patch and re-serialize manifest text
    ///
    /// Unchanged documents come back as the original text.
    pub fn apply_to(&self, contents: &str) -> Result<(String, PatchOutcome)> {
        let mut doc = XmlDocument::parse(contents)?;
        let changed = self.apply_to_document(&mut doc)?;

        let patched = if changed == 0 {
            contents.to_string()
        } else {
            doc.to_xml()
        };
        Ok((patched, PatchOutcome::AttributesSet { changed }))
    }
}
