//! A pull reader that walks an XML document one node at a time.
//!
//! [`XmlReader`] sits on top of the [`quick_xml::Reader`] event parser and
//! turns its events into a cursor with node kinds, depths, resolved namespaces
//! and an attribute sub-cursor. Adjacent text and entity references are merged
//! into one text node.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;
use std::str::from_utf8;
use std::sync::Arc;

use log::{debug, trace};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};

use crate::de::DecodeOptions;
use crate::encoding::{choose_encoding, decode_document, Utf8Transcoder};
use crate::errors::{Error, Result};
use crate::name::{is_namespace_decl, split_qname, NamespaceResolver};
use crate::value::Value;
use crate::writer::Writer;

mod iter;

pub use self::iter::ElementIter;

/// The kind of the node the cursor is positioned on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Not positioned on a node: before the first [`XmlReader::advance`] or
    /// after the end of input
    None,
    /// Start tag or empty element tag
    Element,
    /// Attribute of the current element, see [`XmlReader::move_to_first_attribute`]
    Attribute,
    /// Character data, with references already resolved
    Text,
    /// `<![CDATA[...]]>`
    CData,
    /// `<?target data?>`
    ProcessingInstruction,
    /// `<!-- ... -->`
    Comment,
    /// `<!DOCTYPE ...>`
    DocumentType,
    /// Text made of whitespace only
    SignificantWhitespace,
    /// End tag
    EndElement,
    /// `<?xml ...?>`
    XmlDeclaration,
    /// The reader failed; see [`XmlReader::advance`]
    Error,
}

impl NodeKind {
    /// Name of the kind, as shown in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::None => "None",
            NodeKind::Element => "Element",
            NodeKind::Attribute => "Attribute",
            NodeKind::Text => "Text",
            NodeKind::CData => "CDATA",
            NodeKind::ProcessingInstruction => "ProcessingInstruction",
            NodeKind::Comment => "Comment",
            NodeKind::DocumentType => "DocumentType",
            NodeKind::SignificantWhitespace => "SignificantWhitespace",
            NodeKind::EndElement => "EndElement",
            NodeKind::XmlDeclaration => "XmlDeclaration",
            NodeKind::Error => "Error",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute of an element, with its value unescaped.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    name: String,
    value: String,
    namespace_uri: Option<String>,
}

impl Attribute {
    /// Qualified name, e.g. `xml:lang`
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without prefix, e.g. `lang`
    #[inline]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Prefix of the name, if any
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    /// Value with references resolved
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Namespace bound to the prefix. Unprefixed attributes have none.
    #[inline]
    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }
}

/// A parsed node waiting in the look-ahead queue or under the cursor.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) depth: usize,
    pub(crate) name: String,
    pub(crate) value: Option<String>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) is_empty: bool,
    pub(crate) namespace_uri: Option<String>,
}

impl Node {
    fn new(kind: NodeKind, depth: usize) -> Self {
        Node {
            kind,
            depth,
            name: String::new(),
            value: None,
            attributes: Vec::new(),
            is_empty: false,
            namespace_uri: None,
        }
    }

    fn with_value(kind: NodeKind, depth: usize, name: &str, value: String) -> Self {
        Node {
            name: name.to_owned(),
            value: Some(value),
            ..Node::new(kind, depth)
        }
    }

    /// Writes the node back as XML markup.
    fn write_xml(&self, writer: &mut Writer) -> Result<()> {
        let attributes = self
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()));
        match self.kind {
            NodeKind::Element if self.is_empty => writer.write_empty(&self.name, attributes),
            NodeKind::Element => writer.write_start(&self.name, attributes),
            NodeKind::EndElement => writer.write_end(&self.name),
            NodeKind::Text | NodeKind::SignificantWhitespace => writer.write_text(self.text()),
            NodeKind::CData => writer.write_cdata(self.text()),
            NodeKind::Comment => writer.write_comment(self.text()),
            NodeKind::ProcessingInstruction => writer.write_pi(&self.name, self.text()),
            _ => Ok(()),
        }
    }

    #[inline]
    fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

/// An in-memory document shared between a reader, its clones and the error
/// values it produces.
#[derive(Clone)]
struct SharedSource(Arc<str>);

impl AsRef<[u8]> for SharedSource {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Elements nested deeper than this are a parse error unless
/// [`XmlReader::set_max_depth`] says otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A forward-only cursor over the nodes of an XML document.
///
/// # Examples
///
/// ```
/// use xml_value::reader::{NodeKind, XmlReader};
///
/// let mut reader = XmlReader::from_str(r#"<a id="1">text<b/></a>"#);
/// assert_eq!(reader.advance().unwrap(), Some(NodeKind::Element));
/// assert_eq!(reader.name(), "a");
/// assert_eq!(reader.get_attribute("id"), Some("1"));
/// assert_eq!(reader.advance().unwrap(), Some(NodeKind::Text));
/// assert_eq!(reader.value(), Some("text"));
/// assert_eq!(reader.depth(), 1);
/// ```
pub struct XmlReader<'i> {
    parser: quick_xml::Reader<Box<dyn BufRead + 'i>>,
    /// The document, when it is held in memory
    source: Option<SharedSource>,
    buf: Vec<u8>,
    resolver: NamespaceResolver,
    /// Names of the currently open elements
    open: Vec<String>,
    /// Text and references read so far that are not yet turned into a node
    pending_text: String,
    /// Nodes parsed ahead of the cursor
    lookahead: VecDeque<Node>,
    current: Node,
    attr_index: Option<usize>,
    /// Sticky failure: message and position
    failure: Option<(String, Option<u64>)>,
    seen_root: bool,
    eof: bool,
    /// Number of elements that may be open at the same time
    max_depth: usize,
    /// Number of nodes the cursor has visited, used to replay clones
    visited: usize,
    xml_version: Option<String>,
    declared_encoding: Option<String>,
}

/// Constructors
impl<'i> XmlReader<'i> {
    /// Creates a reader over a string.
    pub fn from_str(xml: &str) -> Self {
        let xml = xml.strip_prefix('\u{FEFF}').unwrap_or(xml);
        Self::from_shared(SharedSource(Arc::from(xml)))
    }

    /// Creates a reader over bytes, detecting their encoding from the byte
    /// order mark or the XML declaration.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode_bytes(bytes, None)
    }

    /// Creates a reader over bytes in the encoding with the given label,
    /// e.g. `"ISO-8859-1"`.
    pub fn from_bytes_with_encoding(bytes: &[u8], label: &str) -> Result<Self> {
        Self::decode_bytes(bytes, Some(label))
    }

    /// Creates a reader that pulls the document from a byte stream.
    ///
    /// The encoding is detected from the first bytes of the stream unless
    /// `label` names it. Readers over streams cannot be [reset](Self::reset) or
    /// [cloned](Self::try_clone).
    pub fn from_reader<R: Read + 'i>(reader: R, label: Option<&str>) -> Result<Self> {
        let transcoder = Utf8Transcoder::new(reader, label)?;
        Ok(Self::with_parser(
            Box::new(BufReader::new(transcoder)),
            None,
        ))
    }

    /// Creates a reader over a file.
    pub fn from_file<P: AsRef<Path>>(path: P, label: Option<&str>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, label)
    }

    fn decode_bytes(bytes: &[u8], label: Option<&str>) -> Result<Self> {
        let encoding = choose_encoding(bytes, label)?;
        debug!("decoding document from {}", encoding.name());
        let text = decode_document(bytes, encoding)?;
        Ok(Self::from_shared(SharedSource(Arc::from(text.as_ref()))))
    }

    fn from_shared(source: SharedSource) -> Self {
        let input: Box<dyn BufRead + 'i> = Box::new(Cursor::new(source.clone()));
        Self::with_parser(input, Some(source))
    }

    fn with_parser(input: Box<dyn BufRead + 'i>, source: Option<SharedSource>) -> Self {
        let mut parser = quick_xml::Reader::from_reader(input);
        parser.config_mut().trim_text(false);
        parser.config_mut().check_end_names = true;
        parser.config_mut().check_comments = true;
        Self {
            parser,
            source,
            buf: Vec::new(),
            resolver: NamespaceResolver::default(),
            open: Vec::new(),
            pending_text: String::new(),
            lookahead: VecDeque::new(),
            current: Node::new(NodeKind::None, 0),
            attr_index: None,
            failure: None,
            seen_root: false,
            eof: false,
            max_depth: DEFAULT_MAX_DEPTH,
            visited: 0,
            xml_version: None,
            declared_encoding: None,
        }
    }

    /// Moves an in-memory reader back to the start of its document.
    pub fn reset(&mut self) -> Result<()> {
        match self.source.clone() {
            Some(source) => {
                let max_depth = self.max_depth;
                *self = Self::from_shared(source);
                self.max_depth = max_depth;
                Ok(())
            }
            None => Err(Error::Unsupported("cannot reset a reader over a stream")),
        }
    }

    /// Limits how many elements may be open at the same time. A deeper start
    /// tag makes the reader fail with an [`Error::Parse`]. This also bounds
    /// the recursion of the decoders built on the reader.
    pub fn set_max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = max_depth;
        self
    }

    /// The nesting limit, see [`set_max_depth`](Self::set_max_depth).
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Creates an independent reader over the same in-memory document,
    /// positioned on the same node.
    pub fn try_clone(&self) -> Result<Self> {
        let source = self
            .source
            .clone()
            .ok_or(Error::Unsupported("cannot clone a reader over a stream"))?;
        let mut clone = Self::from_shared(source);
        clone.max_depth = self.max_depth;
        for _ in 0..self.visited {
            if clone.advance()?.is_none() {
                break;
            }
        }
        if self.failure.is_some() && clone.failure.is_none() {
            // this reader failed while looking ahead; make the clone fail as well
            clone.failure = self.failure.clone();
        }
        clone.attr_index = self.attr_index;
        Ok(clone)
    }
}

/// Cursor movement
impl<'i> XmlReader<'i> {
    /// Moves to the next node.
    ///
    /// Returns `Ok(None)` at the end of the document. After an error every
    /// further call returns the same error.
    pub fn advance(&mut self) -> Result<Option<NodeKind>> {
        self.attr_index = None;
        if let Err(e) = self.ensure_lookahead(1) {
            self.current = Node::new(NodeKind::Error, self.current.depth);
            return Err(e);
        }
        match self.lookahead.pop_front() {
            Some(node) => {
                trace!("{} '{}' at depth {}", node.kind, node.name, node.depth);
                self.current = node;
                self.visited += 1;
                Ok(Some(self.current.kind))
            }
            None => {
                self.current = Node::new(NodeKind::None, 0);
                Ok(None)
            }
        }
    }

    /// Moves to the next node that is not made of whitespace only.
    pub fn advance_skipping_whitespace(&mut self) -> Result<Option<NodeKind>> {
        loop {
            match self.advance()? {
                Some(NodeKind::SignificantWhitespace) => continue,
                other => return Ok(other),
            }
        }
    }

    /// Moves the cursor from a start tag to its matching end tag. Does nothing
    /// when the cursor is on any other node or on an empty element.
    pub fn skip_subtree(&mut self) -> Result<()> {
        self.attr_index = None;
        if self.current.kind != NodeKind::Element || self.current.is_empty {
            return Ok(());
        }
        let depth = self.current.depth;
        loop {
            match self.advance()? {
                Some(NodeKind::EndElement) if self.current.depth == depth => return Ok(()),
                Some(_) => continue,
                None => return Err(self.fail("unexpected end of document".to_owned())),
            }
        }
    }

    /// Returns a cursor-like iterator that decodes every element named
    /// `local_name`, see [`ElementIter`].
    pub fn elements<'r>(&'r mut self, local_name: &str, options: DecodeOptions) -> ElementIter<'r, 'i> {
        ElementIter::new(self, local_name, options)
    }

    /// Decodes the current element with the generic decoder, leaving the
    /// cursor on its end tag. With the attribute cursor active, the element
    /// owning the attribute is decoded.
    ///
    /// On a text or other non-element node, that node and its following
    /// siblings are decoded instead, and the cursor is left on the end tag of
    /// their parent.
    pub fn read_value(&mut self, options: &DecodeOptions) -> Result<Value> {
        crate::de::decode_current(self, options)
    }
}

/// Node accessors
impl<'i> XmlReader<'i> {
    /// The kind of the current node, [`NodeKind::Attribute`] while the
    /// attribute cursor is active.
    pub fn kind(&self) -> NodeKind {
        match self.attr_index {
            Some(_) => NodeKind::Attribute,
            None => self.current.kind,
        }
    }

    /// Name of [`kind`](Self::kind), e.g. `"Element"`.
    pub fn kind_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Nesting level: the root element is at depth 0, its children and text at
    /// depth 1. An end tag has the depth of its start tag.
    pub fn depth(&self) -> usize {
        match self.attr_index {
            Some(_) => self.current.depth + 1,
            None => self.current.depth,
        }
    }

    /// Qualified name of the current element or attribute, or the target of a
    /// processing instruction.
    pub fn name(&self) -> &str {
        match self.current_attribute() {
            Some(a) => a.name(),
            None => &self.current.name,
        }
    }

    /// [`name`](Self::name) without its prefix.
    pub fn local_name(&self) -> &str {
        split_qname(self.name()).1
    }

    /// Prefix of [`name`](Self::name), if any.
    pub fn prefix(&self) -> Option<&str> {
        split_qname(self.name()).0
    }

    /// Namespace of the current element or attribute.
    pub fn namespace_uri(&self) -> Option<&str> {
        match self.current_attribute() {
            Some(a) => a.namespace_uri(),
            None => self.current.namespace_uri.as_deref(),
        }
    }

    /// Text of the current text-like node or value of the current attribute.
    pub fn value(&self) -> Option<&str> {
        match self.current_attribute() {
            Some(a) => Some(a.value()),
            None => self.current.value.as_deref(),
        }
    }

    /// Whether [`value`](Self::value) is `Some`.
    pub fn has_value(&self) -> bool {
        self.value().is_some()
    }

    /// Whether the current element has attributes.
    pub fn has_attributes(&self) -> bool {
        !self.current.attributes.is_empty()
    }

    /// Number of attributes of the current element.
    pub fn attribute_count(&self) -> usize {
        self.current.attributes.len()
    }

    /// All attributes of the current element in document order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.current.attributes
    }

    /// Whether the current element was written as `<name/>`. Such elements
    /// have no [`NodeKind::EndElement`] node.
    pub fn is_empty_element(&self) -> bool {
        self.current.kind == NodeKind::Element && self.current.is_empty
    }

    /// Whether the attribute cursor is on an `xmlns` or `xmlns:*` attribute.
    pub fn is_namespace_decl(&self) -> bool {
        self.current_attribute()
            .map_or(false, |a| is_namespace_decl(a.name()))
    }

    /// `version` of the XML declaration, once it has been read.
    pub fn xml_version(&self) -> Option<&str> {
        self.xml_version.as_deref()
    }

    /// `encoding` of the XML declaration, once it has been read. The input is
    /// already decoded, so this is informational only.
    pub fn declared_encoding(&self) -> Option<&str> {
        self.declared_encoding.as_deref()
    }

    /// Value of the attribute with the qualified name `name`.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.current
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value())
    }

    /// Value of the attribute at `index`, in document order.
    pub fn get_attribute_at(&self, index: usize) -> Option<&str> {
        self.current.attributes.get(index).map(|a| a.value())
    }

    /// Value of the attribute with the given local name and namespace.
    pub fn get_attribute_ns(&self, local_name: &str, namespace_uri: &str) -> Option<&str> {
        self.position_ns(local_name, namespace_uri)
            .map(|i| self.current.attributes[i].value())
    }

    /// A copy of the document text, when it is held in memory.
    pub(crate) fn source_text(&self) -> Option<String> {
        self.source.as_ref().map(|s| s.0.to_string())
    }

    fn current_attribute(&self) -> Option<&Attribute> {
        self.attr_index.and_then(|i| self.current.attributes.get(i))
    }

    fn position_ns(&self, local_name: &str, namespace_uri: &str) -> Option<usize> {
        self.current.attributes.iter().position(|a| {
            a.local_name() == local_name && a.namespace_uri() == Some(namespace_uri)
        })
    }
}

/// Attribute cursor
impl<'i> XmlReader<'i> {
    /// Moves the attribute cursor to the first attribute. Returns `false`,
    /// without moving, when there is none. The same holds for the other
    /// `move_to_*attribute*` methods.
    pub fn move_to_first_attribute(&mut self) -> Result<bool> {
        self.move_to_position(Some(0))
    }

    /// Moves to the next attribute, or to the first one when the cursor is on
    /// the element itself.
    pub fn move_to_next_attribute(&mut self) -> Result<bool> {
        let next = self.attr_index.map_or(0, |i| i + 1);
        self.move_to_position(Some(next))
    }

    /// Moves to the attribute with the qualified name `name`.
    pub fn move_to_attribute(&mut self, name: &str) -> Result<bool> {
        let index = self.current.attributes.iter().position(|a| a.name == name);
        self.move_to_position(index)
    }

    /// Moves to the attribute at `index`.
    pub fn move_to_attribute_at(&mut self, index: usize) -> Result<bool> {
        self.move_to_position(Some(index))
    }

    /// Moves to the attribute with the given local name and namespace.
    pub fn move_to_attribute_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<bool> {
        let index = self.position_ns(local_name, namespace_uri);
        self.move_to_position(index)
    }

    /// Leaves the attribute cursor. Returns `false` if it was not active.
    pub fn move_to_element(&mut self) -> Result<bool> {
        self.check_failure()?;
        Ok(self.attr_index.take().is_some())
    }

    fn move_to_position(&mut self, index: Option<usize>) -> Result<bool> {
        self.check_failure()?;
        match index {
            Some(i) if i < self.current.attributes.len() => {
                self.attr_index = Some(i);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn check_failure(&self) -> Result<()> {
        match self.current.kind {
            NodeKind::Error => Err(self.failure_error()),
            _ => Ok(()),
        }
    }
}

/// Serialization of the current subtree
impl<'i> XmlReader<'i> {
    /// The markup of the current element's content, without its own tags.
    /// The cursor does not move.
    pub fn inner_xml(&mut self) -> Result<String> {
        self.subtree_xml(false)
    }

    /// The markup of the current element including its own tags. The cursor
    /// does not move.
    pub fn outer_xml(&mut self) -> Result<String> {
        self.subtree_xml(true)
    }

    fn subtree_xml(&mut self, outer: bool) -> Result<String> {
        let mut out = Writer::new(false, false);
        if self.current.kind != NodeKind::Element {
            if outer {
                self.current.write_xml(&mut out)?;
            }
            return out.into_string();
        }
        if outer {
            self.current.write_xml(&mut out)?;
        }
        if self.current.is_empty {
            return out.into_string();
        }

        let depth = self.current.depth;
        let end = loop {
            let found = self
                .lookahead
                .iter()
                .position(|n| n.kind == NodeKind::EndElement && n.depth == depth);
            if let Some(end) = found {
                break end;
            }
            let queued = self.lookahead.len();
            self.ensure_lookahead(queued + 1)?;
            if self.lookahead.len() == queued {
                return Err(self.fail("unexpected end of document".to_owned()));
            }
        };
        for node in self.lookahead.iter().take(end) {
            node.write_xml(&mut out)?;
        }
        if outer {
            self.lookahead[end].write_xml(&mut out)?;
        }
        out.into_string()
    }
}

/// Event processing
impl<'i> XmlReader<'i> {
    /// Parses until at least `count` nodes wait in the look-ahead queue or the
    /// document ends.
    fn ensure_lookahead(&mut self, count: usize) -> Result<()> {
        if self.failure.is_some() {
            return Err(self.failure_error());
        }
        while self.lookahead.len() < count && !self.eof {
            let mut buf = std::mem::take(&mut self.buf);
            let result = self.parse_next(&mut buf);
            buf.clear();
            self.buf = buf;
            result?;
        }
        Ok(())
    }

    /// Reads events up to and including the next one that is not text.
    fn parse_next(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        loop {
            buf.clear();
            let event = match self.parser.read_event_into(buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = self.parser.error_position() as u64;
                    return Err(self.fail_at(e.to_string(), position));
                }
            };
            match event {
                Event::Text(text) => {
                    let text = text.xml_content().map_err(|e| self.fail(e.to_string()))?;
                    self.pending_text.push_str(&text);
                }
                Event::GeneralRef(reference) => {
                    match reference.resolve_char_ref() {
                        Ok(Some(c)) => self.pending_text.push(c),
                        Ok(None) => {
                            let name = self.utf8(&reference)?;
                            match resolve_predefined_entity(name) {
                                Some(replacement) => self.pending_text.push_str(replacement),
                                None => {
                                    return Err(self.fail(format!("unknown entity `&{};`", name)))
                                }
                            }
                        }
                        Err(e) => return Err(self.fail(e.to_string())),
                    }
                }
                event => {
                    self.flush_text()?;
                    return self.push_event(event);
                }
            }
        }
    }

    fn flush_text(&mut self) -> Result<()> {
        if self.pending_text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.pending_text);
        let whitespace = text.chars().all(char::is_whitespace);
        if self.open.is_empty() {
            if whitespace {
                return Ok(());
            }
            return Err(self.fail(format!(
                "text '{}' outside of the root element",
                text.trim()
            )));
        }
        let kind = if whitespace {
            NodeKind::SignificantWhitespace
        } else {
            NodeKind::Text
        };
        let depth = self.open.len();
        self.lookahead
            .push_back(Node::with_value(kind, depth, "#text", text));
        Ok(())
    }

    fn push_event(&mut self, event: Event) -> Result<()> {
        let depth = self.open.len();
        let node = match event {
            Event::Start(e) => {
                let node = self.start_node(&e, false)?;
                self.open.push(node.name.clone());
                node
            }
            Event::Empty(e) => {
                let node = self.start_node(&e, true)?;
                self.resolver.pop();
                node
            }
            Event::End(e) => {
                let name = self.utf8(e.name().as_ref())?.to_owned();
                match self.open.pop() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(self.fail(format!(
                            "expected `</{}>`, but `</{}>` was found",
                            open, name
                        )))
                    }
                    None => return Err(self.fail(format!("unmatched end tag `</{}>`", name))),
                }
                let mut node = Node::new(NodeKind::EndElement, self.open.len());
                node.namespace_uri = self.resolver.resolve(&name, true).map(str::to_owned);
                node.name = name;
                self.resolver.pop();
                node
            }
            Event::CData(e) => {
                if self.open.is_empty() {
                    return Err(self.fail("CDATA section outside of the root element".to_owned()));
                }
                let text = self.utf8(&e)?.to_owned();
                Node::with_value(NodeKind::CData, depth, "#cdata-section", text)
            }
            Event::Comment(e) => {
                let text = self.utf8(&e)?.to_owned();
                Node::with_value(NodeKind::Comment, depth, "#comment", text)
            }
            Event::PI(e) => {
                let content = self.utf8(&e)?;
                let (target, data) = match content.find(|c: char| c.is_whitespace()) {
                    Some(i) => (&content[..i], content[i..].trim_start()),
                    None => (content, ""),
                };
                Node::with_value(
                    NodeKind::ProcessingInstruction,
                    depth,
                    target,
                    data.to_owned(),
                )
            }
            Event::DocType(e) => {
                let content = self.utf8(&e)?.trim();
                let (name, rest) = match content.find(|c: char| c.is_whitespace()) {
                    Some(i) => (&content[..i], content[i..].trim_start()),
                    None => (content, ""),
                };
                Node::with_value(NodeKind::DocumentType, depth, name, rest.to_owned())
            }
            Event::Decl(e) => {
                self.xml_version = e
                    .version()
                    .ok()
                    .map(|v| String::from_utf8_lossy(&v).into_owned());
                self.declared_encoding = e
                    .encoding()
                    .and_then(|v| v.ok())
                    .map(|v| String::from_utf8_lossy(&v).into_owned());
                let mut node = Node::new(NodeKind::XmlDeclaration, depth);
                node.name = "xml".to_owned();
                node
            }
            Event::Text(_) | Event::GeneralRef(_) => return Ok(()),
            Event::Eof => {
                if let Some(open) = self.open.last() {
                    let message = format!("unclosed element `<{}>` at end of document", open);
                    return Err(self.fail(message));
                }
                if !self.seen_root {
                    return Err(self.fail("document is empty".to_owned()));
                }
                self.eof = true;
                return Ok(());
            }
        };
        self.lookahead.push_back(node);
        Ok(())
    }

    fn start_node(&mut self, start: &BytesStart, is_empty: bool) -> Result<Node> {
        if self.open.is_empty() && self.seen_root {
            return Err(self.fail("extra content at the end of the document".to_owned()));
        }
        if self.open.len() >= self.max_depth {
            let message = format!("maximum nesting depth of {} exceeded", self.max_depth);
            return Err(self.fail(message));
        }
        self.seen_root = true;

        let name = self.utf8(start.name().as_ref())?.to_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.fail(e.to_string()))?;
            let key = self.utf8(attr.key.as_ref())?.to_owned();
            let value = attr.unescape_value().map_err(|e| self.fail(e.to_string()))?;
            attributes.push(Attribute {
                name: key,
                value: value.into_owned(),
                namespace_uri: None,
            });
        }

        self.resolver.push(
            attributes
                .iter()
                .map(|a| (a.name.as_str(), a.value.as_str())),
        );
        for a in attributes.iter_mut() {
            a.namespace_uri = self.resolver.resolve(&a.name, false).map(str::to_owned);
        }
        Ok(Node {
            kind: NodeKind::Element,
            depth: self.open.len(),
            namespace_uri: self.resolver.resolve(&name, true).map(str::to_owned),
            name,
            value: None,
            attributes,
            is_empty,
        })
    }

    fn utf8<'b>(&mut self, bytes: &'b [u8]) -> Result<&'b str> {
        from_utf8(bytes).map_err(|e| self.fail(e.to_string()))
    }

    /// Records a sticky failure at the current parser position.
    fn fail(&mut self, message: String) -> Error {
        let position = self.parser.buffer_position() as u64;
        self.fail_at(message, position)
    }

    fn fail_at(&mut self, message: String, position: u64) -> Error {
        debug!("XML parse error at position {}: {}", position, message);
        self.failure = Some((message, Some(position)));
        self.failure_error()
    }

    fn failure_error(&self) -> Error {
        let (message, position) = match &self.failure {
            Some((message, position)) => (message.clone(), *position),
            None => ("reader is in error state".to_owned(), None),
        };
        Error::Parse {
            message,
            position,
            xml: self.source_text(),
        }
    }
}

impl<'i> fmt::Debug for XmlReader<'i> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("XmlReader")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("depth", &self.depth())
            .field("in_memory", &self.source.is_some())
            .finish()
    }
}
