//! Generic decoding of XML into a [`Value`].
//!
//! Every element becomes a key of the mapping that represents its parent.
//! Content that has no natural key gets a synthetic one:
//!
//! | XML                          | Key
//! |------------------------------|------------------------------------
//! | attributes                   | `^attributes^` (a mapping)
//! | text                         | `^value^`, `^value2^`, `^value3^`, ...
//! | `<![CDATA[...]]>`            | `^cdata^`, `^cdata2^`, ...
//! | `<!-- ... -->`               | `^comment^`, `^comment2^`, ... (only with [`DecodeOptions::add_comments`])
//! | out-of-order duplicate `<x>` | `x^2^`, `x^3^`, ... (only with [`DecodeOptions::preserve_order`])
//!
//! An element that holds nothing but text decodes to a plain string, an
//! element without content to [`Value::Null`].
//!
//! ```
//! use xml_value::{from_str, DecodeOptions, Value};
//!
//! let value = from_str("<a>hello<b/>world</a>", &DecodeOptions::default()).unwrap();
//! assert_eq!(value["a"]["^value^"], Value::from("hello"));
//! assert_eq!(value["a"]["b"], Value::Null);
//! assert_eq!(value["a"]["^value2^"], Value::from("world"));
//! ```

use std::io::Read;

use log::debug;

use crate::errors::{Error, Result};
use crate::reader::{NodeKind, XmlReader};
use crate::value::{Mapping, Value};

/// Key under which the attributes of an element are stored
pub const ATTRIBUTES_KEY: &str = "^attributes^";

/// Options of the generic decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Keep duplicate sibling elements that are separated by other elements
    /// under distinct `name^N^` keys instead of collapsing them into one
    /// sequence.
    ///
    /// Default: `false`
    pub preserve_order: bool,
    /// Keep comments under `^comment^` keys.
    ///
    /// Default: `false`
    pub add_comments: bool,
}

impl DecodeOptions {
    /// Sets [`Self::preserve_order`].
    pub fn preserve_order(mut self, value: bool) -> Self {
        self.preserve_order = value;
        self
    }

    /// Sets [`Self::add_comments`].
    pub fn add_comments(mut self, value: bool) -> Self {
        self.add_comments = value;
        self
    }
}

/// Decodes an XML document held in a string.
pub fn from_str(xml: &str, options: &DecodeOptions) -> Result<Value> {
    let mut reader = XmlReader::from_str(xml);
    decode_document(&mut reader, options)
}

/// Decodes an XML document held in bytes, detecting their encoding.
pub fn from_bytes(bytes: &[u8], options: &DecodeOptions) -> Result<Value> {
    let mut reader = XmlReader::from_bytes(bytes)?;
    decode_document(&mut reader, options)
}

/// Decodes an XML document read from a byte stream.
pub fn from_reader<R: Read>(reader: R, options: &DecodeOptions) -> Result<Value> {
    let mut reader = XmlReader::from_reader(reader, None)?;
    decode_document(&mut reader, options)
}

/// Decodes what is under the cursor.
///
/// On an element (or one of its attributes) that element is decoded and the
/// cursor is left on its end tag. Anywhere else the current node and its
/// following siblings are decoded, stopping on the end tag of the parent.
pub(crate) fn decode_current(reader: &mut XmlReader, options: &DecodeOptions) -> Result<Value> {
    reader.move_to_element()?;
    let mut frame = Frame::default();
    if reader.kind() == NodeKind::Element {
        debug!("decoding element '{}' at depth {}", reader.name(), reader.depth());
        let name = reader.name().to_owned();
        let value = decode_element(reader, options)?;
        frame.insert_child(&name, value, options);
        return finish(reader, frame);
    }

    let min_depth = reader.depth();
    debug!("decoding content from depth {}", min_depth);
    frame.add_node(reader, options);
    while let Some(kind) = reader.advance()? {
        match kind {
            NodeKind::EndElement if reader.depth() < min_depth => break,
            NodeKind::Element => {
                let name = reader.name().to_owned();
                let value = decode_element(reader, options)?;
                frame.insert_child(&name, value, options);
            }
            _ => frame.add_node(reader, options),
        }
    }
    finish(reader, frame)
}

/// Decodes all remaining nodes up to the end of the document.
pub(crate) fn decode_document(reader: &mut XmlReader, options: &DecodeOptions) -> Result<Value> {
    debug!("decoding document with {:?}", options);
    let mut root = Frame::default();
    while let Some(kind) = reader.advance()? {
        match kind {
            NodeKind::Element => {
                let name = reader.name().to_owned();
                let value = decode_element(reader, options)?;
                root.insert_child(&name, value, options);
            }
            NodeKind::Comment if options.add_comments => root.add_comment(text_of(reader)),
            _ => {}
        }
    }
    finish(reader, root)
}

fn finish(reader: &XmlReader, root: Frame) -> Result<Value> {
    match root.value {
        Some(value) => {
            debug!("decoded {} top-level keys", value.as_mapping().map_or(1, Mapping::len));
            Ok(value)
        }
        None => Err(Error::MalformedXml {
            message: "no XML data found".to_owned(),
            xml: reader.source_text(),
        }),
    }
}

/// Decodes the element under the cursor and leaves the cursor on its end tag.
fn decode_element(reader: &mut XmlReader, options: &DecodeOptions) -> Result<Value> {
    let mut frame = Frame::default();
    if reader.has_attributes() {
        let attributes: Mapping = reader
            .attributes()
            .iter()
            .map(|a| (a.name(), Value::from(a.value())))
            .collect();
        let mut map = Mapping::new();
        map.insert(ATTRIBUTES_KEY, Value::Mapping(attributes));
        frame.value = Some(Value::Mapping(map));
    }
    if reader.is_empty_element() {
        return Ok(frame.into_value());
    }

    let depth = reader.depth();
    loop {
        let kind = match reader.advance()? {
            Some(kind) => kind,
            None => {
                return Err(Error::MalformedXml {
                    message: format!("unexpected end of document inside element at depth {}", depth),
                    xml: reader.source_text(),
                })
            }
        };
        match kind {
            NodeKind::EndElement if reader.depth() == depth => break,
            NodeKind::Element => {
                let name = reader.name().to_owned();
                let value = decode_element(reader, options)?;
                frame.insert_child(&name, value, options);
            }
            _ => frame.add_node(reader, options),
        }
    }
    Ok(frame.into_value())
}

#[inline]
fn text_of(reader: &XmlReader) -> String {
    reader.value().unwrap_or_default().to_owned()
}

/// Key of the `count`-th (zero based) text, CDATA or comment segment of an
/// element.
fn segment_key(kind: &str, count: usize) -> String {
    match count {
        0 => format!("^{}^", kind),
        n => format!("^{}{}^", kind, n + 1),
    }
}

/// Decoding state of one open element.
#[derive(Default)]
struct Frame {
    value: Option<Value>,
    texts: usize,
    cdatas: usize,
    comments: usize,
    /// Literal name and key of the last child element stored in the mapping,
    /// cleared when any other key is added after it
    last_child: Option<(String, String)>,
}

impl Frame {
    fn into_value(self) -> Value {
        self.value.unwrap_or(Value::Null)
    }

    /// Returns the mapping of this element, creating it if needed. Text seen
    /// before is moved under `^value^`.
    fn mapping(&mut self) -> &mut Mapping {
        match self.value.take() {
            Some(Value::Mapping(map)) => self.value = Some(Value::Mapping(map)),
            None => self.value = Some(Value::Mapping(Mapping::new())),
            Some(other) => {
                let mut map = Mapping::new();
                map.insert(segment_key("value", 0), other);
                self.texts += 1;
                self.last_child = None;
                self.value = Some(Value::Mapping(map));
            }
        }
        match self.value.as_mut() {
            Some(Value::Mapping(map)) => map,
            _ => unreachable!("frame value was just made a mapping"),
        }
    }

    fn insert_child(&mut self, name: &str, child: Value, options: &DecodeOptions) {
        if matches!(self.value, Some(Value::String(_))) {
            debug!("text before element '{}' kept under '^value^'", name);
        }
        let last_child = self.last_child.take();
        let map = self.mapping();
        let key = if !map.contains_key(name) {
            map.insert(name, child);
            name.to_owned()
        } else if !options.preserve_order {
            if let Some(existing) = map.get_mut(name) {
                existing.make_sequence().push(child);
            }
            name.to_owned()
        } else {
            match last_child {
                Some((literal, key)) if literal == name => {
                    if let Some(existing) = map.get_mut(&key) {
                        existing.make_sequence().push(child);
                    }
                    key
                }
                _ => {
                    let mut n = 2;
                    let key = loop {
                        let key = format!("{}^{}^", name, n);
                        if !map.contains_key(&key) {
                            break key;
                        }
                        n += 1;
                    };
                    map.insert(key.clone(), child);
                    key
                }
            }
        };
        self.last_child = Some((name.to_owned(), key));
    }

    /// Adds the text, CDATA or comment under the cursor; other nodes are
    /// skipped.
    fn add_node(&mut self, reader: &XmlReader, options: &DecodeOptions) {
        match reader.kind() {
            NodeKind::Text => self.add_text(text_of(reader)),
            NodeKind::CData => self.add_cdata(text_of(reader)),
            NodeKind::Comment if options.add_comments => self.add_comment(text_of(reader)),
            _ => {}
        }
    }

    fn add_text(&mut self, text: String) {
        match self.value {
            None => self.value = Some(Value::String(text)),
            Some(_) => {
                let key = segment_key("value", self.texts_after_wrap());
                self.mapping().insert(key, Value::String(text));
                self.texts += 1;
                self.last_child = None;
            }
        }
    }

    fn add_cdata(&mut self, text: String) {
        let key = segment_key("cdata", self.cdatas);
        self.mapping().insert(key, Value::String(text));
        self.cdatas += 1;
        self.last_child = None;
    }

    fn add_comment(&mut self, text: String) {
        let key = segment_key("comment", self.comments);
        self.mapping().insert(key, Value::String(text));
        self.comments += 1;
        self.last_child = None;
    }

    /// Text segment counter once a bare string value has been moved under
    /// `^value^`.
    fn texts_after_wrap(&mut self) -> usize {
        self.mapping();
        self.texts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Mapping(entries.into_iter().collect())
    }

    fn decode(xml: &str, options: DecodeOptions) -> Value {
        from_str(xml, &options).unwrap()
    }

    #[test]
    fn text_only_element_is_string() {
        assert_eq!(
            decode("<a><b>1</b></a>", DecodeOptions::default()),
            map(vec![("a", map(vec![("b", "1".into())]))])
        );
    }

    #[test]
    fn empty_element_is_null() {
        assert_eq!(
            decode("<a><b/><c></c><d>  </d></a>", DecodeOptions::default()),
            map(vec![(
                "a",
                map(vec![("b", Value::Null), ("c", Value::Null), ("d", Value::Null)])
            )])
        );
    }

    #[test]
    fn string_then_two_texts() {
        assert_eq!(
            decode("<a>one<!--x-->two</a>", DecodeOptions::default()),
            map(vec![(
                "a",
                map(vec![("^value^", "one".into()), ("^value2^", "two".into())])
            )])
        );
    }

    #[test]
    fn attributes_then_text() {
        assert_eq!(
            decode(r#"<a id="5">x</a>"#, DecodeOptions::default()),
            map(vec![(
                "a",
                map(vec![
                    (ATTRIBUTES_KEY, map(vec![("id", "5".into())])),
                    ("^value^", "x".into()),
                ])
            )])
        );
    }

    #[test]
    fn cdata_counted_separately() {
        assert_eq!(
            decode("<a>t<![CDATA[c1]]><![CDATA[c2]]></a>", DecodeOptions::default()),
            map(vec![(
                "a",
                map(vec![
                    ("^value^", "t".into()),
                    ("^cdata^", "c1".into()),
                    ("^cdata2^", "c2".into()),
                ])
            )])
        );
        assert_eq!(
            decode("<a><![CDATA[only]]></a>", DecodeOptions::default()),
            map(vec![("a", map(vec![("^cdata^", "only".into())]))])
        );
    }

    #[test]
    fn comments_when_enabled() {
        let xml = "<!--head--><a><!--one--><b/><!--two--></a>";
        assert_eq!(
            decode(xml, DecodeOptions::default()),
            map(vec![("a", map(vec![("b", Value::Null)]))])
        );
        assert_eq!(
            decode(xml, DecodeOptions::default().add_comments(true)),
            map(vec![
                ("^comment^", "head".into()),
                (
                    "a",
                    map(vec![
                        ("^comment^", "one".into()),
                        ("b", Value::Null),
                        ("^comment2^", "two".into()),
                    ])
                ),
            ])
        );
    }

    #[test]
    fn consecutive_duplicates_in_order_mode() {
        assert_eq!(
            decode(
                "<a><x>1</x><x>2</x><y/><x>3</x><x>4</x></a>",
                DecodeOptions::default().preserve_order(true)
            ),
            map(vec![(
                "a",
                map(vec![
                    ("x", Value::Sequence(vec!["1".into(), "2".into()])),
                    ("y", Value::Null),
                    ("x^2^", Value::Sequence(vec!["3".into(), "4".into()])),
                ])
            )])
        );
    }

    #[test]
    fn text_between_duplicates_breaks_run() {
        assert_eq!(
            decode(
                "<a><x>1</x>t<x>2</x></a>",
                DecodeOptions::default().preserve_order(true)
            ),
            map(vec![(
                "a",
                map(vec![
                    ("x", "1".into()),
                    ("^value^", "t".into()),
                    ("x^2^", "2".into()),
                ])
            )])
        );
    }

    #[test]
    fn decode_current_stops_at_end_tag() {
        let mut reader = XmlReader::from_str("<r><a>1</a><b>2</b></r>");
        reader.advance().unwrap();
        reader.advance().unwrap();
        let value = reader.read_value(&DecodeOptions::default()).unwrap();
        assert_eq!(value, map(vec![("a", "1".into())]));
        assert_eq!(reader.kind(), NodeKind::EndElement);
        assert_eq!(reader.name(), "a");
        reader.advance().unwrap();
        assert_eq!(reader.name(), "b");
    }

    #[test]
    fn nothing_decoded() {
        let mut reader = XmlReader::from_str("<a/>");
        reader.advance().unwrap();
        reader.advance().unwrap();
        match decode_current(&mut reader, &DecodeOptions::default()) {
            Err(Error::MalformedXml { xml, .. }) => assert_eq!(xml.as_deref(), Some("<a/>")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn run_of_empty_duplicates_in_order_mode() {
        assert_eq!(
            decode(
                "<a><x/><y/><x/><x/></a>",
                DecodeOptions::default().preserve_order(true)
            ),
            map(vec![(
                "a",
                map(vec![
                    ("x", Value::Null),
                    ("y", Value::Null),
                    ("x^2^", Value::Sequence(vec![Value::Null, Value::Null])),
                ])
            )])
        );
    }

    #[test]
    fn decode_current_from_text_stops_at_parent_end() {
        let mut reader = XmlReader::from_str("<r><a>t<b/></a><c>sibling</c></r>");
        for _ in 0..3 {
            reader.advance().unwrap();
        }
        assert_eq!(reader.kind(), NodeKind::Text);
        let value = decode_current(&mut reader, &DecodeOptions::default()).unwrap();
        assert_eq!(
            value,
            map(vec![("^value^", "t".into()), ("b", Value::Null)])
        );
        assert_eq!(reader.kind(), NodeKind::EndElement);
        assert_eq!(reader.name(), "a");
    }

    #[test]
    fn decode_current_from_attribute() {
        let mut reader = XmlReader::from_str(r#"<r><a id="1"><x/></a><c/></r>"#);
        reader.advance().unwrap();
        reader.advance().unwrap();
        assert!(reader.move_to_first_attribute().unwrap());
        let value = decode_current(&mut reader, &DecodeOptions::default()).unwrap();
        assert_eq!(
            value,
            map(vec![(
                "a",
                map(vec![
                    (ATTRIBUTES_KEY, map(vec![("id", "1".into())])),
                    ("x", Value::Null),
                ])
            )])
        );
        assert_eq!(reader.kind(), NodeKind::EndElement);
        assert_eq!(reader.name(), "a");
    }
}
