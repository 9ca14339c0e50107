//! Conversion between XML documents and a generic [`Value`] tree, with a
//! streaming pull reader and XML-RPC support.
//!
//! ## Generic decoding
//!
//! Any document can be decoded to a [`Value`]: elements become mapping keys,
//! repeated elements become sequences, attributes, text, CDATA and comments
//! get synthetic `^...^` keys (see [`de`]). [`se`] writes such a tree back.
//!
//! ```rust
//! use xml_value::{from_str, DecodeOptions, Value};
//!
//! let xml = r#"<order id="7"><item>tea</item><item>milk</item><note>hot</note></order>"#;
//! let value = from_str(xml, &DecodeOptions::default()).unwrap();
//!
//! assert_eq!(value["order"]["^attributes^"]["id"], Value::from("7"));
//! assert_eq!(value["order"]["item"][1], Value::from("milk"));
//! assert_eq!(value["order"]["note"], Value::from("hot"));
//! ```
//!
//! ## Pull reader
//!
//! [`XmlReader`] walks a document node by node and can decode the element
//! under its cursor, which keeps memory bounded for large documents:
//!
//! ```rust
//! use xml_value::reader::{NodeKind, XmlReader};
//!
//! let mut reader = XmlReader::from_str(r#"<a><b x="1">text</b></a>"#);
//! let mut names = Vec::new();
//! while let Some(kind) = reader.advance().unwrap() {
//!     if kind == NodeKind::Element {
//!         names.push((reader.depth(), reader.name().to_owned()));
//!     }
//! }
//! assert_eq!(names, vec![(0, "a".to_owned()), (1, "b".to_owned())]);
//! ```
//!
//! ## XML-RPC
//!
//! [`xmlrpc`] decodes `<value>` trees with strict grammar checks and builds
//! `<methodCall>` and `<methodResponse>` documents.
//!
//! ## Encodings
//!
//! Input in any encoding known to [`encoding_rs`] is accepted; it is detected
//! from the byte order mark or the XML declaration and normalized to UTF-8
//! before parsing. Output can be produced in any such encoding, see
//! [`EncodeOptions`].
//!
//! ## Optional features
//!
//! - `serde-types`: implements `serde::Serialize` for [`Value`] and
//!   [`Mapping`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod datetime;
pub mod de;
pub mod encoding;
pub mod errors;
pub mod escape;
pub mod name;
mod options;
pub mod reader;
pub mod se;
pub mod value;
mod writer;
pub mod xmlrpc;

// reexports
pub use crate::de::{from_bytes, from_reader, from_str, DecodeOptions};
pub use crate::errors::{Error, Result};
pub use crate::options::EncodeOptions;
pub use crate::reader::XmlReader;
pub use crate::value::{Mapping, Value};

/// Decodes an XML file with the generic decoder.
pub fn from_file<P: AsRef<std::path::Path>>(path: P, options: &DecodeOptions) -> Result<Value> {
    let mut reader = XmlReader::from_file(path, None)?;
    reader.read_value(options)
}
