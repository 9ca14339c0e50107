//! Generic encoding of a [`Value`] into XML, the inverse of [`de`](crate::de).
//!
//! The value must be a mapping with exactly one element key, the root
//! element. Inside an element mapping the synthetic keys written by the
//! decoder are recognized again:
//!
//! | Key                           | Written as
//! |-------------------------------|------------------------------------
//! | `^attributes^`                | attributes of the element
//! | `^value^`, `^value2^`, ...    | text
//! | `^cdata^`, `^cdata2^`, ...    | `<![CDATA[...]]>`
//! | `^comment^`, `^comment2^`, ...| `<!-- ... -->`
//! | `x^2^`, `x^3^`, ...           | element `<x>`
//!
//! A sequence is written as repeated elements with the same name, `Null` as
//! an empty element.
//!
//! ```
//! use xml_value::{from_str, se, DecodeOptions, EncodeOptions};
//!
//! let value = from_str(r#"<a x="1"><b>t</b><b>u</b></a>"#, &DecodeOptions::default()).unwrap();
//! let xml = se::to_string(&value, &EncodeOptions::default()).unwrap();
//! assert_eq!(
//!     xml,
//!     r#"<?xml version="1.0" encoding="UTF-8"?><a x="1"><b>t</b><b>u</b></a>"#
//! );
//! ```

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;

use crate::datetime::format_pattern;
use crate::de::ATTRIBUTES_KEY;
use crate::encoding::encode_output;
use crate::errors::{Error, Result};
use crate::options::EncodeOptions;
use crate::value::{Mapping, Value};
use crate::writer::Writer;

/// Encodes a value as an XML document, including the XML declaration.
pub fn to_string(value: &Value, options: &EncodeOptions) -> Result<String> {
    let mut serializer = Serializer::new(options);
    serializer.write_document(value)?;
    serializer.writer.into_string()
}

/// Encodes a value as an XML document in the encoding selected by
/// [`EncodeOptions::encoding`].
pub fn to_bytes(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>> {
    let xml = to_string(value, options)?;
    Ok(encode_output(&xml, options.encoding))
}

/// Encodes a value into a `Write`r, see [`to_bytes`].
pub fn to_writer<W: Write>(mut writer: W, value: &Value, options: &EncodeOptions) -> Result<()> {
    writer.write_all(&to_bytes(value, options)?)?;
    Ok(())
}

/// The role of a key of an element mapping.
#[derive(Debug, PartialEq, Eq)]
enum Key<'k> {
    Attributes,
    Text,
    CData,
    Comment,
    Element(&'k str),
}

impl<'k> Key<'k> {
    fn classify(key: &'k str) -> Result<Self> {
        if key == ATTRIBUTES_KEY {
            return Ok(Key::Attributes);
        }
        if let Some(inner) = key.strip_prefix('^').and_then(|k| k.strip_suffix('^')) {
            let kind = inner.trim_end_matches(|c: char| c.is_ascii_digit());
            return match kind {
                "value" => Ok(Key::Text),
                "cdata" => Ok(Key::CData),
                "comment" => Ok(Key::Comment),
                _ => Err(Error::Serialize(format!("unknown special key '{}'", key))),
            };
        }
        let name = strip_order_suffix(key);
        if name.is_empty() || name.contains('^') {
            return Err(Error::Serialize(format!("'{}' is not an element name", key)));
        }
        Ok(Key::Element(name))
    }
}

/// Removes the `^N^` suffix that tells apart out-of-order duplicates.
fn strip_order_suffix(key: &str) -> &str {
    let trimmed = match key.strip_suffix('^') {
        Some(k) => k,
        None => return key,
    };
    let digits = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    if digits.len() == trimmed.len() {
        return key;
    }
    digits.strip_suffix('^').unwrap_or(key)
}

struct Serializer<'o> {
    writer: Writer,
    options: &'o EncodeOptions,
}

impl<'o> Serializer<'o> {
    fn new(options: &'o EncodeOptions) -> Self {
        Self {
            writer: Writer::from_options(options),
            options,
        }
    }

    fn write_document(&mut self, value: &Value) -> Result<()> {
        let map = match value {
            Value::Mapping(map) => map,
            other => {
                return Err(Error::Serialize(format!(
                    "document must be a mapping, got {}",
                    other.type_name()
                )))
            }
        };
        let mut roots = map
            .iter()
            .filter(|(key, _)| Key::classify(key).map_or(true, |k| k != Key::Comment));
        let root = match (roots.next(), roots.next()) {
            (Some((key, _)), None) => key,
            (None, _) => return Err(Error::Serialize("document has no root element".into())),
            (Some(_), Some(_)) => {
                return Err(Error::Serialize(
                    "document must have exactly one root element".into(),
                ))
            }
        };
        debug!("encoding document with root '{}'", root);

        self.writer
            .write_declaration(&self.options.doc_version, self.options.encoding.name())?;
        for (key, value) in map.iter() {
            match Key::classify(key)? {
                Key::Comment => self.writer.write_comment(&self.scalar_text(value)?)?,
                Key::Element(name) => self.write_element(name, value)?,
                _ => {
                    return Err(Error::Serialize(format!(
                        "'{}' is not allowed outside the root element",
                        key
                    )))
                }
            }
        }
        Ok(())
    }

    fn write_element(&mut self, name: &str, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.writer.write_empty(name, None)?,
            Value::Sequence(items) => {
                for item in items {
                    if let Value::Sequence(_) = item {
                        return Err(Error::Serialize(format!(
                            "nested sequence under '{}'",
                            name
                        )));
                    }
                    self.write_element(name, item)?;
                }
            }
            Value::Mapping(map) => self.write_mapping(name, map)?,
            scalar => {
                let text = self.scalar_text(scalar)?;
                self.writer.write_start(name, None)?;
                self.writer.write_text(&text)?;
                self.writer.write_end(name)?;
            }
        }
        Ok(())
    }

    fn write_mapping(&mut self, name: &str, map: &Mapping) -> Result<()> {
        let attributes = match map.get(ATTRIBUTES_KEY) {
            Some(Value::Mapping(attrs)) => attrs
                .iter()
                .map(|(key, value)| Ok((key, self.scalar_text(value)?)))
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::Serialize(format!(
                    "attributes of '{}' must be a mapping, got {}",
                    name,
                    other.type_name()
                )))
            }
        };
        let attributes = attributes.iter().map(|(k, v)| (*k, v.as_str()));

        if map.keys().all(|k| k == ATTRIBUTES_KEY) {
            return self.writer.write_empty(name, attributes);
        }

        self.writer.write_start(name, attributes)?;
        for (key, value) in map.iter() {
            match Key::classify(key)? {
                Key::Attributes => {}
                Key::Text => {
                    let text = self.scalar_text(value)?;
                    self.writer.write_text(&text)?;
                }
                Key::CData => {
                    let text = self.scalar_text(value)?;
                    self.writer.write_cdata(&text)?;
                }
                Key::Comment => {
                    let text = self.scalar_text(value)?;
                    self.writer.write_comment(&text)?;
                }
                Key::Element(child) => self.write_element(child, value)?,
            }
        }
        self.writer.write_end(name)
    }

    fn scalar_text(&self, value: &Value) -> Result<String> {
        Ok(match value {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Binary(bytes) => STANDARD.encode(bytes),
            Value::DateTime(date) => format_pattern(date, &self.options.date_format),
            other => {
                return Err(Error::Serialize(format!(
                    "{} cannot be written as text",
                    other.type_name()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Mapping(entries.into_iter().collect())
    }

    fn compact(value: &Value) -> String {
        let xml = to_string(value, &EncodeOptions::default()).unwrap();
        xml.trim_start_matches(r#"<?xml version="1.0" encoding="UTF-8"?>"#)
            .to_owned()
    }

    #[test]
    fn keys() {
        assert_eq!(Key::classify("^attributes^").unwrap(), Key::Attributes);
        assert_eq!(Key::classify("^value^").unwrap(), Key::Text);
        assert_eq!(Key::classify("^value12^").unwrap(), Key::Text);
        assert_eq!(Key::classify("^cdata2^").unwrap(), Key::CData);
        assert_eq!(Key::classify("^comment^").unwrap(), Key::Comment);
        assert_eq!(Key::classify("item^3^").unwrap(), Key::Element("item"));
        assert_eq!(Key::classify("item").unwrap(), Key::Element("item"));
        assert!(Key::classify("^other^").is_err());
        assert!(Key::classify("^2^").is_err());
    }

    #[test]
    fn scalars() {
        let value = map(vec![(
            "r",
            map(vec![
                ("b", Value::from(true)),
                ("i", Value::from(-3)),
                ("f", Value::from(1.5)),
                ("s", Value::from("a<b")),
                ("x", Value::Binary(b"hi".to_vec())),
                ("n", Value::Null),
            ]),
        )]);
        assert_eq!(
            compact(&value),
            "<r><b>true</b><i>-3</i><f>1.5</f><s>a&lt;b</s><x>aGk=</x><n/></r>"
        );
    }

    #[test]
    fn mixed_content() {
        let value = map(vec![(
            "a",
            map(vec![
                (ATTRIBUTES_KEY, map(vec![("id", Value::from(7))])),
                ("^value^", Value::from("x")),
                ("b", Value::Null),
                ("^cdata^", Value::from("]]>")),
                ("b^2^", Value::from("y")),
            ]),
        )]);
        assert_eq!(
            compact(&value),
            r#"<a id="7">x<b/><![CDATA[]]]]><![CDATA[>]]><b>y</b></a>"#
        );
    }

    #[test]
    fn attributes_only() {
        let value = map(vec![(
            "a",
            map(vec![(ATTRIBUTES_KEY, map(vec![("k", Value::from("v"))]))]),
        )]);
        assert_eq!(compact(&value), r#"<a k="v"/>"#);
    }

    #[test]
    fn document_comments() {
        let value = map(vec![
            ("^comment^", Value::from(" head ")),
            ("a", Value::Null),
        ]);
        assert_eq!(compact(&value), "<!-- head --><a/>");
    }

    #[test]
    fn not_a_document() {
        assert!(matches!(
            to_string(&Value::from(1), &EncodeOptions::default()),
            Err(Error::Serialize(_))
        ));
        let two_roots = map(vec![("a", Value::Null), ("b", Value::Null)]);
        assert!(matches!(
            to_string(&two_roots, &EncodeOptions::default()),
            Err(Error::Serialize(_))
        ));
        let nested = map(vec![(
            "a",
            Value::Sequence(vec![Value::Sequence(vec![Value::Null])]),
        )]);
        assert!(matches!(
            to_string(&nested, &EncodeOptions::default()),
            Err(Error::Serialize(_))
        ));
    }

    #[test]
    fn comment_that_would_break_markup() {
        for text in ["a -- b", "trailing-"] {
            let value = map(vec![(
                "a",
                map(vec![("^comment^", Value::from(text)), ("b", Value::Null)]),
            )]);
            assert!(matches!(
                to_string(&value, &EncodeOptions::default()),
                Err(Error::Serialize(_))
            ));
        }
        let value = map(vec![("^comment^", Value::from("--")), ("a", Value::Null)]);
        assert!(matches!(
            to_string(&value, &EncodeOptions::default()),
            Err(Error::Serialize(_))
        ));
    }

    #[test]
    fn formatted_mixed_content_stays_on_one_line() {
        let value = map(vec![(
            "r",
            map(vec![
                ("a", map(vec![("^value^", Value::from("x")), ("b", Value::Null)])),
                ("c", map(vec![("d", Value::Null)])),
            ]),
        )]);
        let options = EncodeOptions::default().format_with_whitespace(true);
        assert_eq!(
            to_string(&value, &options).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <r>\n  \
               <a>x<b/></a>\n  \
               <c>\n    \
                 <d/>\n  \
               </c>\n\
             </r>"
        );
    }
}
