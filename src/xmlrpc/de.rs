//! Recursive descent over an [`XmlReader`] following the XML-RPC grammar.
//!
//! Every function expects the cursor on the start tag of its construct and
//! leaves it on the matching end tag (or on the start tag itself when the
//! element is empty).

use base64::alphabet::STANDARD;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use log::trace;

use crate::datetime::{epoch, parse_iso8601};
use crate::errors::{Error, Result};
use crate::reader::{NodeKind, XmlReader};
use crate::value::{Mapping, Value};

/// Accepts base64 with and without padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Describes the current node for error messages.
fn describe(reader: &XmlReader) -> String {
    match reader.kind() {
        NodeKind::Element => format!("element '{}'", reader.name()),
        NodeKind::EndElement => format!("end of element '{}'", reader.name()),
        NodeKind::None => "end of document".to_owned(),
        kind => kind.as_str().to_owned(),
    }
}

/// Moves to the next node that is part of the grammar, skipping whitespace,
/// comments and processing instructions.
pub(crate) fn next_node(reader: &mut XmlReader) -> Result<Option<NodeKind>> {
    loop {
        match reader.advance()? {
            Some(NodeKind::SignificantWhitespace)
            | Some(NodeKind::Comment)
            | Some(NodeKind::ProcessingInstruction)
            | Some(NodeKind::XmlDeclaration)
            | Some(NodeKind::DocumentType) => continue,
            other => return Ok(other),
        }
    }
}

/// Moves to the next node, which must be the start tag `name`.
pub(crate) fn expect_start(reader: &mut XmlReader, name: &str) -> Result<()> {
    match next_node(reader)? {
        Some(NodeKind::Element) if reader.name() == name => Ok(()),
        _ => Err(Error::grammar(format!(
            "expecting element '{}', got {}",
            name,
            describe(reader)
        ))),
    }
}

/// Moves to the next node, which must close the element `name`.
pub(crate) fn expect_end(reader: &mut XmlReader, name: &str) -> Result<()> {
    match next_node(reader)? {
        Some(NodeKind::EndElement) if reader.name() == name => Ok(()),
        _ => Err(Error::grammar(format!(
            "expecting end of element '{}', got {}",
            name,
            describe(reader)
        ))),
    }
}

/// Fails unless the cursor is on the start tag `name`.
pub(crate) fn check_start(reader: &XmlReader, name: &str) -> Result<()> {
    if reader.kind() == NodeKind::Element && reader.name() == name {
        Ok(())
    } else {
        Err(Error::grammar(format!(
            "expecting element '{}', got {}",
            name,
            describe(reader)
        )))
    }
}

/// Collects the character data of a scalar element up to its end tag.
///
/// Comments are allowed in between, elements are not.
fn read_text(reader: &mut XmlReader, type_name: &str) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.advance()? {
            Some(NodeKind::Text)
            | Some(NodeKind::CData)
            | Some(NodeKind::SignificantWhitespace) => {
                text.push_str(reader.value().unwrap_or_default())
            }
            Some(NodeKind::Comment) | Some(NodeKind::ProcessingInstruction) => {}
            Some(NodeKind::EndElement) => return Ok(text),
            _ => {
                return Err(Error::grammar(format!(
                    "extra information in '{}': {}",
                    type_name,
                    describe(reader)
                )))
            }
        }
    }
}

/// Decodes a `<value>` element under the cursor.
///
/// A value without a type element is a string; an empty value is `Null`.
pub fn decode_value(reader: &mut XmlReader) -> Result<Value> {
    check_start(reader, "value")?;
    if reader.is_empty_element() {
        return Ok(Value::Null);
    }
    let mut text: Option<String> = None;
    loop {
        match reader.advance()? {
            Some(NodeKind::Text)
            | Some(NodeKind::CData)
            | Some(NodeKind::SignificantWhitespace) => text
                .get_or_insert_with(String::new)
                .push_str(reader.value().unwrap_or_default()),
            Some(NodeKind::Comment) | Some(NodeKind::ProcessingInstruction) => {}
            Some(NodeKind::EndElement) => return Ok(text.map_or(Value::Null, Value::String)),
            Some(NodeKind::Element) => {
                if text.map_or(false, |t| !t.trim().is_empty()) {
                    return Err(Error::grammar(format!(
                        "text before type element '{}' in value",
                        reader.name()
                    )));
                }
                let value = decode_typed(reader)?;
                expect_end(reader, "value")?;
                return Ok(value);
            }
            _ => {
                return Err(Error::grammar(format!(
                    "expecting type element in value, got {}",
                    describe(reader)
                )))
            }
        }
    }
}

/// Decodes the type element under the cursor, e.g. `<int>`.
fn decode_typed(reader: &mut XmlReader) -> Result<Value> {
    let name = reader.name().to_owned();
    let empty = reader.is_empty_element();
    trace!("XML-RPC type '{}' at depth {}", name, reader.depth());

    let scalar = |reader: &mut XmlReader| -> Result<String> {
        if empty {
            Ok(String::new())
        } else {
            read_text(reader, &name)
        }
    };

    match name.as_str() {
        "string" => Ok(Value::String(scalar(reader)?)),
        "i4" | "int" | "ex:i1" | "ex:i2" | "ex:i8" => {
            let text = scalar(reader)?;
            let text = text.trim();
            if text.is_empty() {
                return Ok(Value::Integer(0));
            }
            text.parse()
                .map(Value::Integer)
                .map_err(|_| Error::invalid_value(&name, text))
        }
        "boolean" => {
            let text = scalar(reader)?;
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(leading_integer_is_nonzero(text)))
        }
        "double" | "ex:float" => {
            let text = scalar(reader)?;
            let text = text.trim();
            if text.is_empty() {
                return Ok(Value::Float(0.0));
            }
            text.parse()
                .map(Value::Float)
                .map_err(|_| Error::invalid_value(&name, text))
        }
        "dateTime.iso8601" | "ex:dateTime" => {
            let text = scalar(reader)?;
            let text = text.trim();
            if text.is_empty() {
                return Ok(Value::DateTime(epoch()));
            }
            parse_iso8601(text)
                .map(Value::DateTime)
                .ok_or_else(|| Error::invalid_value(&name, text))
        }
        "base64" => {
            let mut text = scalar(reader)?;
            text.retain(|c| !c.is_ascii_whitespace());
            BASE64
                .decode(&text)
                .map(Value::Binary)
                .map_err(|_| Error::invalid_value(&name, &text))
        }
        "ex:nil" | "nil" => {
            if !empty {
                read_text(reader, &name)?;
            }
            Ok(Value::Null)
        }
        "struct" if empty => Ok(Value::Mapping(Mapping::new())),
        "struct" => decode_struct(reader).map(Value::Mapping),
        "array" if empty => Ok(Value::Sequence(Vec::new())),
        "array" => decode_array(reader).map(Value::Sequence),
        _ => Err(Error::UnknownXmlRpcType {
            name: name.clone(),
            depth: reader.depth(),
        }),
    }
}

/// Decodes the members of a non-empty `<struct>`. Duplicate member names
/// keep the last value.
pub fn decode_struct(reader: &mut XmlReader) -> Result<Mapping> {
    let mut map = Mapping::new();
    loop {
        match next_node(reader)? {
            Some(NodeKind::EndElement) => return Ok(map),
            Some(NodeKind::Element) if reader.name() == "member" => {
                if reader.is_empty_element() {
                    return Err(Error::grammar("expecting element 'name' in empty member"));
                }
                let (name, value) = decode_member(reader)?;
                map.insert(name, value);
            }
            _ => {
                return Err(Error::grammar(format!(
                    "expecting element 'member', got {}",
                    describe(reader)
                )))
            }
        }
    }
}

fn decode_member(reader: &mut XmlReader) -> Result<(String, Value)> {
    expect_start(reader, "name")?;
    let name = if reader.is_empty_element() {
        String::new()
    } else {
        read_text(reader, "name")?
    };
    if name.is_empty() {
        return Err(Error::grammar("empty member name in struct"));
    }

    match next_node(reader)? {
        Some(NodeKind::Element) if reader.name() == "value" => {}
        _ => {
            return Err(Error::grammar(format!(
                "expecting element 'value' for member '{}', got {}",
                name,
                describe(reader)
            )))
        }
    }
    let value = decode_value(reader)?;
    expect_end(reader, "member")?;
    Ok((name, value))
}

/// Decodes the items of a non-empty `<array>`.
pub fn decode_array(reader: &mut XmlReader) -> Result<Vec<Value>> {
    expect_start(reader, "data")?;
    let mut items = Vec::new();
    if !reader.is_empty_element() {
        loop {
            match next_node(reader)? {
                Some(NodeKind::EndElement) => break,
                Some(NodeKind::Element) if reader.name() == "value" => {
                    items.push(decode_value(reader)?)
                }
                _ => {
                    return Err(Error::grammar(format!(
                        "expecting element 'value' in array data, got {}",
                        describe(reader)
                    )))
                }
            }
        }
    }
    expect_end(reader, "array")?;
    Ok(items)
}

/// Decodes the `<param>` children of the `<params>` element under the
/// cursor.
pub fn decode_params(reader: &mut XmlReader) -> Result<Vec<Value>> {
    check_start(reader, "params")?;
    let mut params = Vec::new();
    if reader.is_empty_element() {
        return Ok(params);
    }
    loop {
        match next_node(reader)? {
            Some(NodeKind::EndElement) => return Ok(params),
            Some(NodeKind::Element) if reader.name() == "param" => {
                if reader.is_empty_element() {
                    params.push(Value::Null);
                    continue;
                }
                match next_node(reader)? {
                    Some(NodeKind::EndElement) => {
                        params.push(Value::Null);
                        continue;
                    }
                    Some(NodeKind::Element) if reader.name() == "value" => {}
                    _ => {
                        return Err(Error::grammar(format!(
                            "expecting element 'value' in param, got {}",
                            describe(reader)
                        )))
                    }
                }
                params.push(decode_value(reader)?);
                expect_end(reader, "param")?;
            }
            _ => {
                return Err(Error::grammar(format!(
                    "expecting element 'param', got {}",
                    describe(reader)
                )))
            }
        }
    }
}

/// Whether the integer at the start of `text` (an optional sign followed by
/// digits) is not zero. Text without leading digits counts as zero, so
/// `1.5` is true and `abc` is false.
fn leading_integer_is_nonzero(text: &str) -> bool {
    let digits = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .any(|b| b != b'0')
}
