//! XML-RPC messages: strict decoding of `<value>` trees into [`Value`]s and
//! generation of calls and responses.
//!
//! Besides the standard types, the `ex:` extensions `ex:i1`, `ex:i2`,
//! `ex:i8`, `ex:float`, `ex:dateTime` and `ex:nil` are understood.
//!
//! ```
//! use xml_value::xmlrpc::{make_call, parse_call};
//! use xml_value::{EncodeOptions, Value};
//!
//! let xml = make_call("echo", &[Value::from("hi")], &EncodeOptions::default())?;
//! let call = parse_call(&xml)?;
//! assert_eq!(call.method_name, "echo");
//! assert_eq!(call.params, vec![Value::from("hi")]);
//! # Ok::<(), xml_value::Error>(())
//! ```

pub mod de;
mod se;

use log::debug;

pub use self::de::{decode_array, decode_params, decode_struct, decode_value};
pub use self::se::{make_call, make_fault, make_response, make_value};

use self::de::{expect_end, expect_start, next_node};
use crate::errors::{Error, Result};
use crate::reader::{NodeKind, XmlReader};
use crate::value::Value;

/// A decoded `<methodCall>`.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    /// Content of `<methodName>`, trimmed
    pub method_name: String,
    /// Values of the `<param>` elements
    pub params: Vec<Value>,
}

/// The fault reported by a `<methodResponse>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Fault {
    /// `faultCode` member
    pub code: i64,
    /// `faultString` member, empty if absent
    pub string: String,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "fault {}: {}", self.code, self.string)
    }
}

/// A decoded `<methodResponse>`.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// The single `<param>` value
    Success(Value),
    /// A `<fault>` response
    Fault(Fault),
}

/// Checks that nothing but whitespace, comments and processing instructions
/// follow the root element.
fn expect_eof(reader: &mut XmlReader) -> Result<()> {
    match next_node(reader)? {
        None => Ok(()),
        Some(_) => Err(Error::grammar(format!(
            "unexpected {} after the root element",
            reader.kind_name()
        ))),
    }
}

/// Decodes a document whose root is a `<value>` element.
pub fn parse_value(xml: &str) -> Result<Value> {
    read_value(&mut XmlReader::from_str(xml))
}

/// Like [`parse_value`], for a reader positioned before the root element.
pub fn read_value(reader: &mut XmlReader) -> Result<Value> {
    expect_start(reader, "value")?;
    let value = decode_value(reader)?;
    expect_eof(reader)?;
    Ok(value)
}

/// Decodes a document whose root is a `<params>` element.
pub fn parse_params(xml: &str) -> Result<Vec<Value>> {
    read_params(&mut XmlReader::from_str(xml))
}

/// Like [`parse_params`], for a reader positioned before the root element.
pub fn read_params(reader: &mut XmlReader) -> Result<Vec<Value>> {
    expect_start(reader, "params")?;
    let params = decode_params(reader)?;
    expect_eof(reader)?;
    Ok(params)
}

/// Decodes a `<methodCall>` document.
pub fn parse_call(xml: &str) -> Result<MethodCall> {
    read_call(&mut XmlReader::from_str(xml))
}

/// Like [`parse_call`], for a reader positioned before the root element.
pub fn read_call(reader: &mut XmlReader) -> Result<MethodCall> {
    expect_start(reader, "methodCall")?;
    if reader.is_empty_element() {
        return Err(Error::grammar("expecting element 'methodName' in empty methodCall"));
    }
    expect_start(reader, "methodName")?;
    let mut method_name = String::new();
    if !reader.is_empty_element() {
        loop {
            match reader.advance()? {
                Some(NodeKind::Text) | Some(NodeKind::CData) => {
                    method_name.push_str(reader.value().unwrap_or_default())
                }
                Some(NodeKind::SignificantWhitespace) | Some(NodeKind::Comment) => {}
                Some(NodeKind::EndElement) => break,
                _ => return Err(Error::grammar("extra information in 'methodName'")),
            }
        }
    }
    let method_name = method_name.trim().to_owned();
    if method_name.is_empty() {
        return Err(Error::grammar("empty method name in methodCall"));
    }
    debug!("decoding XML-RPC call '{}'", method_name);

    let in_method = |e: Error| match e {
        Error::XmlRpcGrammar(msg) => {
            Error::XmlRpcGrammar(format!("{} (method '{}')", msg, method_name))
        }
        other => other,
    };

    let params = match next_node(reader)? {
        Some(NodeKind::EndElement) => Vec::new(),
        Some(NodeKind::Element) => {
            let params = decode_params(reader).map_err(in_method)?;
            expect_end(reader, "methodCall").map_err(in_method)?;
            params
        }
        _ => {
            return Err(in_method(Error::grammar(format!(
                "expecting element 'params', got {}",
                reader.kind_name()
            ))))
        }
    };
    expect_eof(reader)?;
    Ok(MethodCall {
        method_name,
        params,
    })
}

/// Decodes a `<methodResponse>` document.
///
/// ```
/// use xml_value::xmlrpc::{make_fault, parse_response, Fault, Response};
/// use xml_value::EncodeOptions;
///
/// let xml = make_fault(3, "no such method", &EncodeOptions::default())?;
/// assert_eq!(
///     parse_response(&xml)?,
///     Response::Fault(Fault { code: 3, string: "no such method".into() })
/// );
/// # Ok::<(), xml_value::Error>(())
/// ```
pub fn parse_response(xml: &str) -> Result<Response> {
    read_response(&mut XmlReader::from_str(xml))
}

/// Like [`parse_response`], for a reader positioned before the root element.
pub fn read_response(reader: &mut XmlReader) -> Result<Response> {
    expect_start(reader, "methodResponse")?;
    if reader.is_empty_element() {
        return Err(Error::grammar("expecting element 'params' or 'fault' in empty methodResponse"));
    }
    let response = match next_node(reader)? {
        Some(NodeKind::Element) if reader.name() == "params" => {
            let mut params = decode_params(reader)?;
            if params.len() != 1 {
                return Err(Error::grammar(format!(
                    "expecting exactly one param in methodResponse, got {}",
                    params.len()
                )));
            }
            Response::Success(params.remove(0))
        }
        Some(NodeKind::Element) if reader.name() == "fault" => {
            expect_start(reader, "value")?;
            let fault = decode_fault(decode_value(reader)?)?;
            expect_end(reader, "fault")?;
            debug!("XML-RPC {}", fault);
            Response::Fault(fault)
        }
        _ => {
            return Err(Error::grammar(format!(
                "expecting element 'params' or 'fault', got {}",
                reader.kind_name()
            )))
        }
    };
    expect_end(reader, "methodResponse")?;
    expect_eof(reader)?;
    Ok(response)
}

fn decode_fault(value: Value) -> Result<Fault> {
    let map = match value {
        Value::Mapping(map) => map,
        other => {
            return Err(Error::grammar(format!(
                "fault must be a struct, got {}",
                other.type_name()
            )))
        }
    };
    let code = match map.get("faultCode") {
        Some(Value::Integer(code)) => *code,
        _ => return Err(Error::grammar("fault has no integer 'faultCode' member")),
    };
    let string = match map.get("faultString") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        _ => return Err(Error::grammar("fault member 'faultString' is not a string")),
    };
    Ok(Fault { code, string })
}
