//! Generation of XML-RPC messages.
//!
//! | Value      | Tag
//! |------------|-------------------------------------------------------
//! | `Null`     | `<ex:nil/>`
//! | `Boolean`  | `<boolean>` with `1` or `0`
//! | `Integer`  | `<i4>` when it fits into 32 bits, `<ex:i8>` otherwise
//! | `Float`    | `<double>`
//! | `String`   | `<string>`
//! | `Binary`   | `<base64>`
//! | `DateTime` | `<dateTime.iso8601>`, in UTC
//! | `Mapping`  | `<struct>`
//! | `Sequence` | `<array><data>`

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::datetime::format_xmlrpc;
use crate::errors::Result;
use crate::options::EncodeOptions;
use crate::value::Value;
use crate::writer::Writer;

/// Builds a `<methodCall>` document.
///
/// ```
/// # use xml_value::{EncodeOptions, Value};
/// # use xml_value::xmlrpc::make_call;
/// let xml = make_call("sum", &[Value::from(1), Value::from(2)], &EncodeOptions::default())?;
/// assert_eq!(
///     xml,
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
///      <methodCall><methodName>sum</methodName><params>\
///      <param><value><i4>1</i4></value></param>\
///      <param><value><i4>2</i4></value></param>\
///      </params></methodCall>"
/// );
/// # Ok::<(), xml_value::Error>(())
/// ```
pub fn make_call(method: &str, params: &[Value], options: &EncodeOptions) -> Result<String> {
    let mut writer = document(options)?;
    writer.write_start("methodCall", None)?;
    write_scalar(&mut writer, "methodName", method)?;
    writer.write_start("params", None)?;
    for param in params {
        write_param(&mut writer, param)?;
    }
    writer.write_end("params")?;
    writer.write_end("methodCall")?;
    writer.into_string()
}

/// Builds a successful `<methodResponse>` document carrying one value.
pub fn make_response(value: &Value, options: &EncodeOptions) -> Result<String> {
    let mut writer = document(options)?;
    writer.write_start("methodResponse", None)?;
    writer.write_start("params", None)?;
    write_param(&mut writer, value)?;
    writer.write_end("params")?;
    writer.write_end("methodResponse")?;
    writer.into_string()
}

/// Builds a `<methodResponse>` document reporting a fault.
pub fn make_fault(code: i64, message: &str, options: &EncodeOptions) -> Result<String> {
    let fault: Value = Value::Mapping(
        vec![("faultCode", Value::Integer(code)), ("faultString", Value::from(message))]
            .into_iter()
            .collect(),
    );
    let mut writer = document(options)?;
    writer.write_start("methodResponse", None)?;
    writer.write_start("fault", None)?;
    write_value(&mut writer, &fault)?;
    writer.write_end("fault")?;
    writer.write_end("methodResponse")?;
    writer.into_string()
}

/// Encodes a single `<value>` element, without XML declaration.
pub fn make_value(value: &Value, options: &EncodeOptions) -> Result<String> {
    let mut writer = Writer::from_options(options);
    write_value(&mut writer, value)?;
    writer.into_string()
}

fn document(options: &EncodeOptions) -> Result<Writer> {
    let mut writer = Writer::from_options(options);
    writer.write_declaration(&options.doc_version, options.encoding.name())?;
    Ok(writer)
}

fn write_param(writer: &mut Writer, value: &Value) -> Result<()> {
    writer.write_start("param", None)?;
    write_value(writer, value)?;
    writer.write_end("param")
}

fn write_scalar(writer: &mut Writer, tag: &str, text: &str) -> Result<()> {
    writer.write_start(tag, None)?;
    writer.write_text(text)?;
    writer.write_end(tag)
}

fn write_value(writer: &mut Writer, value: &Value) -> Result<()> {
    writer.write_start("value", None)?;
    match value {
        Value::Null => writer.write_empty("ex:nil", None)?,
        Value::Boolean(b) => write_scalar(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Integer(i) => {
            let tag = if i32::try_from(*i).is_ok() { "i4" } else { "ex:i8" };
            write_scalar(writer, tag, &i.to_string())?;
        }
        Value::Float(f) => write_scalar(writer, "double", &f.to_string())?,
        Value::String(s) => write_scalar(writer, "string", s)?,
        Value::Binary(bytes) => write_scalar(writer, "base64", &STANDARD.encode(bytes))?,
        Value::DateTime(date) => {
            write_scalar(writer, "dateTime.iso8601", &format_xmlrpc(date)?)?
        }
        Value::Mapping(map) => {
            writer.write_start("struct", None)?;
            for (key, value) in map.iter() {
                writer.write_start("member", None)?;
                write_scalar(writer, "name", key)?;
                write_value(writer, value)?;
                writer.write_end("member")?;
            }
            writer.write_end("struct")?;
        }
        Value::Sequence(items) => {
            writer.write_start("array", None)?;
            writer.write_start("data", None)?;
            for item in items {
                write_value(writer, item)?;
            }
            writer.write_end("data")?;
            writer.write_end("array")?;
        }
    }
    writer.write_end("value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn value(v: Value) -> String {
        make_value(&v, &EncodeOptions::default()).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(value(Value::Null), "<value><ex:nil/></value>");
        assert_eq!(value(Value::from(true)), "<value><boolean>1</boolean></value>");
        assert_eq!(value(Value::from(42)), "<value><i4>42</i4></value>");
        assert_eq!(
            value(Value::Integer(1 << 40)),
            "<value><ex:i8>1099511627776</ex:i8></value>"
        );
        assert_eq!(value(Value::from(0.25)), "<value><double>0.25</double></value>");
        assert_eq!(value(Value::from("a&b")), "<value><string>a&amp;b</string></value>");
        assert_eq!(
            value(Value::Binary(b"hello".to_vec())),
            "<value><base64>aGVsbG8=</base64></value>"
        );
        let date = DateTime::parse_from_rfc3339("1998-07-17T16:08:55+02:00").unwrap();
        assert_eq!(
            value(Value::DateTime(date)),
            "<value><dateTime.iso8601>19980717T14:08:55</dateTime.iso8601></value>"
        );
    }

    #[test]
    fn containers() {
        let v = Value::Mapping(
            vec![
                ("a", Value::from(1)),
                ("b", Value::Sequence(vec![Value::from("x")])),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(
            value(v),
            "<value><struct>\
             <member><name>a</name><value><i4>1</i4></value></member>\
             <member><name>b</name><value><array><data>\
             <value><string>x</string></value>\
             </data></array></value></member>\
             </struct></value>"
        );
        assert_eq!(
            value(Value::Sequence(vec![])),
            "<value><array><data></data></array></value>"
        );
    }

    #[test]
    fn fault() {
        assert_eq!(
            make_fault(4, "Too many parameters", &EncodeOptions::default()).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <methodResponse><fault><value><struct>\
             <member><name>faultCode</name><value><i4>4</i4></value></member>\
             <member><name>faultString</name><value><string>Too many parameters</string></value></member>\
             </struct></value></fault></methodResponse>"
        );
    }

    #[test]
    fn formatted() {
        let options = EncodeOptions::default().format_with_whitespace(true);
        assert_eq!(
            make_response(&Value::from("ok"), &options).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <methodResponse>\n  \
               <params>\n    \
                 <param>\n      \
                   <value>\n        \
                     <string>ok</string>\n      \
                   </value>\n    \
                 </param>\n  \
               </params>\n\
             </methodResponse>"
        );
    }
}
