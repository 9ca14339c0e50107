//! Options of the XML and XML-RPC encoders.

use encoding_rs::{Encoding, UTF_8};

use crate::encoding::encoding_for_label;
use crate::errors::{Error, Result};
use crate::value::{Mapping, Value};

/// Controls how documents are generated. Fields can be set directly or
/// with the builder methods of the same name.
///
/// ```
/// # use xml_value::EncodeOptions;
/// let options = EncodeOptions::default()
///     .format_with_whitespace(true)
///     .date_format("YYYY-MM-DD");
/// assert_eq!(options.doc_version, "1.0");
/// assert!(options.format_with_whitespace);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeOptions {
    /// Value of `version` in the XML declaration
    pub doc_version: String,
    /// Output encoding, also named in the XML declaration
    pub encoding: &'static Encoding,
    /// Put nested tags on their own, indented lines
    pub format_with_whitespace: bool,
    /// Write non-ASCII characters as `&#N;` references
    pub use_numeric_refs: bool,
    /// Pattern for `Date` values in generic documents, see
    /// [`format_pattern`](crate::datetime::format_pattern)
    pub date_format: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            doc_version: "1.0".to_owned(),
            encoding: UTF_8,
            format_with_whitespace: false,
            use_numeric_refs: false,
            date_format: "YYYYMMDDHHmmSS".to_owned(),
        }
    }
}

impl EncodeOptions {
    /// Builds options from a mapping with the keys `docVersion` (string),
    /// `encoding` (string), `formatWithWhitespaces` (boolean),
    /// `useNumericRefs` (boolean) and `dateFormat` (string).
    ///
    /// Other keys are ignored. A known key with a value of the wrong type or
    /// an unknown encoding is an [`Error::InvalidOptions`].
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        let mut options = Self::default();
        if let Some(v) = string_option(mapping, "docVersion")? {
            options.doc_version = v.to_owned();
        }
        if let Some(label) = string_option(mapping, "encoding")? {
            options.encoding = encoding_for_label(label).ok_or_else(|| {
                Error::InvalidOptions(format!("unknown encoding '{}'", label))
            })?;
        }
        if let Some(v) = bool_option(mapping, "formatWithWhitespaces")? {
            options.format_with_whitespace = v;
        }
        if let Some(v) = bool_option(mapping, "useNumericRefs")? {
            options.use_numeric_refs = v;
        }
        if let Some(v) = string_option(mapping, "dateFormat")? {
            options.date_format = v.to_owned();
        }
        Ok(options)
    }

    /// Sets the `version` of the XML declaration. Default: `"1.0"`.
    pub fn doc_version<S: Into<String>>(mut self, version: S) -> Self {
        self.doc_version = version.into();
        self
    }

    /// Sets the output encoding. Default: UTF-8.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Indents nested elements by two spaces per level. Default: `false`.
    pub fn format_with_whitespace(mut self, value: bool) -> Self {
        self.format_with_whitespace = value;
        self
    }

    /// Writes non-ASCII characters as character references. Default: `false`.
    pub fn use_numeric_refs(mut self, value: bool) -> Self {
        self.use_numeric_refs = value;
        self
    }

    /// Pattern used by the generic encoder to write dates, see
    /// [`format_pattern`](crate::datetime::format_pattern).
    /// Default: `"YYYYMMDDHHmmSS"`.
    pub fn date_format<S: Into<String>>(mut self, pattern: S) -> Self {
        self.date_format = pattern.into();
        self
    }
}

fn string_option<'m>(mapping: &'m Mapping, key: &str) -> Result<Option<&'m str>> {
    match mapping.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(wrong_type(key, "string", other)),
    }
}

fn bool_option(mapping: &Mapping, key: &str) -> Result<Option<bool>> {
    match mapping.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(wrong_type(key, "boolean", other)),
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> Error {
    Error::InvalidOptions(format!(
        "option '{}' must be a {}, got {}",
        key,
        expected,
        found.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_mapping() {
        let map: Mapping = vec![
            ("docVersion", Value::from("1.1")),
            ("encoding", Value::from("ISO-8859-1")),
            ("formatWithWhitespaces", Value::from(true)),
            ("somethingElse", Value::from(5)),
        ]
        .into_iter()
        .collect();
        let options = EncodeOptions::from_mapping(&map).unwrap();
        assert_eq!(options.doc_version, "1.1");
        assert_eq!(options.encoding, WINDOWS_1252);
        assert!(options.format_with_whitespace);
        assert!(!options.use_numeric_refs);
        assert_eq!(options.date_format, "YYYYMMDDHHmmSS");
    }

    #[test]
    fn wrong_types() {
        let map: Mapping = vec![("useNumericRefs", Value::from("yes"))]
            .into_iter()
            .collect();
        match EncodeOptions::from_mapping(&map) {
            Err(Error::InvalidOptions(msg)) => {
                assert_eq!(msg, "option 'useNumericRefs' must be a boolean, got string")
            }
            other => panic!("unexpected {:?}", other),
        }

        let map: Mapping = vec![("encoding", Value::from("klingon"))]
            .into_iter()
            .collect();
        assert!(matches!(
            EncodeOptions::from_mapping(&map),
            Err(Error::InvalidOptions(_))
        ));
    }
}
