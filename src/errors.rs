//! Error management module

use std::fmt;
use std::io;

/// The error type used by this crate.
#[derive(Debug)]
pub enum Error {
    /// Malformed XML, reported either by the underlying pull parser or by the
    /// structural checks of the [`XmlReader`](crate::reader::XmlReader).
    Parse {
        /// Parser diagnostic
        message: String,
        /// Byte offset in the (UTF-8 normalized) input, if known
        position: Option<u64>,
        /// The document text, if it was held in memory
        xml: Option<String>,
    },
    /// The generic decoder could not produce a value
    MalformedXml {
        /// Description of the failure
        message: String,
        /// The document text, if it was held in memory
        xml: Option<String>,
    },
    /// Structural mismatch against the XML-RPC grammar
    XmlRpcGrammar(String),
    /// Unknown XML-RPC value type tag
    UnknownXmlRpcType {
        /// Tag name as found in the document
        name: String,
        /// Nesting depth of the tag
        depth: usize,
    },
    /// Text content of an XML-RPC scalar cannot be converted to its type
    InvalidXmlRpcValue {
        /// The type tag, e.g. `int`
        type_name: String,
        /// The offending text
        text: String,
    },
    /// Invalid encoder configuration
    InvalidOptions(String),
    /// A value cannot be represented as XML
    Serialize(String),
    /// The operation is not available for this kind of reader source
    Unsupported(&'static str),
    /// Input bytes cannot be decoded with the detected encoding
    Encoding(String),
    /// IO error
    Io(io::Error),
}

impl Error {
    pub(crate) fn grammar<M: Into<String>>(message: M) -> Self {
        Error::XmlRpcGrammar(message.into())
    }

    pub(crate) fn invalid_value(type_name: &str, text: &str) -> Self {
        Error::InvalidXmlRpcValue {
            type_name: type_name.to_owned(),
            text: text.to_owned(),
        }
    }

    /// Returns the document text attached to this error, if any.
    pub fn xml(&self) -> Option<&str> {
        match self {
            Error::Parse { xml, .. } | Error::MalformedXml { xml, .. } => xml.as_deref(),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    /// Creates a new `Error::Io` from the given error
    #[inline]
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse {
                message, position, ..
            } => match position {
                Some(pos) => write!(f, "XML parse error at position {}: {}", pos, message),
                None => write!(f, "XML parse error: {}", message),
            },
            Error::MalformedXml { message, .. } => write!(f, "malformed XML: {}", message),
            Error::XmlRpcGrammar(e) => write!(f, "XML-RPC parse error: {}", e),
            Error::UnknownXmlRpcType { name, depth } => {
                write!(f, "unknown XML-RPC type '{}' at level {}", name, depth)
            }
            Error::InvalidXmlRpcValue { type_name, text } => {
                write!(f, "invalid XML-RPC {} value '{}'", type_name, text)
            }
            Error::InvalidOptions(e) => write!(f, "invalid XML generation options: {}", e),
            Error::Serialize(e) => write!(f, "cannot serialize value to XML: {}", e),
            Error::Unsupported(e) => write!(f, "unsupported operation: {}", e),
            Error::Encoding(e) => write!(f, "encoding error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_display_with_position() {
        let e = Error::Parse {
            message: "expected `</b>`, but `</a>` was found".into(),
            position: Some(7),
            xml: Some("<a><b></a>".into()),
        };
        assert_eq!(
            e.to_string(),
            "XML parse error at position 7: expected `</b>`, but `</a>` was found"
        );
        assert_eq!(e.xml(), Some("<a><b></a>"));
    }

    #[test]
    fn unknown_type_display() {
        let e = Error::UnknownXmlRpcType {
            name: "long".into(),
            depth: 4,
        };
        assert_eq!(e.to_string(), "unknown XML-RPC type 'long' at level 4");
        assert_eq!(e.xml(), None);
    }
}
