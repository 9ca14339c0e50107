//! Iteration over the repeated elements of a large document.

use log::debug;

use crate::de::DecodeOptions;
use crate::errors::Result;
use crate::reader::{NodeKind, XmlReader};
use crate::value::Value;

/// Decodes, one at a time, every element with a given local name.
///
/// Once the first matching element is found, only elements at the same depth
/// are considered. Each item is the decoded content of one element; the
/// iterator stops after the first error.
///
/// ```
/// use xml_value::{DecodeOptions, Value};
/// use xml_value::reader::XmlReader;
///
/// let mut reader = XmlReader::from_str("<list><item>1</item><skip/><item>2</item></list>");
/// let items: Vec<Value> = reader
///     .elements("item", DecodeOptions::default())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(items, vec![Value::from("1"), Value::from("2")]);
/// ```
pub struct ElementIter<'r, 'i> {
    reader: &'r mut XmlReader<'i>,
    local_name: String,
    options: DecodeOptions,
    depth: Option<usize>,
    done: bool,
}

impl<'r, 'i> ElementIter<'r, 'i> {
    pub(crate) fn new(reader: &'r mut XmlReader<'i>, local_name: &str, options: DecodeOptions) -> Self {
        Self {
            reader,
            local_name: local_name.to_owned(),
            options,
            depth: None,
            done: false,
        }
    }

    /// Moves to the next matching element. Returns `false` at the end of the
    /// document.
    fn seek(&mut self) -> Result<bool> {
        while let Some(kind) = self.reader.advance_skipping_whitespace()? {
            if kind != NodeKind::Element || self.reader.local_name() != self.local_name {
                continue;
            }
            match self.depth {
                Some(depth) if depth != self.reader.depth() => continue,
                Some(_) => {}
                None => {
                    debug!(
                        "iterating elements '{}' at depth {}",
                        self.local_name,
                        self.reader.depth()
                    );
                    self.depth = Some(self.reader.depth());
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn decode(&mut self) -> Result<Value> {
        let name = self.reader.name().to_owned();
        let mut value = self.reader.read_value(&self.options)?;
        Ok(value
            .as_mapping_mut()
            .and_then(|m| m.remove(&name))
            .unwrap_or(Value::Null))
    }
}

impl<'r, 'i> Iterator for ElementIter<'r, 'i> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.seek() {
            Ok(true) => self.decode(),
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
