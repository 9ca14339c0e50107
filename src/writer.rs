//! The markup writer shared by the encoders and by
//! [`XmlReader::outer_xml`](crate::reader::XmlReader::outer_xml).
//!
//! It wraps a [`quick_xml::Writer`] and adds what the encoders need on top:
//! numeric character references, checked comments and mixed content that
//! stays on one line when indenting.

use std::borrow::Cow;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

use crate::errors::{Error, Result};
use crate::escape::{escape_with, to_numeric_refs};
use crate::options::EncodeOptions;

/// Width of one indentation level
const INDENT_SIZE: usize = 2;

/// Writes XML events into an in-memory buffer.
///
/// When indenting, every tag is placed on its own line, except inside an
/// element that contains text: there a line break would change the content.
pub(crate) struct Writer {
    inner: quick_xml::Writer<Vec<u8>>,
    numeric_refs: bool,
    /// For each open element, whether it contains text
    mixed: Vec<bool>,
}

impl Writer {
    pub fn new(indent: bool, numeric_refs: bool) -> Self {
        let inner = if indent {
            quick_xml::Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE)
        } else {
            quick_xml::Writer::new(Vec::new())
        };
        Self {
            inner,
            numeric_refs,
            mixed: Vec::new(),
        }
    }

    pub fn from_options(options: &EncodeOptions) -> Self {
        Self::new(options.format_with_whitespace, options.use_numeric_refs)
    }

    pub fn into_string(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner())
            .map_err(|e| Error::Serialize(format!("generated markup is not UTF-8: {}", e)))
    }

    /// Writes `<?xml version="..." encoding="..."?>`
    pub fn write_declaration(&mut self, version: &str, encoding: &str) -> Result<()> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new(version, Some(encoding), None)))?;
        Ok(())
    }

    /// Writes `<name attr="value" ...>`
    pub fn write_start<'a, I>(&mut self, name: &str, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let start = self.start_tag(name, attributes);
        self.keep_on_line()?;
        self.inner.write_event(Event::Start(start))?;
        self.mixed.push(false);
        Ok(())
    }

    /// Writes `<name attr="value" .../>`
    pub fn write_empty<'a, I>(&mut self, name: &str, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let start = self.start_tag(name, attributes);
        self.keep_on_line()?;
        self.inner.write_event(Event::Empty(start))?;
        Ok(())
    }

    /// Writes `</name>`
    pub fn write_end(&mut self, name: &str) -> Result<()> {
        self.keep_on_line()?;
        self.mixed.pop();
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Writes escaped character data
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        if let Some(mixed) = self.mixed.last_mut() {
            *mixed = true;
        }
        let escaped = escape_with(text, self.numeric_refs);
        self.inner
            .write_event(Event::Text(BytesText::from_escaped(escaped)))?;
        Ok(())
    }

    /// Writes one or more CDATA sections; `]]>` is split between two of them.
    pub fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.keep_on_line()?;
        for section in BytesCData::escaped(text) {
            self.inner.write_event(Event::CData(section))?;
        }
        Ok(())
    }

    /// Writes `<!--text-->`. Text that would end the comment early or make it
    /// malformed is an [`Error::Serialize`].
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        if text.contains("--") || text.ends_with('-') {
            return Err(Error::Serialize(format!(
                "comment '{}' contains '--' or ends with '-'",
                text
            )));
        }
        self.keep_on_line()?;
        let text = if self.numeric_refs {
            to_numeric_refs(text)
        } else {
            Cow::Borrowed(text)
        };
        self.inner
            .write_event(Event::Comment(BytesText::from_escaped(text)))?;
        Ok(())
    }

    /// Writes `<?target data?>`
    pub fn write_pi(&mut self, target: &str, data: &str) -> Result<()> {
        self.keep_on_line()?;
        let content = if data.is_empty() {
            Cow::Borrowed(target)
        } else {
            Cow::Owned(format!("{} {}", target, data))
        };
        self.inner.write_event(Event::PI(BytesPI::new(content)))?;
        Ok(())
    }

    fn start_tag<'a, I>(&self, name: &str, attributes: I) -> BytesStart<'static>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut start = BytesStart::new(name.to_owned());
        for (key, value) in attributes {
            let value = escape_with(value, self.numeric_refs);
            start.push_attribute(Attribute::from((key.as_bytes(), value.as_bytes())));
        }
        start
    }

    /// Inside an element with text, an empty text event stops the inner
    /// writer from breaking the line before the next tag.
    fn keep_on_line(&mut self) -> Result<()> {
        if self.mixed.last() == Some(&true) {
            self.inner
                .write_event(Event::Text(BytesText::from_escaped("")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compact() {
        let mut w = Writer::new(false, false);
        w.write_declaration("1.0", "UTF-8").unwrap();
        w.write_start("a", vec![("x", "1 & 2")]).unwrap();
        w.write_empty("b", None).unwrap();
        w.write_text("<text>").unwrap();
        w.write_end("a").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            r#"<?xml version="1.0" encoding="UTF-8"?><a x="1 &amp; 2"><b/>&lt;text&gt;</a>"#
        );
    }

    #[test]
    fn indented() {
        let mut w = Writer::new(true, false);
        w.write_declaration("1.0", "UTF-8").unwrap();
        w.write_start("a", None).unwrap();
        w.write_start("b", None).unwrap();
        w.write_text("text").unwrap();
        w.write_end("b").unwrap();
        w.write_start("c", None).unwrap();
        w.write_empty("d", None).unwrap();
        w.write_end("c").unwrap();
        w.write_comment(" done ").unwrap();
        w.write_end("a").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <a>\n  \
               <b>text</b>\n  \
               <c>\n    \
                 <d/>\n  \
               </c>\n  \
               <!-- done -->\n\
             </a>"
        );
    }

    #[test]
    fn mixed_content_is_not_indented() {
        let mut w = Writer::new(true, false);
        w.write_start("a", None).unwrap();
        w.write_text("x").unwrap();
        w.write_empty("b", None).unwrap();
        w.write_start("c", None).unwrap();
        w.write_empty("d", None).unwrap();
        w.write_end("c").unwrap();
        w.write_end("a").unwrap();
        assert_eq!(w.into_string().unwrap(), "<a>x<b/><c>\n    <d/>\n  </c></a>");
    }

    #[test]
    fn numeric_refs() {
        let mut w = Writer::new(false, true);
        w.write_start("a", vec![("t", "é")]).unwrap();
        w.write_text("ü").unwrap();
        w.write_comment("ß").unwrap();
        w.write_end("a").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            r#"<a t="&#233;">&#252;<!--&#223;--></a>"#
        );
    }

    #[test]
    fn cdata_terminator_is_split() {
        let mut w = Writer::new(false, false);
        w.write_start("a", None).unwrap();
        w.write_cdata("x]]>y").unwrap();
        w.write_end("a").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            "<a><![CDATA[x]]]]><![CDATA[>y]]></a>"
        );
    }

    #[test]
    fn unsafe_comments() {
        for text in ["a -- b", "ends with -", "--"] {
            let mut w = Writer::new(false, false);
            match w.write_comment(text) {
                Err(Error::Serialize(msg)) => assert!(msg.contains(text), "{}", msg),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn processing_instruction() {
        let mut w = Writer::new(false, false);
        w.write_pi("target", "some data").unwrap();
        w.write_pi("bare", "").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            "<?target some data?><?bare?>"
        );
    }
}
