//! Normalization of input documents to UTF-8 and encoding of generated output.
//!
//! The pull parser only ever sees UTF-8. Byte input is decoded up front (or,
//! for streams, on the fly by [`Utf8Transcoder`]) using the encoding named by
//! the caller, the byte order mark, or the XML declaration, in that order.

use std::borrow::Cow;
use std::io::{self, Read};

use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::errors::{Error, Result};

/// Unicode "byte order mark" encoded as UTF-8
pub(crate) const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
/// Unicode "byte order mark" encoded as UTF-16 with little-endian byte order
pub(crate) const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
/// Unicode "byte order mark" encoded as UTF-16 with big-endian byte order
pub(crate) const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// How many leading bytes are inspected when looking for the XML declaration.
const DECL_SCAN_LIMIT: usize = 1024;

/// Automatic encoding detection of XML files based using the
/// [recommended algorithm](https://www.w3.org/TR/xml11/#sec-guessing).
///
/// If encoding is detected, `Some` is returned, otherwise `None` is returned.
///
/// | Bytes       |Detected encoding
/// |-------------|------------------------------------------
/// |`FE FF ## ##`|UTF-16, big-endian
/// |`FF FE ## ##`|UTF-16, little-endian
/// |`EF BB BF`   |UTF-8
/// |`00 3C 00 3F`|UTF-16 BE or similar 16-bit BE
/// |`3C 00 3F 00`|UTF-16 LE or similar 16-bit LE
/// |`3C 3F 78 6D`|UTF-8 or any ASCII compatible encoding; the declaration must be read
pub fn detect_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    match bytes {
        // with BOM
        _ if bytes.starts_with(UTF16_BE_BOM) => Some(UTF_16BE),
        _ if bytes.starts_with(UTF16_LE_BOM) => Some(UTF_16LE),
        _ if bytes.starts_with(UTF8_BOM) => Some(UTF_8),

        // without BOM
        _ if bytes.starts_with(&[0x00, b'<', 0x00, b'?']) => Some(UTF_16BE),
        _ if bytes.starts_with(&[b'<', 0x00, b'?', 0x00]) => Some(UTF_16LE),
        _ if bytes.starts_with(&[b'<', b'?', b'x', b'm']) => Some(UTF_8),

        _ => None,
    }
}

/// Reads the `encoding` pseudo-attribute of the XML declaration at the start
/// of an ASCII compatible document.
///
/// Returns `None` if there is no declaration, it has no `encoding` or the
/// label is unknown to `encoding_rs`.
pub fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let head = &bytes[..bytes.len().min(DECL_SCAN_LIMIT)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = &head[5..end];

    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = decl[at + 8..].trim_ascii_start().strip_prefix(b"=")?;
    let rest = rest.trim_ascii_start();
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let rest = &rest[1..];
    let len = rest.iter().position(|&b| b == quote)?;
    Encoding::for_label(&rest[..len])
}

/// Looks up an encoding by its WHATWG label, e.g. `"ISO-8859-1"` or `"utf8"`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Chooses the encoding of a document.
///
/// An explicit label wins; otherwise the byte order mark, then the XML
/// declaration of an ASCII compatible document, then UTF-8.
pub(crate) fn choose_encoding(bytes: &[u8], label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(label) = label {
        return encoding_for_label(label)
            .ok_or_else(|| Error::Encoding(format!("unknown encoding label '{}'", label)));
    }
    Ok(match detect_encoding(bytes) {
        Some(e) if e == UTF_16LE || e == UTF_16BE => e,
        // the bytes at hand are ASCII compatible, whatever the declaration claims
        _ => declared_encoding(bytes)
            .filter(|e| e.is_ascii_compatible())
            .unwrap_or(UTF_8),
    })
}

/// Decodes a whole document to UTF-8, removing the byte order mark.
///
/// Returns an error in case of malformed or non-representable sequences in the `bytes`.
pub(crate) fn decode_document<'b>(
    bytes: &'b [u8],
    encoding: &'static Encoding,
) -> Result<Cow<'b, str>> {
    let (encoding, bom_len) = match Encoding::for_bom(bytes) {
        Some((bom, len)) => (bom, len),
        None => (encoding, 0),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .ok_or_else(|| {
            Error::Encoding(format!("input is not valid {}", encoding.name()))
        })
}

/// Encodes generated text in the output encoding.
///
/// Characters that the encoding cannot represent are written as decimal
/// character references. UTF-16 output carries a byte order mark.
pub fn encode_output(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        let mut out = Vec::with_capacity(text.len() * 2 + 2);
        let le = encoding == UTF_16LE;
        out.extend_from_slice(if le { UTF16_LE_BOM } else { UTF16_BE_BOM });
        for unit in text.encode_utf16() {
            out.extend_from_slice(&if le {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            });
        }
        return out;
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [`Read`] adapter that decodes a byte stream in any supported encoding and
/// yields UTF-8.
///
/// The encoding is chosen from the first bytes of the stream the same way
/// [`choose_encoding`] does it for in-memory documents.
pub struct Utf8Transcoder<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    /// Start of not yet decoded bytes in `input`
    consumed: usize,
    output: Vec<u8>,
    /// Start of not yet returned bytes in `output`
    delivered: usize,
    produced: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> Utf8Transcoder<R> {
    /// Wraps `inner`, sniffing its first bytes to select the encoding unless
    /// `label` names one.
    pub fn new(mut inner: R, label: Option<&str>) -> Result<Self> {
        let mut input = vec![0; DECL_SCAN_LIMIT];
        let mut filled = 0;
        let mut eof = false;
        while filled < input.len() {
            match inner.read(&mut input[filled..]) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        input.truncate(filled);

        let encoding = choose_encoding(&input, label)?;
        log::debug!("transcoding input stream from {}", encoding.name());
        Ok(Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            input,
            consumed: 0,
            output: vec![0; 8 * 1024],
            delivered: 0,
            produced: 0,
            eof,
            finished: false,
        })
    }

    /// The encoding the stream is decoded from.
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    fn refill_input(&mut self) -> io::Result<()> {
        self.input.drain(..self.consumed);
        self.consumed = 0;
        let start = self.input.len();
        self.input.resize(start + 4096, 0);
        let n = loop {
            match self.inner.read(&mut self.input[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.input.truncate(start);
                    return Err(e);
                }
            }
        };
        self.input.truncate(start + n);
        self.eof = n == 0;
        Ok(())
    }

    /// Decodes the next chunk into `output`. Returns `false` once the stream
    /// is exhausted.
    fn fill_output(&mut self) -> io::Result<bool> {
        self.delivered = 0;
        self.produced = 0;
        loop {
            if self.finished {
                return Ok(false);
            }
            if self.consumed == self.input.len() && !self.eof {
                self.refill_input()?;
            }
            let (result, read, written) = self.decoder.decode_to_utf8_without_replacement(
                &self.input[self.consumed..],
                &mut self.output,
                self.eof,
            );
            self.consumed += read;
            self.produced = written;
            match result {
                DecoderResult::InputEmpty => {
                    if self.eof {
                        self.finished = true;
                    }
                }
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(_, _) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("input is not valid {}", self.decoder.encoding().name()),
                    ));
                }
            }
            if written > 0 {
                return Ok(true);
            }
        }
    }
}

impl<R: Read> Read for Utf8Transcoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.delivered == self.produced && !self.fill_output()? {
            return Ok(0);
        }
        let available = &self.output[self.delivered..self.produced];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.delivered += n;
        Ok(n)
    }
}
