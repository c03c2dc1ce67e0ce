//! Tag-length-value encoding primitives
//!
//! Every field on the wire is a TLV unit: an identifier octet carrying
//! the tag class, a constructed/primitive bit and the tag number
//! (base-128 continuation octets for numbers >= 31), followed by a
//! definite length (short form below 128, long form above) and the
//! payload. Composite values nest TLV units inside a constructed tag.
//!
//! Decoding is strict: lengths must be definite, a value must consume
//! exactly its declared length, and readers report leftover bytes.

use std::fmt;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Maximum accepted value length (guards length-bomb inputs).
const MAX_VALUE_LENGTH: usize = 1 << 20;

/// Errors produced by the TLV layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlvError {
    /// Input ended before a complete unit could be read
    #[error("truncated TLV: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to continue
        needed: usize,
        /// Bytes remaining in the input
        available: usize,
    },

    /// Indefinite lengths are not part of this protocol
    #[error("indefinite length is not supported")]
    IndefiniteLength,

    /// Declared length exceeds the protocol bound or usize
    #[error("length {0} exceeds maximum allowed")]
    LengthOverflow(u64),

    /// The tag found does not match the tag the caller expected
    #[error("tag mismatch: expected {expected}, got {got}")]
    TagMismatch {
        /// Tag the caller required
        expected: Tag,
        /// Tag actually present
        got: Tag,
    },

    /// A value carried bytes beyond the fields decoded from it
    #[error("value has {0} trailing bytes after its declared content")]
    TrailingBytes(usize),

    /// An integer field was wider than 8 bytes
    #[error("integer field of {0} bytes is too wide")]
    IntegerTooWide(usize),

    /// An integer field was empty
    #[error("empty integer field")]
    EmptyInteger,

    /// A string field was not valid UTF-8
    #[error("string field is not valid UTF-8")]
    BadUtf8,
}

/// Tag class bits of the identifier octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10) - what this protocol uses
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

/// A decoded TLV tag: class, constructed bit, and number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag class
    pub class: TagClass,
    /// True for constructed (nested TLVs), false for primitive
    pub constructed: bool,
    /// Tag number
    pub number: u32,
}

impl Tag {
    /// Context-specific primitive tag.
    pub const fn context(number: u32) -> Self {
        Self {
            class: TagClass::ContextSpecific,
            constructed: false,
            number,
        }
    }

    /// Context-specific constructed tag.
    pub const fn context_constructed(number: u32) -> Self {
        Self {
            class: TagClass::ContextSpecific,
            constructed: true,
            number,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self.class {
            TagClass::Universal => "univ",
            TagClass::Application => "appl",
            TagClass::ContextSpecific => "ctx",
            TagClass::Private => "priv",
        };
        let p = if self.constructed { "c" } else { "p" };
        write!(f, "[{c}/{p} {}]", self.number)
    }
}

fn write_tag(buf: &mut BytesMut, tag: Tag) {
    let lead = ((tag.class as u8) << 6) | (u8::from(tag.constructed) << 5);
    if tag.number < 31 {
        buf.put_u8(lead | tag.number as u8);
    } else {
        buf.put_u8(lead | 0x1F);
        // Base-128, high bit marks continuation.
        let mut shift = (31 - tag.number.leading_zeros()) / 7 * 7;
        loop {
            let septet = ((tag.number >> shift) & 0x7F) as u8;
            if shift == 0 {
                buf.put_u8(septet);
                break;
            }
            buf.put_u8(septet | 0x80);
            shift -= 7;
        }
    }
}

fn write_len(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else {
        let bytes = (len as u64).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        buf.put_u8(0x80 | (8 - skip) as u8);
        buf.put_slice(&bytes[skip..]);
    }
}

fn read_tag(input: &mut &[u8]) -> Result<Tag, TlvError> {
    let Some((&lead, rest)) = input.split_first() else {
        return Err(TlvError::Truncated {
            needed: 1,
            available: 0,
        });
    };
    *input = rest;

    let class = match lead >> 6 {
        0 => TagClass::Universal,
        1 => TagClass::Application,
        2 => TagClass::ContextSpecific,
        _ => TagClass::Private,
    };
    let constructed = lead & 0x20 != 0;
    let low = lead & 0x1F;

    let number = if low < 0x1F {
        u32::from(low)
    } else {
        let mut number: u32 = 0;
        loop {
            let Some((&b, rest)) = input.split_first() else {
                return Err(TlvError::Truncated {
                    needed: 1,
                    available: 0,
                });
            };
            *input = rest;
            number = (number << 7) | u32::from(b & 0x7F);
            if b & 0x80 == 0 {
                break;
            }
        }
        number
    };

    Ok(Tag {
        class,
        constructed,
        number,
    })
}

fn read_len(input: &mut &[u8]) -> Result<usize, TlvError> {
    let Some((&lead, rest)) = input.split_first() else {
        return Err(TlvError::Truncated {
            needed: 1,
            available: 0,
        });
    };
    *input = rest;

    if lead < 0x80 {
        return Ok(usize::from(lead));
    }
    let count = usize::from(lead & 0x7F);
    if count == 0 {
        return Err(TlvError::IndefiniteLength);
    }
    if count > 8 || input.len() < count {
        return Err(TlvError::Truncated {
            needed: count,
            available: input.len(),
        });
    }
    let mut len: u64 = 0;
    for &b in &input[..count] {
        len = (len << 8) | u64::from(b);
    }
    *input = &input[count..];
    if len as usize > MAX_VALUE_LENGTH {
        return Err(TlvError::LengthOverflow(len));
    }
    Ok(len as usize)
}

/// Minimal big-endian bytes of an unsigned integer (at least one byte).
fn u64_bytes(v: u64) -> ([u8; 8], usize) {
    let bytes = v.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    (bytes, skip)
}

/// Minimal two's-complement big-endian bytes of a signed integer.
fn i64_bytes(v: i64) -> ([u8; 8], usize) {
    let bytes = v.to_be_bytes();
    let mut skip = 0;
    // Drop redundant sign prefix octets.
    while skip < 7 {
        let cur = bytes[skip];
        let sign_bit = bytes[skip + 1] & 0x80;
        if (cur == 0x00 && sign_bit == 0) || (cur == 0xFF && sign_bit != 0) {
            skip += 1;
        } else {
            break;
        }
    }
    (bytes, skip)
}

/// Serializes TLV fields into a buffer.
///
/// Fields are written in call order; composites are built through
/// [`TlvWriter::constructed`] which back-patches the declared length
/// after the closure has produced the content.
pub struct TlvWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> TlvWriter<'a> {
    /// Wraps a buffer for TLV writing.
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    fn put_raw(&mut self, tag: Tag, value: &[u8]) {
        write_tag(self.buf, tag);
        write_len(self.buf, value.len());
        self.buf.put_slice(value);
    }

    /// Writes an unsigned integer field under a context tag.
    pub fn put_u64(&mut self, tag_no: u32, v: u64) {
        let (bytes, skip) = u64_bytes(v);
        self.put_raw(Tag::context(tag_no), &bytes[skip..]);
    }

    /// Writes a signed integer field under a context tag.
    pub fn put_i64(&mut self, tag_no: u32, v: i64) {
        let (bytes, skip) = i64_bytes(v);
        self.put_raw(Tag::context(tag_no), &bytes[skip..]);
    }

    /// Writes an opaque byte-string field under a context tag.
    pub fn put_bytes(&mut self, tag_no: u32, v: &[u8]) {
        self.put_raw(Tag::context(tag_no), v);
    }

    /// Writes a UTF-8 string field under a context tag.
    pub fn put_str(&mut self, tag_no: u32, v: &str) {
        self.put_raw(Tag::context(tag_no), v.as_bytes());
    }

    /// Writes a constructed field whose content is produced by `f`.
    pub fn constructed(&mut self, tag_no: u32, f: impl FnOnce(&mut TlvWriter<'_>)) {
        let mut inner = BytesMut::new();
        f(&mut TlvWriter::new(&mut inner));
        self.put_raw(Tag::context_constructed(tag_no), &inner);
    }
}

/// Parses TLV fields from a value slice, in order.
///
/// A reader owns exactly the declared content of one value; callers
/// must drain it and call [`TlvReader::finish`], which enforces the
/// consumed-equals-declared rule.
#[derive(Debug, Clone, Copy)]
pub struct TlvReader<'a> {
    rest: &'a [u8],
}

impl<'a> TlvReader<'a> {
    /// Wraps a value slice for reading.
    pub fn new(input: &'a [u8]) -> Self {
        Self { rest: input }
    }

    /// True when all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Reads the next tag without consuming it. Returns `None` when
    /// the reader is drained.
    pub fn peek_tag(&self) -> Option<Result<Tag, TlvError>> {
        if self.rest.is_empty() {
            return None;
        }
        let mut probe = self.rest;
        Some(read_tag(&mut probe))
    }

    /// Reads the next TLV unit, returning its tag and value slice.
    pub fn next_unit(&mut self) -> Result<(Tag, &'a [u8]), TlvError> {
        let tag = read_tag(&mut self.rest)?;
        let len = read_len(&mut self.rest)?;
        if self.rest.len() < len {
            return Err(TlvError::Truncated {
                needed: len,
                available: self.rest.len(),
            });
        }
        let (value, rest) = self.rest.split_at(len);
        self.rest = rest;
        Ok((tag, value))
    }

    fn expect(&mut self, expected: Tag) -> Result<&'a [u8], TlvError> {
        let (tag, value) = self.next_unit()?;
        if tag != expected {
            return Err(TlvError::TagMismatch { expected, got: tag });
        }
        Ok(value)
    }

    /// Reads an unsigned integer field under the given context tag.
    pub fn u64(&mut self, tag_no: u32) -> Result<u64, TlvError> {
        let value = self.expect(Tag::context(tag_no))?;
        decode_u64(value)
    }

    /// Reads a signed integer field under the given context tag.
    pub fn i64(&mut self, tag_no: u32) -> Result<i64, TlvError> {
        let value = self.expect(Tag::context(tag_no))?;
        decode_i64(value)
    }

    /// Reads an optional unsigned integer field: consumed only when
    /// the next tag matches.
    pub fn opt_u64(&mut self, tag_no: u32) -> Result<Option<u64>, TlvError> {
        match self.peek_tag() {
            Some(Ok(tag)) if tag == Tag::context(tag_no) => self.u64(tag_no).map(Some),
            Some(Err(e)) => Err(e),
            _ => Ok(None),
        }
    }

    /// Reads an optional signed integer field.
    pub fn opt_i64(&mut self, tag_no: u32) -> Result<Option<i64>, TlvError> {
        match self.peek_tag() {
            Some(Ok(tag)) if tag == Tag::context(tag_no) => self.i64(tag_no).map(Some),
            Some(Err(e)) => Err(e),
            _ => Ok(None),
        }
    }

    /// Reads an opaque byte-string field.
    pub fn bytes(&mut self, tag_no: u32) -> Result<&'a [u8], TlvError> {
        self.expect(Tag::context(tag_no))
    }

    /// Reads a UTF-8 string field.
    pub fn str(&mut self, tag_no: u32) -> Result<String, TlvError> {
        let value = self.expect(Tag::context(tag_no))?;
        std::str::from_utf8(value)
            .map(str::to_owned)
            .map_err(|_| TlvError::BadUtf8)
    }

    /// Descends into a constructed field, returning a reader over its
    /// content.
    pub fn constructed(&mut self, tag_no: u32) -> Result<TlvReader<'a>, TlvError> {
        let value = self.expect(Tag::context_constructed(tag_no))?;
        Ok(TlvReader::new(value))
    }

    /// Enforces that the declared content was consumed exactly.
    pub fn finish(self) -> Result<(), TlvError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(TlvError::TrailingBytes(self.rest.len()))
        }
    }
}

fn decode_u64(value: &[u8]) -> Result<u64, TlvError> {
    if value.is_empty() {
        return Err(TlvError::EmptyInteger);
    }
    if value.len() > 8 {
        return Err(TlvError::IntegerTooWide(value.len()));
    }
    let mut v: u64 = 0;
    for &b in value {
        v = (v << 8) | u64::from(b);
    }
    Ok(v)
}

fn decode_i64(value: &[u8]) -> Result<i64, TlvError> {
    if value.is_empty() {
        return Err(TlvError::EmptyInteger);
    }
    if value.len() > 8 {
        return Err(TlvError::IntegerTooWide(value.len()));
    }
    let mut v: i64 = if value[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in value {
        v = (v << 8) | i64::from(b);
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(write: impl FnOnce(&mut TlvWriter<'_>)) -> BytesMut {
        let mut buf = BytesMut::new();
        write(&mut TlvWriter::new(&mut buf));
        buf
    }

    #[test]
    fn test_u64_roundtrip() {
        let buf = roundtrip(|w| w.put_u64(3, 0x1234));
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.u64(3).unwrap(), 0x1234);
        r.finish().unwrap();
    }

    #[test]
    fn test_u64_zero_is_one_byte() {
        let buf = roundtrip(|w| w.put_u64(0, 0));
        // tag, len=1, 0x00
        assert_eq!(&buf[..], &[0x80, 0x01, 0x00]);
    }

    #[test]
    fn test_i64_negative_roundtrip() {
        for v in [-1i64, -90, -128, -129, i64::MIN, 0, 127, 128, i64::MAX] {
            let buf = roundtrip(|w| w.put_i64(1, v));
            let mut r = TlvReader::new(&buf);
            assert_eq!(r.i64(1).unwrap(), v, "value {v}");
            r.finish().unwrap();
        }
    }

    #[test]
    fn test_str_roundtrip() {
        let buf = roundtrip(|w| w.put_str(2, "xran/3"));
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.str(2).unwrap(), "xran/3");
    }

    #[test]
    fn test_high_tag_number() {
        let buf = roundtrip(|w| w.put_u64(200, 7));
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.u64(200).unwrap(), 7);
        r.finish().unwrap();
    }

    #[test]
    fn test_long_form_length() {
        let payload = vec![0xAB; 300];
        let buf = roundtrip(|w| w.put_bytes(1, &payload));
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.bytes(1).unwrap(), &payload[..]);
    }

    #[test]
    fn test_constructed_nesting() {
        let buf = roundtrip(|w| {
            w.constructed(5, |inner| {
                inner.put_u64(0, 1);
                inner.put_u64(1, 2);
            });
        });
        let mut r = TlvReader::new(&buf);
        let mut inner = r.constructed(5).unwrap();
        assert_eq!(inner.u64(0).unwrap(), 1);
        assert_eq!(inner.u64(1).unwrap(), 2);
        inner.finish().unwrap();
        r.finish().unwrap();
    }

    #[test]
    fn test_tag_mismatch() {
        let buf = roundtrip(|w| w.put_u64(3, 9));
        let mut r = TlvReader::new(&buf);
        assert!(matches!(r.u64(4), Err(TlvError::TagMismatch { .. })));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let buf = roundtrip(|w| {
            w.put_u64(0, 1);
            w.put_u64(1, 2);
        });
        let mut r = TlvReader::new(&buf);
        r.u64(0).unwrap();
        // Second field left unread.
        assert!(matches!(r.finish(), Err(TlvError::TrailingBytes(_))));
    }

    #[test]
    fn test_truncated_value() {
        let mut buf = roundtrip(|w| w.put_bytes(0, &[1, 2, 3, 4]));
        buf.truncate(buf.len() - 2);
        let mut r = TlvReader::new(&buf);
        assert!(matches!(r.next_unit(), Err(TlvError::Truncated { .. })));
    }

    #[test]
    fn test_indefinite_length_rejected() {
        // tag [ctx 0], length octet 0x80 = indefinite
        let data = [0x80u8, 0x80];
        let mut r = TlvReader::new(&data);
        assert_eq!(r.next_unit(), Err(TlvError::IndefiniteLength));
    }

    #[test]
    fn test_opt_u64() {
        let buf = roundtrip(|w| w.put_u64(1, 42));
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.opt_u64(0).unwrap(), None);
        assert_eq!(r.opt_u64(1).unwrap(), Some(42));
        assert_eq!(r.opt_u64(2).unwrap(), None);
        r.finish().unwrap();
    }

    #[test]
    fn test_integer_too_wide() {
        let buf = roundtrip(|w| w.put_bytes(0, &[0u8; 9]));
        let mut r = TlvReader::new(&buf);
        assert!(matches!(r.u64(0), Err(TlvError::IntegerTooWide(9))));
    }
}
