//! Entity record codec
//!
//! Record format:
//!
//! ```text
//! +--------------------+
//! | Record Length      | (u32 LE, whole record incl. this field and checksum)
//! +--------------------+
//! | Format Version     | (u8)
//! +--------------------+
//! | Flags              | (u8, reserved)
//! +--------------------+
//! | Type Name Length   | (u8)
//! +--------------------+
//! | Type Name          | (ASCII, e.g. "VolumeEntry")
//! +--------------------+
//! | Body               | (kind-specific fields)
//! +--------------------+
//! | Checksum           | (u32 LE)
//! +--------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself. Body strings are
//! length-prefixed (u32 LE), lists are count-prefixed (u32 LE), integers are
//! fixed-width little endian, bools and enum discriminants are one byte.
//!
//! Decoding is exact: a window decodes only if it is precisely one record.
//! The recovery scan relies on that to find record ends by probing.

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{CodecError, CodecResult};

/// Current record format version
pub const FORMAT_VERSION: u8 = 1;

/// Byte offset of the type-name length byte within a record
pub const TYPE_NAME_LEN_OFFSET: usize = 6;

/// Byte offset of the first type-name byte within a record
pub const TYPE_NAME_OFFSET: usize = TYPE_NAME_LEN_OFFSET + 1;

/// Size of the CRC32 trailer
pub const CHECKSUM_LEN: usize = 4;

/// Builds a record body field by field.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_str(&mut self, value: &str) {
        self.put_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn put_strings(&mut self, values: &[String]) {
        self.put_u32(values.len() as u32);
        for value in values {
            self.put_str(value);
        }
    }

    /// Encodes a count-prefixed list with a per-item closure.
    pub fn put_list<T>(&mut self, items: &[T], mut put: impl FnMut(&mut Self, &T)) {
        self.put_u32(items.len() as u32);
        for item in items {
            put(self, item);
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads a record body field by field.
///
/// Every read checks the remaining length before touching the bytes, so a
/// corrupted length prefix fails cleanly instead of allocating.
#[derive(Debug)]
pub struct Decoder<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self { body, pos: 0 }
    }

    /// Bytes left in the body.
    pub fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }

    fn take(&mut self, field: &'static str, needed: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(CodecError::Truncated {
                field,
                needed,
                remaining,
            });
        }
        let bytes = &self.body[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    pub fn get_u8(&mut self, field: &'static str) -> CodecResult<u8> {
        Ok(self.take(field, 1)?[0])
    }

    pub fn get_bool(&mut self, field: &'static str) -> CodecResult<bool> {
        match self.get_u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidDiscriminant { field, value }),
        }
    }

    pub fn get_u32(&mut self, field: &'static str) -> CodecResult<u32> {
        let b = self.take(field, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self, field: &'static str) -> CodecResult<u64> {
        let b = self.take(field, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn get_i64(&mut self, field: &'static str) -> CodecResult<i64> {
        let b = self.take(field, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(i64::from_le_bytes(raw))
    }

    pub fn get_string(&mut self, field: &'static str) -> CodecResult<String> {
        let len = self.get_u32(field)? as usize;
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
    }

    pub fn get_strings(&mut self, field: &'static str) -> CodecResult<Vec<String>> {
        self.get_list(field, |dec| dec.get_string(field))
    }

    /// Decodes a count-prefixed list with a per-item closure.
    pub fn get_list<T>(
        &mut self,
        field: &'static str,
        mut get: impl FnMut(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<Vec<T>> {
        let count = self.get_u32(field)? as usize;
        // Each item takes at least one byte; a larger count is corrupt.
        if count > self.remaining() {
            return Err(CodecError::Truncated {
                field,
                needed: count,
                remaining: self.remaining(),
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(get(self)?);
        }
        Ok(items)
    }

    fn finish(self) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

/// Smallest possible record carrying the given type name (empty body).
pub fn framing_len(type_name: &str) -> usize {
    TYPE_NAME_OFFSET + type_name.len() + CHECKSUM_LEN
}

/// Frames an encoded body as a complete record.
pub fn marshal_record(type_name: &str, encode: impl FnOnce(&mut Encoder)) -> Vec<u8> {
    let mut body = Encoder::default();
    encode(&mut body);
    let body = body.into_bytes();

    let record_length = framing_len(type_name) + body.len();

    let mut record = Vec::with_capacity(record_length);
    record.extend_from_slice(&(record_length as u32).to_le_bytes());
    record.push(FORMAT_VERSION);
    record.push(0);
    record.push(type_name.len() as u8);
    record.extend_from_slice(type_name.as_bytes());
    record.extend_from_slice(&body);

    let checksum = compute_checksum(&record);
    record.extend_from_slice(&checksum.to_le_bytes());

    record
}

/// Decodes exactly one record from `window`.
///
/// The window must be the whole record: declared length, checksum, type
/// name and body must all line up with its bounds.
pub fn unmarshal_record<T>(
    window: &[u8],
    type_name: &'static str,
    decode: impl FnOnce(&mut Decoder<'_>) -> CodecResult<T>,
) -> CodecResult<T> {
    let min = framing_len(type_name);
    if window.len() < min {
        return Err(CodecError::TooShort {
            len: window.len(),
            min,
        });
    }

    let declared = u32::from_le_bytes([window[0], window[1], window[2], window[3]]) as usize;
    if declared != window.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: window.len(),
        });
    }

    let checksum_offset = window.len() - CHECKSUM_LEN;
    let stored = u32::from_le_bytes([
        window[checksum_offset],
        window[checksum_offset + 1],
        window[checksum_offset + 2],
        window[checksum_offset + 3],
    ]);
    let covered = &window[..checksum_offset];
    if !verify_checksum(covered, stored) {
        return Err(CodecError::ChecksumMismatch {
            computed: compute_checksum(covered),
            stored,
        });
    }

    if window[4] != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(window[4]));
    }

    let name_len = window[TYPE_NAME_LEN_OFFSET] as usize;
    let name_end = TYPE_NAME_OFFSET + name_len;
    if name_end > checksum_offset || &window[TYPE_NAME_OFFSET..name_end] != type_name.as_bytes() {
        let end = name_end.min(checksum_offset);
        return Err(CodecError::TypeMismatch {
            expected: type_name,
            found: String::from_utf8_lossy(&window[TYPE_NAME_OFFSET..end]).into_owned(),
        });
    }

    let mut decoder = Decoder::new(&window[name_end..checksum_offset]);
    let value = decode(&mut decoder)?;
    decoder.finish()?;

    Ok(value)
}
