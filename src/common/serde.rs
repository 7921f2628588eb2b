//! Little-endian wire-format primitives shared by every sketch's `serialize`/`deserialize`.
//!
//! Every family writes the same shape of preamble (size in 4-byte words, serial version,
//! family id, flags byte, then a family-specific sizing field) before its body, and reads
//! it back the same way. Keeping the cursor bookkeeping here means each sketch's
//! `deserialize` only has to validate its own fields, not re-derive bounds-checked reads.

use crate::common::{Result, SketchError};

/// Appends a single byte.
pub fn write_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

/// Appends a 16-bit unsigned integer, little-endian.
pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a 32-bit unsigned integer, little-endian.
pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a 64-bit unsigned integer, little-endian.
pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a 32-bit signed integer, little-endian.
pub fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a 64-bit signed integer, little-endian.
pub fn write_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a 32-bit float, little-endian.
pub fn write_f32(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a 64-bit float, little-endian.
pub fn write_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// A forward-only cursor over a byte slice, used while deserializing. Every `read_*`
/// method advances the cursor past the field it reads and fails with
/// [`SketchError::CorruptInput`] if too few bytes remain.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Wraps `bytes` in a cursor starting at offset `0`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    /// Current read offset, in bytes from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes remaining after the cursor.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(SketchError::CorruptInput {
                reason: format!(
                    "unexpected end of input at offset {}: need {} more byte(s), have {}",
                    self.pos,
                    n,
                    self.remaining()
                ),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a 16-bit unsigned integer, little-endian.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes: [u8; 2] = self.take(2)?.try_into().unwrap();
        Ok(u16::from_le_bytes(bytes))
    }

    /// Reads a 32-bit unsigned integer, little-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads a 64-bit unsigned integer, little-endian.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads a 32-bit signed integer, little-endian.
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(i32::from_le_bytes(bytes))
    }

    /// Reads a 64-bit signed integer, little-endian.
    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(i64::from_le_bytes(bytes))
    }

    /// Reads a 32-bit float, little-endian.
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(f32::from_le_bytes(bytes))
    }

    /// Reads a 64-bit float, little-endian.
    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(f64::from_le_bytes(bytes))
    }

    /// Reads exactly `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Reads a ULEB128-encoded unsigned integer.
    ///
    /// # Errors
    /// Returns [`SketchError::CorruptInput`] if the input truncates mid-varint or the
    /// varint would overflow a `u64`.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(SketchError::CorruptInput {
                    reason: "uleb128 varint longer than 64 bits".to_string(),
                });
            }
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result)
    }
}

/// Appends a ULEB128-encoded unsigned integer.
pub fn write_uleb128(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        } else {
            buf.push(byte | 0x80);
        }
    }
}

/// Per-item (de)serialization for the sketch families that store arbitrary item payloads
/// (frequent-items, tuple summaries). Mirrors the reference implementations' per-type
/// item serde, including the 32-bit length-prefixed `String` encoding used for
/// cross-library interop.
pub trait ItemSerde: Sized {
    /// The encoded byte length of `self`. Fixed-width types return a constant; `String`
    /// returns `4 + utf8_len`.
    fn size_of_item(&self) -> usize;

    /// Appends this item's encoding to `buf`.
    fn serialize_item(&self, buf: &mut Vec<u8>);

    /// Reads one item's encoding from the cursor.
    fn deserialize_item(cursor: &mut Cursor) -> Result<Self>;
}

impl ItemSerde for i32 {
    fn size_of_item(&self) -> usize {
        4
    }
    fn serialize_item(&self, buf: &mut Vec<u8>) {
        write_i32(buf, *self);
    }
    fn deserialize_item(cursor: &mut Cursor) -> Result<Self> {
        cursor.read_i32()
    }
}

impl ItemSerde for i64 {
    fn size_of_item(&self) -> usize {
        8
    }
    fn serialize_item(&self, buf: &mut Vec<u8>) {
        write_i64(buf, *self);
    }
    fn deserialize_item(cursor: &mut Cursor) -> Result<Self> {
        cursor.read_i64()
    }
}

impl ItemSerde for f32 {
    fn size_of_item(&self) -> usize {
        4
    }
    fn serialize_item(&self, buf: &mut Vec<u8>) {
        write_f32(buf, *self);
    }
    fn deserialize_item(cursor: &mut Cursor) -> Result<Self> {
        cursor.read_f32()
    }
}

impl ItemSerde for f64 {
    fn size_of_item(&self) -> usize {
        8
    }
    fn serialize_item(&self, buf: &mut Vec<u8>) {
        write_f64(buf, *self);
    }
    fn deserialize_item(cursor: &mut Cursor) -> Result<Self> {
        cursor.read_f64()
    }
}

impl ItemSerde for String {
    fn size_of_item(&self) -> usize {
        4 + self.as_bytes().len()
    }
    fn serialize_item(&self, buf: &mut Vec<u8>) {
        let bytes = self.as_bytes();
        write_u32(buf, bytes.len() as u32);
        buf.extend_from_slice(bytes);
    }
    fn deserialize_item(cursor: &mut Cursor) -> Result<Self> {
        let len = cursor.read_u32()? as usize;
        let bytes = cursor.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SketchError::CorruptInput {
            reason: "item string is not valid utf-8".to_string(),
        })
    }
}

/// Serializes a slice of items: no count prefix, callers write the count themselves as
/// part of the family-specific preamble.
pub fn serialize_items<T: ItemSerde>(buf: &mut Vec<u8>, items: &[T]) {
    for item in items {
        item.serialize_item(buf);
    }
}

/// Deserializes exactly `count` items.
pub fn deserialize_items<T: ItemSerde>(cursor: &mut Cursor, count: usize) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::deserialize_item(cursor)?);
    }
    Ok(items)
}
