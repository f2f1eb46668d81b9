//! Flat binary reader/writer primitives shared by the tree and value-store
//! codecs.
//!
//! # Wire Format
//!
//! All multi-byte numeric fields are little-endian. Sequences are
//! length-prefixed with a `u32` element count; strings are UTF-8 bytes with
//! a `u32` byte-length prefix. The format is fixed: changing it breaks
//! every previously persisted tree.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Capability bound for payload and structure types that carry their own
/// binary encoding.
///
/// Implementors append their fields to the [`Encoder`] in a fixed order and
/// read them back in the same order. The per-element value-store codec path
/// (see [`crate::codec_payload!`]) requires this trait.
pub trait BinaryCodec: Sized {
    /// Appends the encoded form of `self` to the encoder.
    fn encode_binary(&self, enc: &mut Encoder) -> Result<()>;

    /// Reads one value from the decoder, consuming exactly the bytes that
    /// `encode_binary` produced.
    fn decode_binary(dec: &mut Decoder) -> Result<Self>;
}

/// Growable little-endian write buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Appends a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Appends a little-endian `i32`.
    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    /// Appends a little-endian `i64`.
    pub fn put_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    /// Appends a little-endian `u32`.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Appends a little-endian `f32`.
    pub fn put_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    /// Appends a little-endian `f64`.
    pub fn put_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    /// Appends raw bytes with no length prefix.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Appends a `u32` byte-length prefix followed by the UTF-8 bytes.
    pub fn put_string(&mut self, value: &str) {
        self.put_u32(u32::try_from(value.len()).unwrap_or(u32::MAX));
        self.buf.put_slice(value.as_bytes());
    }

    /// Appends a `u32` count prefix followed by each element little-endian.
    pub fn put_f32_slice(&mut self, values: &[f32]) {
        self.put_u32(u32::try_from(values.len()).unwrap_or(u32::MAX));
        for value in values {
            self.buf.put_f32_le(*value);
        }
    }

    /// Consumes the encoder and returns the accumulated bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Writes the accumulated bytes to `writer` and consumes the encoder.
    pub fn write_to<W: std::io::Write>(self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.buf)?;
        Ok(())
    }
}

/// Truncation-checked little-endian read buffer.
///
/// Every read verifies the remaining length first, so a truncated stream
/// surfaces as [`Error::Codec`] instead of a panic.
#[derive(Debug)]
pub struct Decoder {
    buf: Bytes,
}

impl Decoder {
    /// Wraps a byte buffer for decoding.
    #[must_use]
    pub fn new(bytes: Bytes) -> Self {
        Self { buf: bytes }
    }

    /// Drains `reader` to its end and wraps the bytes for decoding.
    pub fn from_reader<R: std::io::Read>(reader: &mut R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::new(Bytes::from(data)))
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::Codec(format!(
                "unexpected end of stream: need {n} bytes, {} remaining",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    /// Reads a single byte.
    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a little-endian `i32`.
    pub fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    /// Reads a little-endian `i64`.
    pub fn i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.buf.get_i64_le())
    }

    /// Reads a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Reads a little-endian `f32`.
    pub fn f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.buf.get_f32_le())
    }

    /// Reads a little-endian `f64`.
    pub fn f64(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Reads exactly `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> Result<Bytes> {
        self.need(n)?;
        Ok(self.buf.copy_to_bytes(n))
    }

    /// Reads a `u32` byte-length prefix followed by that many UTF-8 bytes.
    pub fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::Codec(format!("invalid UTF-8 in string field: {e}")))
    }

    /// Reads a `u32` count prefix followed by that many `f32` elements.
    pub fn f32_vec(&mut self) -> Result<Vec<f32>> {
        let count = self.u32()? as usize;
        self.need(count.saturating_mul(4))?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.buf.get_f32_le());
        }
        Ok(values)
    }
}
