//! Append-only, index-addressed payload store.
//!
//! The store assigns each payload a stable `i32` index: the store length
//! before the append. Indices are never reused; logical removal writes the
//! element type's default value back into the slot and the store only
//! grows.
//!
//! Payload storage is guarded by a single reader/writer lock, so payloads
//! stay safe for concurrent producer/consumer use even while the node
//! hierarchy itself is single-writer.

use parking_lot::RwLock;

use crate::codec::{Decoder, Encoder};
use crate::error::{Error, Result};

/// Compile-time codec capability for value-store element types.
///
/// Encoding dispatches on the declared element type, never on runtime
/// introspection of decoded bytes. Three paths exist:
///
/// - built-in bulk implementations for `i32`, `i64`, `f32`, `f64`, `bool`
///   and `String` (length-prefixed homogeneous arrays),
/// - a raw-bytes bulk path for fixed-layout aggregates via
///   [`crate::pod_payload!`],
/// - a per-element fallback for any [`crate::BinaryCodec`] type via
///   [`crate::codec_payload!`] (element count followed by each element's
///   self-described encoding).
pub trait Payload: Clone + Default {
    /// Encodes the whole slice into the encoder.
    fn encode_values(values: &[Self], enc: &mut Encoder) -> Result<()>;

    /// Decodes the whole sequence from the decoder.
    fn decode_values(dec: &mut Decoder) -> Result<Vec<Self>>;
}

macro_rules! numeric_payload {
    ($ty:ty, $put:ident, $get:ident, $width:expr) => {
        impl Payload for $ty {
            fn encode_values(values: &[Self], enc: &mut Encoder) -> Result<()> {
                enc.put_u32(u32::try_from(values.len()).unwrap_or(u32::MAX));
                for value in values {
                    enc.$put(*value);
                }
                Ok(())
            }

            fn decode_values(dec: &mut Decoder) -> Result<Vec<Self>> {
                let count = dec.u32()? as usize;
                if dec.remaining() < count.saturating_mul($width) {
                    return Err(Error::Codec(format!(
                        "truncated {} array: {count} elements declared",
                        stringify!($ty)
                    )));
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(dec.$get()?);
                }
                Ok(values)
            }
        }
    };
}

numeric_payload!(i32, put_i32, i32, 4);
numeric_payload!(i64, put_i64, i64, 8);
numeric_payload!(f32, put_f32, f32, 4);
numeric_payload!(f64, put_f64, f64, 8);

impl Payload for bool {
    fn encode_values(values: &[Self], enc: &mut Encoder) -> Result<()> {
        enc.put_u32(u32::try_from(values.len()).unwrap_or(u32::MAX));
        for value in values {
            enc.put_u8(u8::from(*value));
        }
        Ok(())
    }

    fn decode_values(dec: &mut Decoder) -> Result<Vec<Self>> {
        let count = dec.u32()? as usize;
        if dec.remaining() < count {
            return Err(Error::Codec(format!(
                "truncated bool array: {count} elements declared"
            )));
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(dec.u8()? != 0);
        }
        Ok(values)
    }
}

impl Payload for String {
    fn encode_values(values: &[Self], enc: &mut Encoder) -> Result<()> {
        enc.put_u32(u32::try_from(values.len()).unwrap_or(u32::MAX));
        for value in values {
            enc.put_string(value);
        }
        Ok(())
    }

    fn decode_values(dec: &mut Decoder) -> Result<Vec<Self>> {
        let count = dec.u32()? as usize;
        let mut values = Vec::with_capacity(count.min(dec.remaining()));
        for _ in 0..count {
            values.push(dec.string()?);
        }
        Ok(values)
    }
}

/// Implements [`Payload`] for a fixed-layout aggregate by copying its
/// backing memory directly, one `u32` byte-length prefix followed by the
/// raw bytes of the whole array.
///
/// The type must be [`bytemuck::Pod`]: no pointers, no padding surprises.
/// The byte image is host-layout; the surrounding format is little-endian,
/// so this path is byte-exact on little-endian targets only, matching the
/// rest of the wire format.
///
/// ```
/// use covertree_core::pod_payload;
///
/// #[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
/// #[repr(C)]
/// struct Sample {
///     id: i64,
///     score: f64,
/// }
///
/// pod_payload!(Sample);
/// ```
#[macro_export]
macro_rules! pod_payload {
    ($ty:ty) => {
        impl $crate::Payload for $ty {
            fn encode_values(
                values: &[Self],
                enc: &mut $crate::Encoder,
            ) -> $crate::Result<()> {
                let raw: &[u8] = ::bytemuck::cast_slice(values);
                enc.put_u32(u32::try_from(raw.len()).unwrap_or(u32::MAX));
                enc.put_bytes(raw);
                Ok(())
            }

            fn decode_values(dec: &mut $crate::Decoder) -> $crate::Result<Vec<Self>> {
                let len = dec.u32()? as usize;
                let raw = dec.bytes(len)?;
                let size = ::std::mem::size_of::<$ty>();
                if size == 0 || len % size != 0 {
                    return Err($crate::Error::Codec(format!(
                        "raw payload length {len} is not a multiple of element size {size}"
                    )));
                }
                let mut values = vec![<$ty as ::std::default::Default>::default(); len / size];
                ::bytemuck::cast_slice_mut::<$ty, u8>(&mut values).copy_from_slice(&raw);
                Ok(values)
            }
        }
    };
}

/// Implements [`Payload`] for any [`crate::BinaryCodec`] type through the
/// per-element fallback path: a `u32` element count followed by each
/// element's self-described encoding.
#[macro_export]
macro_rules! codec_payload {
    ($ty:ty) => {
        impl $crate::Payload for $ty {
            fn encode_values(
                values: &[Self],
                enc: &mut $crate::Encoder,
            ) -> $crate::Result<()> {
                enc.put_u32(u32::try_from(values.len()).unwrap_or(u32::MAX));
                for value in values {
                    $crate::BinaryCodec::encode_binary(value, enc)?;
                }
                Ok(())
            }

            fn decode_values(dec: &mut $crate::Decoder) -> $crate::Result<Vec<Self>> {
                let count = dec.u32()? as usize;
                let mut values = Vec::with_capacity(count.min(dec.remaining()));
                for _ in 0..count {
                    values.push(<$ty as $crate::BinaryCodec>::decode_binary(dec)?);
                }
                Ok(values)
            }
        }
    };
}

/// Append-only payload container mapping point identities to values.
#[derive(Debug, Default)]
pub struct ValueStore<T> {
    data: RwLock<Vec<T>>,
}

impl<T: Payload> ValueStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Vec::new()),
        }
    }

    /// Appends `value` and returns its index: the store length before the
    /// append. Takes the exclusive lock.
    pub fn put(&self, value: T) -> i32 {
        let mut data = self.data.write();
        // The format addresses slots with i32; a store this large is out
        // of range for the wire format anyway.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let index = data.len() as i32;
        data.push(value);
        index
    }

    /// Returns the value at `index`. Takes the shared lock.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Querying a never-assigned index
    /// is a caller bug, not an expected runtime condition.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn get(&self, index: i32) -> T {
        assert!(index >= 0, "value store index {index} is negative");
        self.data.read()[index as usize].clone()
    }

    /// Replaces the slot at `index` with the element type's default value.
    /// The index space is not compacted and the index is never reused.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[allow(clippy::cast_sign_loss)]
    pub fn remove(&self, index: i32) {
        assert!(index >= 0, "value store index {index} is negative");
        self.data.write()[index as usize] = T::default();
    }

    /// Number of slots ever assigned. Never decreases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether no slot was ever assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Encodes the whole store to `writer` using the element type's codec
    /// path.
    pub fn encode<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        let mut enc = Encoder::new();
        T::encode_values(&self.data.read(), &mut enc)?;
        enc.write_to(writer)
    }

    /// Decodes a store from `reader`. Dispatch is driven by the declared
    /// element type `T`.
    pub fn decode<R: std::io::Read>(reader: &mut R) -> Result<Self> {
        let mut dec = Decoder::from_reader(reader)?;
        let data = T::decode_values(&mut dec)?;
        Ok(Self {
            data: RwLock::new(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryCodec;

    #[test]
    fn test_put_returns_pre_append_length() {
        let store = ValueStore::new();
        assert_eq!(store.put(10), 0);
        assert_eq!(store.put(20), 1);
        assert_eq!(store.put(30), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_remove_zeroes_slot_without_compacting() {
        let store = ValueStore::new();
        store.put(10);
        store.put(20);
        store.put(30);

        store.remove(1);
        assert_eq!(store.get(1), 0);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0), 10);
        assert_eq!(store.get(2), 30);
    }

    #[test]
    #[should_panic(expected = "negative")]
    fn test_get_negative_index_panics() {
        let store: ValueStore<i32> = ValueStore::new();
        store.put(1);
        let _ = store.get(-1);
    }

    #[test]
    fn test_concurrent_puts_assign_unique_indices() {
        let store = std::sync::Arc::new(ValueStore::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                (0..100).map(|i| store.put(t * 100 + i)).collect::<Vec<_>>()
            }));
        }
        let mut seen: Vec<i32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 400);
        assert_eq!(store.len(), 400);
    }

    fn round_trip<T: Payload + std::fmt::Debug + PartialEq>(values: Vec<T>) -> Vec<T> {
        let store = ValueStore::new();
        for value in values {
            store.put(value);
        }
        let mut buffer = Vec::new();
        store.encode(&mut buffer).unwrap();
        assert!(!buffer.is_empty());

        let decoded: ValueStore<T> = ValueStore::decode(&mut buffer.as_slice()).unwrap();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let indices = 0..decoded.len() as i32;
        indices.map(|i| decoded.get(i)).collect()
    }

    #[test]
    fn test_codec_round_trip_primitives() {
        assert_eq!(round_trip(vec![1_i32, 2, 1011]), vec![1, 2, 1011]);
        assert_eq!(round_trip(vec![1_i64 << 40, -9]), vec![1_i64 << 40, -9]);
        assert_eq!(round_trip(vec![1.5_f32, -2.25]), vec![1.5, -2.25]);
        assert_eq!(round_trip(vec![1.1_f64, 2.4, 1011.2]), vec![1.1, 2.4, 1011.2]);
        assert_eq!(round_trip(vec![true, false, true]), vec![true, false, true]);
        assert_eq!(
            round_trip(vec!["abc".to_string(), String::new(), "ghi".to_string()]),
            vec!["abc", "", "ghi"]
        );
    }

    #[test]
    fn test_codec_round_trip_empty_store() {
        assert_eq!(round_trip(Vec::<i32>::new()), Vec::<i32>::new());
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Account {
        id: i64,
        amount: f64,
    }

    pod_payload!(Account);

    #[test]
    fn test_codec_round_trip_pod_aggregate() {
        let values = vec![
            Account {
                id: 1,
                amount: 1.1,
            },
            Account {
                id: 2,
                amount: 2.2,
            },
        ];
        assert_eq!(round_trip(values.clone()), values);
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Document {
        title: String,
        rank: i32,
    }

    impl BinaryCodec for Document {
        fn encode_binary(&self, enc: &mut Encoder) -> Result<()> {
            enc.put_string(&self.title);
            enc.put_i32(self.rank);
            Ok(())
        }

        fn decode_binary(dec: &mut Decoder) -> Result<Self> {
            Ok(Self {
                title: dec.string()?,
                rank: dec.i32()?,
            })
        }
    }

    codec_payload!(Document);

    #[test]
    fn test_codec_round_trip_custom_elements() {
        let values = vec![
            Document {
                title: "first".to_string(),
                rank: 3,
            },
            Document {
                title: String::new(),
                rank: -1,
            },
        ];
        assert_eq!(round_trip(values.clone()), values);
    }

    #[test]
    fn test_decode_truncated_store_fails() {
        let store = ValueStore::new();
        store.put(7_i32);
        store.put(8_i32);
        let mut buffer = Vec::new();
        store.encode(&mut buffer).unwrap();

        buffer.truncate(buffer.len() - 2);
        let result: Result<ValueStore<i32>> = ValueStore::decode(&mut buffer.as_slice());
        assert!(result.is_err());
    }
}
