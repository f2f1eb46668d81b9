//! Vector record stored in the tree.

use crate::codec::{BinaryCodec, Decoder, Encoder};
use crate::error::Result;

/// Sentinel identity for a point that has not been stored yet.
pub const UNSTORED: i32 = -1;

/// A point in the embedding space.
///
/// The vector length is fixed per tree instance by the first insert. The
/// L2 norm is computed once at construction and carried alongside the
/// vector; a stored norm of `0.0` means "not yet computed" and is
/// recomputed on decode. True zero vectors therefore recompute to zero
/// every time, which is acceptable because cosine distance is undefined
/// for them anyway.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    identity: i32,
    magnitude: f32,
    vector: Vec<f32>,
}

impl Point {
    /// Creates an unstored point, computing its norm eagerly.
    #[must_use]
    pub fn new(vector: Vec<f32>) -> Self {
        let magnitude = l2_norm(&vector);
        Self {
            identity: UNSTORED,
            magnitude,
            vector,
        }
    }

    /// Reassembles a point from persisted fields.
    ///
    /// A zero stored magnitude is treated as "not yet computed" and
    /// recomputed from the vector.
    #[must_use]
    pub(crate) fn from_parts(identity: i32, magnitude: f32, vector: Vec<f32>) -> Self {
        let magnitude = if magnitude == 0.0 {
            l2_norm(&vector)
        } else {
            magnitude
        };
        Self {
            identity,
            magnitude,
            vector,
        }
    }

    /// The cached Euclidean norm of the vector.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    /// The embedding vector.
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// The value-store index assigned at insertion, or [`UNSTORED`].
    #[must_use]
    pub fn identity(&self) -> i32 {
        self.identity
    }

    /// Whether this point has been stored and stamped with an identity.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.identity != UNSTORED
    }

    /// Stamps the identity assigned by the value store. Called exactly once
    /// per point, at insertion.
    pub(crate) fn stamp(&mut self, identity: i32) {
        self.identity = identity;
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

impl BinaryCodec for Point {
    fn encode_binary(&self, enc: &mut Encoder) -> Result<()> {
        enc.put_i32(self.identity);
        enc.put_f32(self.magnitude);
        enc.put_f32_slice(&self.vector);
        Ok(())
    }

    fn decode_binary(dec: &mut Decoder) -> Result<Self> {
        let identity = dec.i32()?;
        let magnitude = dec.f32()?;
        let vector = dec.f32_vec()?;
        Ok(Self::from_parts(identity, magnitude, vector))
    }
}
