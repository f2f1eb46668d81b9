//! Hierarchy element of the cover tree.

use crate::codec::{BinaryCodec, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::point::Point;

/// One ball in the cover hierarchy: a point, a signed level, the covering
/// radius `base^level` cached from the level, and the owned children in
/// insertion order.
///
/// The radius is recomputed whenever a node is constructed or re-leveled,
/// never mutated independently of the level.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) level: i32,
    pub(crate) radius: f32,
    pub(crate) point: Point,
    pub(crate) children: Vec<Node>,
}

impl Node {
    /// Creates a childless node at `level` with radius `base^level`.
    #[must_use]
    pub(crate) fn new(point: Point, level: i32, base: f32) -> Self {
        Self {
            level,
            radius: base.powi(level),
            point,
            children: Vec::new(),
        }
    }

    /// Rebuilds this node at a new level, keeping its point and subtree.
    #[must_use]
    pub(crate) fn releveled(self, level: i32, base: f32) -> Self {
        Self {
            level,
            radius: base.powi(level),
            point: self.point,
            children: self.children,
        }
    }

    /// The level exponent of this node.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }

    /// The covering radius, `base^level`.
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// The point owned by this node.
    #[must_use]
    pub fn point(&self) -> &Point {
        &self.point
    }

    /// Child nodes in insertion order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }
}

impl BinaryCodec for Node {
    fn encode_binary(&self, enc: &mut Encoder) -> Result<()> {
        enc.put_i32(self.level);
        enc.put_f32(self.radius);
        self.point.encode_binary(enc)?;
        enc.put_i32(i32::try_from(self.children.len()).unwrap_or(i32::MAX));
        for child in &self.children {
            child.encode_binary(enc)?;
        }
        Ok(())
    }

    fn decode_binary(dec: &mut Decoder) -> Result<Self> {
        let level = dec.i32()?;
        let radius = dec.f32()?;
        let point = Point::decode_binary(dec)?;
        let count = dec.i32()?;
        if count < 0 {
            return Err(Error::Codec(format!("negative child count: {count}")));
        }
        // Children start empty and are appended in stream order.
        let mut children = Vec::new();
        for _ in 0..count {
            children.push(Node::decode_binary(dec)?);
        }
        Ok(Self {
            level,
            radius,
            point,
            children,
        })
    }
}
