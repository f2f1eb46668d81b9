//! Cover tree engine: insertion, removal, k-NN search, identity lookup and
//! the persistence envelope.
//!
//! The hierarchy is a nest of balls whose radius `base^level` shrinks
//! geometrically with depth. Placement expands levels until the covering
//! radius reaches the new point; removal promotes the first child and
//! re-threads the remaining subtrees under it.
//!
//! The hierarchy itself is not internally synchronized: `&mut self` on the
//! mutating operations and `&self` on queries encode the single-writer /
//! either-reader-or-writer discipline. Payload storage stays concurrently
//! accessible through the value store's own lock.

use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::codec::{BinaryCodec, Decoder, Encoder};
use crate::config::TreeConfig;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::point::{Point, UNSTORED};
use crate::store::{Payload, ValueStore};

/// A k-NN result: a stored point and its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// The stored point.
    pub point: Point,
    /// Distance to the query under the tree's metric.
    pub distance: f32,
}

/// Bounded max-heap entry: the farthest kept candidate sits at the top so
/// eviction is O(log k).
struct Candidate<'a> {
    distance: f32,
    point: &'a Point,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance.total_cmp(&other.distance).is_eq()
    }
}

impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

/// Outcome of the recursive removal search.
enum RemoveOutcome {
    NotFound,
    /// The visited node itself matched; the parent must splice it out or
    /// install the promoted replacement in its place.
    Matched {
        identity: i32,
        replacement: Option<Node>,
    },
    /// The match was handled somewhere below the visited node.
    Removed { identity: i32 },
}

/// Spatial index over embedding vectors with payloads of type `T`.
pub struct CoverTree<T> {
    root: Option<Box<Node>>,
    base: f32,
    metric: DistanceMetric,
    values: ValueStore<T>,
    /// Identity -> point back-reference for O(1) lookup. Holds a clone;
    /// the hierarchy owns the canonical point. Not persisted; rebuilt on
    /// decode.
    index: FxHashMap<i32, Point>,
}

impl<T: Payload> CoverTree<T> {
    /// Creates an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `base` is not a finite value `> 1`.
    pub fn new(base: f32, metric: DistanceMetric) -> Result<Self> {
        Self::with_config(TreeConfig::new(base, metric))
    }

    /// Creates an empty tree from a validated config.
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: None,
            base: config.base,
            metric: config.metric,
            values: ValueStore::new(),
            index: FxHashMap::default(),
        })
    }

    /// The radius growth factor per level.
    #[must_use]
    pub fn base(&self) -> f32 {
        self.base
    }

    /// The distance metric in force.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The root of the hierarchy, absent iff the tree is empty.
    #[must_use]
    pub fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    /// Number of points currently stored in the hierarchy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the tree holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Stores `value`, stamps `point` with the assigned identity and places
    /// it into the hierarchy. Returns the identity.
    pub fn insert(&mut self, value: T, mut point: Point) -> i32 {
        let identity = self.values.put(value);
        point.stamp(identity);
        self.index.insert(identity, point.clone());
        trace!(identity, "inserting point");

        match self.root.take() {
            None => {
                self.root = Some(Box::new(Node::new(point, 0, self.base)));
            }
            Some(mut root) => {
                let fresh = Node::new(point, 0, self.base);
                match Self::place(&mut root, fresh, 0, self.base, self.metric) {
                    None => self.root = Some(root),
                    Some((node, level)) => {
                        debug!(level, "tree height grows, promoting point to new root");
                        let mut new_root = node.releveled(level, self.base);
                        new_root.children.push(*root);
                        self.root = Some(Box::new(new_root));
                    }
                }
            }
        }
        identity
    }

    /// The placement loop. Walks down while the covering radius holds,
    /// expanding the level when it does not, and attaches `node` re-leveled
    /// at its final position. When the level climbs above the current
    /// node's level the node is handed back with the escalated level for
    /// the caller to decide (grow a new root on insert, attach in place
    /// during re-threading).
    fn place(
        start: &mut Node,
        node: Node,
        mut level: i32,
        base: f32,
        metric: DistanceMetric,
    ) -> Option<(Node, i32)> {
        let mut current = start;
        loop {
            let radius = base.powi(level);
            let distance = metric.distance(&node.point, &current.point);

            if distance < radius {
                // First child in insertion order whose ball also covers the
                // point wins; no distance-minimizing tie-break.
                let covered = current
                    .children
                    .iter()
                    .position(|child| metric.distance(&node.point, &child.point) < radius);
                match covered {
                    Some(i) => {
                        current = &mut current.children[i];
                        level -= 1;
                    }
                    None => {
                        current.children.push(node.releveled(level - 1, base));
                        return None;
                    }
                }
            } else {
                // Expand the radius until it covers the point. Termination:
                // the radius is strictly increasing and unbounded in level.
                level += 1;
                if level > current.level {
                    return Some((node, level));
                }
            }
        }
    }

    /// Removes the stored point at metric distance zero from `point`.
    ///
    /// Returns `false` when the tree is empty or no match exists. On
    /// success the value-store slot is zeroed (the store never compacts)
    /// and the identity index entry is erased.
    pub fn remove(&mut self, point: &Point) -> bool {
        let Some(root) = self.root.as_deref_mut() else {
            return false;
        };

        let identity = match Self::remove_node(root, point, self.base, self.metric) {
            RemoveOutcome::NotFound => return false,
            RemoveOutcome::Removed { identity } => identity,
            RemoveOutcome::Matched {
                identity,
                replacement,
            } => {
                self.root = replacement.map(Box::new);
                identity
            }
        };

        if identity != UNSTORED {
            self.values.remove(identity);
            self.index.remove(&identity);
        }
        debug!(identity, "removed point");
        true
    }

    fn remove_node(
        node: &mut Node,
        target: &Point,
        base: f32,
        metric: DistanceMetric,
    ) -> RemoveOutcome {
        if metric.distance(target, &node.point) == 0.0 {
            let identity = node.point.identity();
            if node.children.is_empty() {
                return RemoveOutcome::Matched {
                    identity,
                    replacement: None,
                };
            }
            // Promote the first child; re-thread the remaining subtrees on
            // the detached promoted node so no partially re-threaded state
            // is ever reachable from the root.
            let mut children = std::mem::take(&mut node.children);
            let mut promoted = children.remove(0);
            for child in children {
                Self::rethread(&mut promoted, child, base, metric);
            }
            return RemoveOutcome::Matched {
                identity,
                replacement: Some(promoted),
            };
        }

        let mut i = 0;
        while i < node.children.len() {
            match Self::remove_node(&mut node.children[i], target, base, metric) {
                RemoveOutcome::NotFound => i += 1,
                RemoveOutcome::Removed { identity } => {
                    return RemoveOutcome::Removed { identity };
                }
                RemoveOutcome::Matched {
                    identity,
                    replacement,
                } => {
                    match replacement {
                        None => {
                            node.children.remove(i);
                        }
                        Some(promoted) => node.children[i] = promoted,
                    }
                    return RemoveOutcome::Removed { identity };
                }
            }
        }
        RemoveOutcome::NotFound
    }

    /// Re-runs the placement loop for a displaced child, starting at the
    /// child's original level, rooted at the promoted node. The child keeps
    /// its subtree.
    fn rethread(promoted: &mut Node, child: Node, base: f32, metric: DistanceMetric) {
        let start_level = child.level;
        if let Some((node, _)) = Self::place(promoted, child, start_level, base, metric) {
            // Climbing above the promoted node would mean growing a new
            // root, but this subtree is detached mid-removal; attach the
            // child directly under the promoted node instead.
            let level = promoted.level - 1;
            let node = node.releveled(level, base);
            promoted.children.push(node);
        }
    }

    /// Returns the `k` stored points nearest to `query`, ascending by
    /// distance, of length `min(k, len)`.
    ///
    /// This is a full traversal of the hierarchy with a bounded max-heap
    /// of candidates; the covering radius is not used for pruning.
    #[must_use]
    pub fn k_nearest_neighbors(&self, query: &Point, k: usize) -> Vec<Neighbor> {
        let Some(root) = self.root.as_deref() else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        Self::collect_neighbors(root, query, k, self.metric, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|candidate| Neighbor {
                point: candidate.point.clone(),
                distance: candidate.distance,
            })
            .collect()
    }

    fn collect_neighbors<'a>(
        node: &'a Node,
        query: &Point,
        k: usize,
        metric: DistanceMetric,
        heap: &mut BinaryHeap<Candidate<'a>>,
    ) {
        let distance = metric.distance(query, &node.point);
        if heap.len() < k {
            heap.push(Candidate {
                distance,
                point: &node.point,
            });
        } else if let Some(farthest) = heap.peek() {
            if distance < farthest.distance {
                heap.pop();
                heap.push(Candidate {
                    distance,
                    point: &node.point,
                });
            }
        }
        for child in &node.children {
            Self::collect_neighbors(child, query, k, metric, heap);
        }
    }

    /// O(1) lookup of a stored point by its identity. `None` for unknown
    /// or removed identities.
    #[must_use]
    pub fn find_point_by_index(&self, identity: i32) -> Option<&Point> {
        self.index.get(&identity)
    }

    /// The payload stored for `point`, or `None` when the point was never
    /// stamped with an identity.
    ///
    /// A removed identity yields the element type's default value; the
    /// store does not compact.
    #[must_use]
    pub fn value(&self, point: &Point) -> Option<T> {
        if !point.is_stored() {
            return None;
        }
        Some(self.values.get(point.identity()))
    }

    /// Bulk payload lookup, skipping unstamped points.
    #[must_use]
    pub fn values(&self, points: &[&Point]) -> Vec<T> {
        points
            .iter()
            .filter(|point| point.is_stored())
            .map(|point| self.values.get(point.identity()))
            .collect()
    }

    /// Encodes the tree envelope: base, metric name, then the hierarchy.
    ///
    /// The identity index is not part of the envelope. The value store is
    /// a separate stream ([`CoverTree::encode_values`]); the two must be
    /// paired at load time.
    pub fn encode_tree<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        let mut enc = Encoder::new();
        enc.put_f32(self.base);
        enc.put_string(self.metric.name());
        match &self.root {
            Some(root) => {
                enc.put_u8(1);
                root.encode_binary(&mut enc)?;
            }
            None => enc.put_u8(0),
        }
        enc.write_to(writer)
    }

    /// Decodes a tree envelope, replacing this tree's hierarchy, base and
    /// metric. The identity index is rebuilt by walking the decoded
    /// hierarchy.
    ///
    /// Decoding builds into temporaries and publishes only on full
    /// success: on error the tree is left untouched.
    pub fn decode_tree<R: std::io::Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut dec = Decoder::from_reader(reader)?;
        let base = dec.f32()?;
        let name = dec.string()?;
        let metric = DistanceMetric::from_name(&name).ok_or(Error::UnknownMetric(name))?;
        TreeConfig::new(base, metric).validate()?;

        let root = match dec.u8()? {
            0 => None,
            1 => Some(Box::new(Node::decode_binary(&mut dec)?)),
            flag => {
                return Err(Error::Codec(format!("invalid root presence flag: {flag}")));
            }
        };

        let mut index = FxHashMap::default();
        if let Some(root) = &root {
            Self::index_subtree(root, &mut index);
        }

        self.base = base;
        self.metric = metric;
        self.root = root;
        self.index = index;
        debug!(points = self.index.len(), "decoded tree envelope");
        Ok(())
    }

    fn index_subtree(node: &Node, index: &mut FxHashMap<i32, Point>) {
        if node.point.is_stored() {
            index.insert(node.point.identity(), node.point.clone());
        }
        for child in &node.children {
            Self::index_subtree(child, index);
        }
    }

    /// Encodes the payload array as its own stream.
    pub fn encode_values<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        self.values.encode(writer)
    }

    /// Decodes the payload array, replacing this tree's value store.
    pub fn decode_values<R: std::io::Read>(&mut self, reader: &mut R) -> Result<()> {
        self.values = ValueStore::decode(reader)?;
        Ok(())
    }
}
