//! # covertree-core
//!
//! Cover-tree spatial index over embedding vectors.
//!
//! A cover tree maintains a nested hierarchy of expanding balls whose
//! covering radius is `base^level`. It supports insertion, removal and
//! k-nearest-neighbor queries under a pluggable distance metric, plus a
//! compact little-endian binary persistence format for the hierarchy and
//! its payload values.
//!
//! ## Features
//!
//! - **Pluggable metrics**: cosine (with cached norms) and Euclidean
//! - **Stable identities**: each payload gets an append-only `i32` index,
//!   never reused after removal
//! - **Binary persistence**: byte-exact envelope + payload streams
//! - **Concurrent payload access**: the value store is reader/writer
//!   locked independently of the single-writer hierarchy
//!
//! ## Quick Start
//!
//! ```rust
//! use covertree_core::{CoverTree, DistanceMetric, Point};
//!
//! fn main() -> covertree_core::Result<()> {
//!     let mut tree = CoverTree::new(2.0, DistanceMetric::Euclidean)?;
//!
//!     tree.insert("origin".to_string(), Point::new(vec![0.0, 0.0]));
//!     tree.insert("far".to_string(), Point::new(vec![3.0, 4.0]));
//!     tree.insert("near".to_string(), Point::new(vec![1.0, 0.0]));
//!
//!     let neighbors = tree.k_nearest_neighbors(&Point::new(vec![0.0, 0.0]), 2);
//!     assert_eq!(neighbors.len(), 2);
//!     assert_eq!(tree.value(&neighbors[0].point), Some("origin".to_string()));
//!
//!     // Persist: envelope and payload array are separate streams that
//!     // must be paired at load time.
//!     let mut envelope = Vec::new();
//!     let mut payloads = Vec::new();
//!     tree.encode_tree(&mut envelope)?;
//!     tree.encode_values(&mut payloads)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
// Clippy lints configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod codec;
pub mod config;
pub mod distance;
pub mod error;
pub mod node;
pub mod point;
pub mod store;
pub mod tree;

pub use codec::{BinaryCodec, Decoder, Encoder};
pub use config::TreeConfig;
pub use distance::{cosine_distance, euclidean_distance, DistanceMetric};
pub use error::{Error, Result};
pub use node::Node;
pub use point::{Point, UNSTORED};
pub use store::{Payload, ValueStore};
pub use tree::{CoverTree, Neighbor};
