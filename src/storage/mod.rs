//! Partition-local graph storage engine.
//!
//! Implements the fixed-block node and relation stores, the intrusive
//! adjacency lists threaded through them, property chains, and the manager
//! that allocates and indexes the records.

/// Fixed-block record files addressed by byte offset.
pub mod file;

mod manager;
mod node;
mod property;
mod relation;

pub use file::RecordFile;
pub use manager::NodeManager;
pub use node::{Neighbors, NodeBlock, SplicePolicy, NODE_HEADER_SIZE};
pub use property::PropertyEntry;
pub use relation::{EndpointLink, RelationBlock, LINK_SIZE, RELATION_BLOCK_SIZE};
