//! Penumbra: a partition-local graph storage engine.
//!
//! A fixed-block, file-backed representation of nodes and relationships that
//! supports O(degree) adjacency traversal without loading the full graph
//! into memory, and that distinguishes edges local to a partition from edges
//! crossing partition boundaries ("central" edges) in a distributedly
//! partitioned graph.
//!
//! The entry point is [`storage::NodeManager`], opened per partition from a
//! [`config::StoreConfig`]; the [`ingest`] module adapts JSON edge and node
//! documents onto the manager's API.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod primitives;
pub mod storage;
pub mod types;

pub use config::{OpenMode, StoreConfig};
pub use error::{Result, StoreError};
pub use storage::{NodeBlock, NodeManager, PropertyEntry, RelationBlock, SplicePolicy};
pub use types::{BlockAddr, GraphId, ListKind, NodeId, PartitionId, Role};
