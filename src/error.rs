//! Error taxonomy for the store.

use std::io;

use thiserror::Error;

use crate::types::BlockAddr;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the store.
///
/// Lookups for unknown external ids are not errors; they return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The backing store cannot grow.
    #[error("store cannot grow: {0}")]
    Allocation(String),
    /// A traversal or splice found a relation record that does not reference
    /// the traversing node as source or destination.
    #[error("relation {relation} does not reference node {node} as source or destination")]
    CorruptAdjacency {
        /// Address of the node whose list was being walked.
        node: BlockAddr,
        /// Address of the offending relation record.
        relation: BlockAddr,
    },
    /// A node record has an empty inline label and no `label` property.
    #[error("node {addr} has no inline label and no label property")]
    MissingLabel {
        /// Address of the node record.
        addr: BlockAddr,
    },
    /// Structural integrity fault outside the adjacency lists.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// Caller-supplied value the store cannot represent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The ingestion boundary failed to parse an input document.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}
