//! Identifier and address types shared across the store.

use std::fmt;

/// Engine-internal node sequence number, distinct from the external string id.
pub type NodeId = u32;

/// Partition identifier within a distributed graph.
pub type PartitionId = u8;

/// Graph identifier assigned by the coordinating server.
pub type GraphId = u32;

/// Byte offset of a record inside one of the store files.
///
/// Addresses double as record identities. The value `0` is the reserved list
/// terminator (`BlockAddr::NONE`); the relation and property stores keep a
/// zeroed guard block at offset 0 so no live record ever occupies it. All
/// dereferencing goes through [`crate::storage::RecordFile`], which validates
/// alignment and bounds on every access.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub struct BlockAddr(pub u32);

impl BlockAddr {
    /// Reserved "no link" value.
    pub const NONE: BlockAddr = BlockAddr(0);

    /// Returns true if this is the reserved terminator.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this points at a record.
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    /// The raw file offset.
    pub fn offset(self) -> u64 {
        u64::from(self.0)
    }
}

impl fmt::Debug for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which adjacency list a splice or traversal operates on.
///
/// Every relation record embeds two structurally identical link pairs per
/// endpoint; splice and traversal logic is generic over this tag instead of
/// being duplicated per list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ListKind {
    /// The partition-local adjacency list.
    Local,
    /// The cross-partition ("central") adjacency list.
    Central,
}

/// The role a node plays in a relation record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    /// The node is the relation's source endpoint.
    Source,
    /// The node is the relation's destination endpoint.
    Destination,
}
