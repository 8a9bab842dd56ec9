//! Node records and adjacency traversal.
//!
//! A node record carries the heads of two intrusive doubly-linked adjacency
//! lists (local and central) threaded through the relation records, a
//! property-chain head, and the external string identifier. Identifiers that
//! do not fit the inline label buffer are stored as a `label` property
//! instead, with the empty inline buffer acting as the "look in properties"
//! sentinel.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::storage::manager::Stores;
use crate::storage::property::{self, PropertyEntry};
use crate::storage::relation::{RelationBlock, RELATION_BLOCK_SIZE};
use crate::types::{BlockAddr, ListKind, NodeId, PartitionId};

/// Fixed prefix of a node record before the label buffer.
pub const NODE_HEADER_SIZE: usize = 18;

const OFF_ACTIVE: usize = 0;
const OFF_NODE_ID: usize = 1;
const OFF_LOCAL_HEAD: usize = 5;
const OFF_CENTRAL_HEAD: usize = 9;
const OFF_CENTRAL_PARTITION: usize = 13;
const OFF_PROP_HEAD: usize = 14;
const OFF_LABEL: usize = NODE_HEADER_SIZE;

/// Where a new relation lands in an adjacency list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SplicePolicy {
    /// O(1) head insertion; traversal sees the most recent relation first.
    Head,
    /// O(degree) tail append; preserves insertion order.
    Tail,
}

pub(crate) struct RawNode {
    pub active: bool,
    pub node_id: NodeId,
    pub local_head: BlockAddr,
    pub central_head: BlockAddr,
    pub central_partition: PartitionId,
    pub prop_head: BlockAddr,
    pub label: String,
}

pub(crate) fn encode(raw: &RawNode, label_capacity: usize) -> Result<Vec<u8>> {
    let label = raw.label.as_bytes();
    if label.len() > label_capacity {
        return Err(StoreError::InvalidArgument(format!(
            "inline label of {} bytes exceeds capacity {label_capacity}",
            label.len()
        )));
    }
    let mut buf = vec![0u8; NODE_HEADER_SIZE + label_capacity];
    buf[OFF_ACTIVE] = raw.active as u8;
    buf[OFF_NODE_ID..OFF_NODE_ID + 4].copy_from_slice(&raw.node_id.to_le_bytes());
    buf[OFF_LOCAL_HEAD..OFF_LOCAL_HEAD + 4].copy_from_slice(&raw.local_head.0.to_le_bytes());
    buf[OFF_CENTRAL_HEAD..OFF_CENTRAL_HEAD + 4].copy_from_slice(&raw.central_head.0.to_le_bytes());
    buf[OFF_CENTRAL_PARTITION] = raw.central_partition;
    buf[OFF_PROP_HEAD..OFF_PROP_HEAD + 4].copy_from_slice(&raw.prop_head.0.to_le_bytes());
    buf[OFF_LABEL..OFF_LABEL + label.len()].copy_from_slice(label);
    Ok(buf)
}

pub(crate) fn decode(buf: &[u8], addr: BlockAddr) -> Result<RawNode> {
    let word = |off: usize| {
        BlockAddr(u32::from_le_bytes(
            buf[off..off + 4].try_into().expect("slice has exactly 4 bytes"),
        ))
    };
    let label_buf = &buf[OFF_LABEL..];
    let end = label_buf.iter().position(|&b| b == 0).unwrap_or(label_buf.len());
    let label = std::str::from_utf8(&label_buf[..end])
        .map_err(|_| StoreError::Corruption(format!("node label at {addr} is not UTF-8")))?
        .to_owned();
    Ok(RawNode {
        active: buf[OFF_ACTIVE] != 0,
        node_id: u32::from_le_bytes(
            buf[OFF_NODE_ID..OFF_NODE_ID + 4]
                .try_into()
                .expect("slice has exactly 4 bytes"),
        ),
        local_head: word(OFF_LOCAL_HEAD),
        central_head: word(OFF_CENTRAL_HEAD),
        central_partition: buf[OFF_CENTRAL_PARTITION],
        prop_head: word(OFF_PROP_HEAD),
        label,
    })
}

/// An in-memory mirror of one node record, identified by its address in the
/// node store.
pub struct NodeBlock {
    stores: Arc<Stores>,
    /// Address of this record; doubles as its identity.
    pub addr: BlockAddr,
    /// Engine-internal sequence number.
    pub node_id: NodeId,
    /// Resolved external identifier (inline label or escalated property).
    pub id: String,
    /// Tombstone/usage flag.
    pub active: bool,
    /// Head of the partition-local adjacency list.
    pub local_head: BlockAddr,
    /// Head of the cross-partition adjacency list.
    pub central_head: BlockAddr,
    /// Partition id recorded with the central-list head.
    pub central_partition: PartitionId,
    /// Head of the node's property chain.
    pub prop_head: BlockAddr,
}

impl fmt::Debug for NodeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBlock")
            .field("addr", &self.addr)
            .field("id", &self.id)
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

impl NodeBlock {
    pub(crate) fn from_raw(
        stores: &Arc<Stores>,
        addr: BlockAddr,
        raw: RawNode,
        id: String,
    ) -> Self {
        Self {
            stores: Arc::clone(stores),
            addr,
            node_id: raw.node_id,
            id,
            active: raw.active,
            local_head: raw.local_head,
            central_head: raw.central_head,
            central_partition: raw.central_partition,
            prop_head: raw.prop_head,
        }
    }

    /// Reads the node record at `addr` and resolves its external id.
    ///
    /// An empty inline label means the id was escalated to a `label`
    /// property; a node with neither is reported as
    /// [`StoreError::MissingLabel`]. Non-terminator adjacency heads must be
    /// aligned to the relation block size.
    pub(crate) fn load(stores: &Arc<Stores>, addr: BlockAddr) -> Result<Self> {
        let buf = stores.nodes.read_block(addr)?;
        let raw = decode(&buf, addr)?;
        for head in [raw.local_head, raw.central_head] {
            if head.0 % RELATION_BLOCK_SIZE as u32 != 0 {
                return Err(StoreError::Corruption(format!(
                    "node {addr} adjacency head {head} is not aligned to the relation block size"
                )));
            }
        }
        let id = if raw.label.is_empty() {
            property::find(&stores.props, stores.prop_layout(), raw.prop_head, "label")?
                .ok_or(StoreError::MissingLabel { addr })?
        } else {
            raw.label.clone()
        };
        Ok(Self::from_raw(stores, addr, raw, id))
    }

    /// The head address of the given adjacency list.
    pub fn head(&self, kind: ListKind) -> BlockAddr {
        match kind {
            ListKind::Local => self.local_head,
            ListKind::Central => self.central_head,
        }
    }

    fn set_head(&mut self, kind: ListKind, addr: BlockAddr) -> Result<()> {
        match kind {
            ListKind::Local => {
                self.stores
                    .nodes
                    .write_field(self.addr, OFF_LOCAL_HEAD, &addr.0.to_le_bytes())?;
                self.local_head = addr;
            }
            ListKind::Central => {
                // Head and partition byte are contiguous; one field write
                // keeps them consistent.
                let partition = self.stores.cfg.partition_id;
                let mut buf = [0u8; 5];
                buf[..4].copy_from_slice(&addr.0.to_le_bytes());
                buf[4] = partition;
                self.stores
                    .nodes
                    .write_field(self.addr, OFF_CENTRAL_HEAD, &buf)?;
                self.central_head = addr;
                self.central_partition = partition;
            }
        }
        Ok(())
    }

    /// Links `rel` into this node's adjacency list of the given kind.
    ///
    /// Head insertion rewires the old head's back-pointer and the new
    /// relation's forward pointer for whichever role this node plays in
    /// each, then updates the node's head field. Tail append walks the
    /// role-appropriate `next` pointers to the terminator instead.
    pub(crate) fn splice(
        &mut self,
        kind: ListKind,
        rel: &mut RelationBlock,
        policy: SplicePolicy,
    ) -> Result<()> {
        match policy {
            SplicePolicy::Head => self.splice_head(kind, rel),
            SplicePolicy::Tail => self.splice_tail(kind, rel),
        }
    }

    fn splice_head(&mut self, kind: ListKind, rel: &mut RelationBlock) -> Result<()> {
        let head = self.head(kind);
        if head.is_some() {
            let mut current = RelationBlock::load(&self.stores, head)?;
            let head_role = current
                .role_of(self.addr)
                .ok_or_else(|| current.corrupt_for(self.addr))?;
            current.set_prev(head_role, kind, rel.addr)?;
            let new_role = rel
                .role_of(self.addr)
                .ok_or_else(|| rel.corrupt_for(self.addr))?;
            rel.set_next(new_role, kind, head)?;
        }
        debug!(node = %self.addr, relation = %rel.addr, ?kind, "spliced relation at head");
        self.set_head(kind, rel.addr)
    }

    fn splice_tail(&mut self, kind: ListKind, rel: &mut RelationBlock) -> Result<()> {
        let head = self.head(kind);
        if head.is_none() {
            return self.set_head(kind, rel.addr);
        }
        let mut current = RelationBlock::load(&self.stores, head)?;
        let mut remaining = self.stores.relations.tail() / RELATION_BLOCK_SIZE as u32;
        loop {
            let role = current
                .role_of(self.addr)
                .ok_or_else(|| current.corrupt_for(self.addr))?;
            let next = current.next_addr(role, kind);
            if next.is_none() {
                return current.set_next(role, kind, rel.addr);
            }
            if remaining == 0 {
                return Err(StoreError::Corruption(format!(
                    "adjacency list of node {} does not terminate",
                    self.addr
                )));
            }
            remaining -= 1;
            current = RelationBlock::load(&self.stores, next)?;
        }
    }

    /// Walks the whole list of the given kind without mutating anything,
    /// verifying that every relation references this node in some role and
    /// that the list terminates.
    pub(crate) fn validate_list(&self, kind: ListKind) -> Result<()> {
        let mut current = self.head(kind);
        let mut remaining = self.stores.relations.tail() / RELATION_BLOCK_SIZE as u32;
        while current.is_some() {
            if remaining == 0 {
                return Err(StoreError::Corruption(format!(
                    "adjacency list of node {} does not terminate",
                    self.addr
                )));
            }
            remaining -= 1;
            let rel = RelationBlock::load(&self.stores, current)?;
            let role = rel
                .role_of(self.addr)
                .ok_or_else(|| rel.corrupt_for(self.addr))?;
            current = rel.next_addr(role, kind);
        }
        Ok(())
    }

    /// Walks the local adjacency list for a relation whose opposite endpoint
    /// is `other`.
    ///
    /// In a directed graph a destination-role entry is not a valid
    /// continuation; encountering one (or a relation referencing this node
    /// in neither role) is a structural fault, not a miss.
    pub fn search_relation(&self, other: &NodeBlock) -> Result<Option<RelationBlock>> {
        self.search(ListKind::Local, other.addr)
    }

    /// [`Self::search_relation`] against the central adjacency list.
    pub fn search_central_relation(&self, other: &NodeBlock) -> Result<Option<RelationBlock>> {
        self.search(ListKind::Central, other.addr)
    }

    fn search(&self, kind: ListKind, other: BlockAddr) -> Result<Option<RelationBlock>> {
        let mut current = self.head(kind);
        let mut remaining = self.stores.relations.tail() / RELATION_BLOCK_SIZE as u32;
        while current.is_some() {
            if remaining == 0 {
                return Err(StoreError::Corruption(format!(
                    "adjacency list of node {} does not terminate",
                    self.addr
                )));
            }
            remaining -= 1;
            let rel = RelationBlock::load(&self.stores, current)?;
            if rel.source.node == self.addr {
                if rel.destination.node == other {
                    return Ok(Some(rel));
                }
                current = rel.source.next(kind);
            } else if !self.stores.cfg.directed && rel.destination.node == self.addr {
                if rel.source.node == other {
                    return Ok(Some(rel));
                }
                current = rel.destination.next(kind);
            } else {
                return Err(rel.corrupt_for(self.addr));
            }
        }
        Ok(None)
    }

    /// Lazy traversal of the local adjacency list, yielding the opposite
    /// endpoint of each relation. Restartable: each call re-walks from the
    /// current head.
    pub fn neighbors(&self) -> Neighbors {
        Neighbors::new(&self.stores, self.addr, self.local_head, ListKind::Local)
    }

    /// [`Self::neighbors`] over the central adjacency list.
    pub fn central_neighbors(&self) -> Neighbors {
        Neighbors::new(&self.stores, self.addr, self.central_head, ListKind::Central)
    }

    /// Appends a property to this node's chain, installing the chain head on
    /// first use.
    pub fn add_property(&mut self, name: &str, value: &str) -> Result<()> {
        let _guard = self.stores.structural.lock();
        if self.prop_head.is_none() {
            let head =
                property::create(&self.stores.props, self.stores.prop_layout(), name, value)?;
            self.stores
                .nodes
                .write_field(self.addr, OFF_PROP_HEAD, &head.0.to_le_bytes())?;
            self.prop_head = head;
        } else {
            property::append(
                &self.stores.props,
                self.stores.prop_layout(),
                self.prop_head,
                name,
                value,
            )?;
        }
        Ok(())
    }

    /// All property entries, front to back, duplicates preserved.
    ///
    /// Later entries with the same name do not overwrite earlier ones;
    /// first-write-wins or last-write-wins is the caller's policy.
    pub fn properties(&self) -> Result<Vec<PropertyEntry>> {
        property::read_all(&self.stores.props, self.stores.prop_layout(), self.prop_head)
    }
}

/// Iterator over the nodes adjacent to one node on one list.
///
/// Yields `Err` once and fuses if the walk encounters a relation that does
/// not reference the traversed node as source or destination.
pub struct Neighbors {
    stores: Arc<Stores>,
    node: BlockAddr,
    kind: ListKind,
    current: BlockAddr,
    remaining: u32,
    done: bool,
}

impl Neighbors {
    fn new(stores: &Arc<Stores>, node: BlockAddr, head: BlockAddr, kind: ListKind) -> Self {
        Self {
            stores: Arc::clone(stores),
            node,
            kind,
            current: head,
            remaining: stores.relations.tail() / RELATION_BLOCK_SIZE as u32,
            done: false,
        }
    }

    fn step(&mut self) -> Result<Option<NodeBlock>> {
        if self.current.is_none() {
            return Ok(None);
        }
        if self.remaining == 0 {
            return Err(StoreError::Corruption(format!(
                "adjacency list of node {} does not terminate",
                self.node
            )));
        }
        self.remaining -= 1;
        let rel = RelationBlock::load(&self.stores, self.current)?;
        let opposite = if rel.source.node == self.node {
            self.current = rel.source.next(self.kind);
            rel.destination.node
        } else if rel.destination.node == self.node {
            self.current = rel.destination.next(self.kind);
            rel.source.node
        } else {
            return Err(rel.corrupt_for(self.node));
        };
        NodeBlock::load(&self.stores, opposite).map(Some)
    }
}

impl Iterator for Neighbors {
    type Item = Result<NodeBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
