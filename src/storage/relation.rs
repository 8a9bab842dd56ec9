//! Relation records.
//!
//! A relation is one fixed-size block carrying two [`EndpointLink`]s, one per
//! endpoint. Each link embeds the pointers for both adjacency lists the
//! relation can participate in: the partition-local list and the central
//! (cross-partition) list. The two list memberships are maintained
//! independently; unlinking from one never touches the other.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::storage::manager::Stores;
use crate::storage::node::NodeBlock;
use crate::storage::property::{self, PropertyEntry};
use crate::types::{BlockAddr, ListKind, Role};

/// Size of one encoded [`EndpointLink`].
pub const LINK_SIZE: usize = 20;
/// Size of one relation record on disk.
pub const RELATION_BLOCK_SIZE: usize = 48;

const OFF_SOURCE: usize = 0;
const OFF_DESTINATION: usize = LINK_SIZE;
const OFF_PROP_HEAD: usize = 40;
const OFF_CENTRAL_PROP_HEAD: usize = 44;

const LINK_NODE: usize = 0;
const LINK_NEXT_LOCAL: usize = 4;
const LINK_PREV_LOCAL: usize = 8;
const LINK_NEXT_CENTRAL: usize = 12;
const LINK_PREV_CENTRAL: usize = 16;

/// One endpoint's adjacency-list membership inside a relation record.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EndpointLink {
    /// Address of the endpoint node record.
    pub node: BlockAddr,
    /// Next relation in the endpoint's local list.
    pub next_local: BlockAddr,
    /// Previous relation in the endpoint's local list.
    pub prev_local: BlockAddr,
    /// Next relation in the endpoint's central list.
    pub next_central: BlockAddr,
    /// Previous relation in the endpoint's central list.
    pub prev_central: BlockAddr,
}

impl EndpointLink {
    fn decode(buf: &[u8]) -> Self {
        let word = |off: usize| {
            BlockAddr(u32::from_le_bytes(
                buf[off..off + 4].try_into().expect("slice has exactly 4 bytes"),
            ))
        };
        Self {
            node: word(LINK_NODE),
            next_local: word(LINK_NEXT_LOCAL),
            prev_local: word(LINK_PREV_LOCAL),
            next_central: word(LINK_NEXT_CENTRAL),
            prev_central: word(LINK_PREV_CENTRAL),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[LINK_NODE..LINK_NODE + 4].copy_from_slice(&self.node.0.to_le_bytes());
        buf[LINK_NEXT_LOCAL..LINK_NEXT_LOCAL + 4].copy_from_slice(&self.next_local.0.to_le_bytes());
        buf[LINK_PREV_LOCAL..LINK_PREV_LOCAL + 4].copy_from_slice(&self.prev_local.0.to_le_bytes());
        buf[LINK_NEXT_CENTRAL..LINK_NEXT_CENTRAL + 4]
            .copy_from_slice(&self.next_central.0.to_le_bytes());
        buf[LINK_PREV_CENTRAL..LINK_PREV_CENTRAL + 4]
            .copy_from_slice(&self.prev_central.0.to_le_bytes());
    }

    /// The next relation on the given list.
    pub fn next(&self, kind: ListKind) -> BlockAddr {
        match kind {
            ListKind::Local => self.next_local,
            ListKind::Central => self.next_central,
        }
    }

    /// The previous relation on the given list.
    pub fn prev(&self, kind: ListKind) -> BlockAddr {
        match kind {
            ListKind::Local => self.prev_local,
            ListKind::Central => self.prev_central,
        }
    }

    fn set_next(&mut self, kind: ListKind, addr: BlockAddr) {
        match kind {
            ListKind::Local => self.next_local = addr,
            ListKind::Central => self.next_central = addr,
        }
    }

    fn set_prev(&mut self, kind: ListKind, addr: BlockAddr) {
        match kind {
            ListKind::Local => self.prev_local = addr,
            ListKind::Central => self.prev_central = addr,
        }
    }
}

fn next_field_offset(role: Role, kind: ListKind) -> usize {
    role_base(role)
        + match kind {
            ListKind::Local => LINK_NEXT_LOCAL,
            ListKind::Central => LINK_NEXT_CENTRAL,
        }
}

fn prev_field_offset(role: Role, kind: ListKind) -> usize {
    role_base(role)
        + match kind {
            ListKind::Local => LINK_PREV_LOCAL,
            ListKind::Central => LINK_PREV_CENTRAL,
        }
}

fn role_base(role: Role) -> usize {
    match role {
        Role::Source => OFF_SOURCE,
        Role::Destination => OFF_DESTINATION,
    }
}

/// An in-memory mirror of one relation record, identified by its address in
/// the relation store.
pub struct RelationBlock {
    stores: Arc<Stores>,
    /// Address of this record; doubles as its identity.
    pub addr: BlockAddr,
    /// Source endpoint link.
    pub source: EndpointLink,
    /// Destination endpoint link.
    pub destination: EndpointLink,
    /// Head of the relation's own (local) property chain.
    pub prop_head: BlockAddr,
    /// Head of the relation's central property chain. Central copies of a
    /// cross-partition edge carry independent chains per partition.
    pub central_prop_head: BlockAddr,
}

impl fmt::Debug for RelationBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationBlock")
            .field("addr", &self.addr)
            .field("source", &self.source.node)
            .field("destination", &self.destination.node)
            .finish_non_exhaustive()
    }
}

impl RelationBlock {
    /// Allocates and persists a fresh relation between two node addresses,
    /// with every list pointer at the terminator.
    pub(crate) fn create(stores: &Arc<Stores>, src: BlockAddr, dst: BlockAddr) -> Result<Self> {
        let rel = Self {
            stores: Arc::clone(stores),
            addr: stores.relations.alloc()?,
            source: EndpointLink {
                node: src,
                ..EndpointLink::default()
            },
            destination: EndpointLink {
                node: dst,
                ..EndpointLink::default()
            },
            prop_head: BlockAddr::NONE,
            central_prop_head: BlockAddr::NONE,
        };
        let mut buf = [0u8; RELATION_BLOCK_SIZE];
        rel.source.encode(&mut buf[OFF_SOURCE..OFF_DESTINATION]);
        rel.destination.encode(&mut buf[OFF_DESTINATION..OFF_PROP_HEAD]);
        stores.relations.write_block(rel.addr, &buf)?;
        Ok(rel)
    }

    /// Reads the relation record at `addr`.
    pub(crate) fn load(stores: &Arc<Stores>, addr: BlockAddr) -> Result<Self> {
        let buf = stores.relations.read_block(addr)?;
        let word = |off: usize| {
            BlockAddr(u32::from_le_bytes(
                buf[off..off + 4].try_into().expect("slice has exactly 4 bytes"),
            ))
        };
        Ok(Self {
            stores: Arc::clone(stores),
            addr,
            source: EndpointLink::decode(&buf[OFF_SOURCE..OFF_DESTINATION]),
            destination: EndpointLink::decode(&buf[OFF_DESTINATION..OFF_PROP_HEAD]),
            prop_head: word(OFF_PROP_HEAD),
            central_prop_head: word(OFF_CENTRAL_PROP_HEAD),
        })
    }

    /// The role `node` plays in this relation, if any.
    ///
    /// A self-loop reports [`Role::Source`]; the source link is checked
    /// first.
    pub fn role_of(&self, node: BlockAddr) -> Option<Role> {
        if self.source.node == node {
            Some(Role::Source)
        } else if self.destination.node == node {
            Some(Role::Destination)
        } else {
            None
        }
    }

    /// The endpoint link for the given role.
    pub fn endpoint(&self, role: Role) -> &EndpointLink {
        match role {
            Role::Source => &self.source,
            Role::Destination => &self.destination,
        }
    }

    fn endpoint_mut(&mut self, role: Role) -> &mut EndpointLink {
        match role {
            Role::Source => &mut self.source,
            Role::Destination => &mut self.destination,
        }
    }

    /// Address of the next relation for the given role and list.
    pub fn next_addr(&self, role: Role, kind: ListKind) -> BlockAddr {
        self.endpoint(role).next(kind)
    }

    /// Resolves the next relation for the given role and list, or `None` at
    /// the terminator.
    pub fn next(&self, role: Role, kind: ListKind) -> Result<Option<RelationBlock>> {
        let addr = self.next_addr(role, kind);
        if addr.is_none() {
            return Ok(None);
        }
        Self::load(&self.stores, addr).map(Some)
    }

    /// Persists a single `next` pointer at its known offset and updates the
    /// in-memory mirror. Write-through: the field is on disk when this
    /// returns.
    pub(crate) fn set_next(&mut self, role: Role, kind: ListKind, addr: BlockAddr) -> Result<()> {
        self.stores
            .relations
            .write_field(self.addr, next_field_offset(role, kind), &addr.0.to_le_bytes())?;
        self.endpoint_mut(role).set_next(kind, addr);
        Ok(())
    }

    /// Persists a single `prev` pointer, as [`Self::set_next`].
    pub(crate) fn set_prev(&mut self, role: Role, kind: ListKind, addr: BlockAddr) -> Result<()> {
        self.stores
            .relations
            .write_field(self.addr, prev_field_offset(role, kind), &addr.0.to_le_bytes())?;
        self.endpoint_mut(role).set_prev(kind, addr);
        Ok(())
    }

    /// Appends a property to the relation's own chain.
    pub fn add_property(&mut self, name: &str, value: &str) -> Result<()> {
        let _guard = self.stores.structural.lock();
        if self.prop_head.is_none() {
            let head = property::create(&self.stores.props, self.stores.prop_layout(), name, value)?;
            self.stores
                .relations
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

    /// Appends a property to the relation's central chain.
    ///
    /// Central chains live in their own store; the local chain of the same
    /// relation is never touched.
    pub fn add_central_property(&mut self, name: &str, value: &str) -> Result<()> {
        let _guard = self.stores.structural.lock();
        if self.central_prop_head.is_none() {
            let head = property::create(
                &self.stores.central_props,
                self.stores.prop_layout(),
                name,
                value,
            )?;
            self.stores.relations.write_field(
                self.addr,
                OFF_CENTRAL_PROP_HEAD,
                &head.0.to_le_bytes(),
            )?;
            self.central_prop_head = head;
        } else {
            property::append(
                &self.stores.central_props,
                self.stores.prop_layout(),
                self.central_prop_head,
                name,
                value,
            )?;
        }
        Ok(())
    }

    /// All entries of the relation's own chain, front to back.
    pub fn properties(&self) -> Result<Vec<PropertyEntry>> {
        property::read_all(&self.stores.props, self.stores.prop_layout(), self.prop_head)
    }

    /// All entries of the relation's central chain, front to back.
    pub fn central_properties(&self) -> Result<Vec<PropertyEntry>> {
        property::read_all(
            &self.stores.central_props,
            self.stores.prop_layout(),
            self.central_prop_head,
        )
    }

    /// Resolves the source endpoint's node record.
    pub fn source_node(&self) -> Result<NodeBlock> {
        NodeBlock::load(&self.stores, self.source.node)
    }

    /// Resolves the destination endpoint's node record.
    pub fn destination_node(&self) -> Result<NodeBlock> {
        NodeBlock::load(&self.stores, self.destination.node)
    }

    pub(crate) fn corrupt_for(&self, node: BlockAddr) -> StoreError {
        StoreError::CorruptAdjacency {
            node,
            relation: self.addr,
        }
    }
}
