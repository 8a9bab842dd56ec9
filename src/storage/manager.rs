//! Record allocation, indexing, and linking for one partition.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::config::{OpenMode, StoreConfig};
use crate::error::{Result, StoreError};
use crate::storage::file::RecordFile;
use crate::storage::node::{self, NodeBlock, RawNode, SplicePolicy, NODE_HEADER_SIZE};
use crate::storage::property::PropLayout;
use crate::storage::relation::{RelationBlock, RELATION_BLOCK_SIZE};
use crate::types::{BlockAddr, ListKind, NodeId};

/// The backing files shared by every handle of one partition store.
pub(crate) struct Stores {
    pub(crate) cfg: StoreConfig,
    pub(crate) nodes: RecordFile,
    pub(crate) relations: RecordFile,
    pub(crate) props: RecordFile,
    pub(crate) central_props: RecordFile,
    /// Serializes multi-record structural mutations: adjacency splices and
    /// property-chain head installs. One domain per partition store.
    pub(crate) structural: Mutex<()>,
}

impl Stores {
    pub(crate) fn prop_layout(&self) -> PropLayout {
        PropLayout {
            name_capacity: self.cfg.prop_name_capacity,
            value_capacity: self.cfg.prop_value_capacity,
        }
    }
}

struct ManagerInner {
    index: FxHashMap<String, BlockAddr>,
    next_node_id: NodeId,
}

/// Single authority for allocating, locating, and linking node and relation
/// records for one partition.
///
/// Owns the node store, the relation store, and the two property-chain
/// stores (local and central), plus the in-memory index from external node
/// identifier to block address.
pub struct NodeManager {
    stores: Arc<Stores>,
    inner: Mutex<ManagerInner>,
}

impl fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeManager")
            .field("graph", &self.stores.cfg.graph_id)
            .field("partition", &self.stores.cfg.partition_id)
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl NodeManager {
    /// Opens the partition store described by `cfg`.
    ///
    /// [`OpenMode::Create`] truncates the backing files; [`OpenMode::Reopen`]
    /// keeps them and rebuilds the id index by scanning the node store.
    pub fn open(cfg: StoreConfig) -> Result<Self> {
        cfg.validate()?;
        std::fs::create_dir_all(&cfg.dir)?;
        let node_block = NODE_HEADER_SIZE + cfg.label_capacity;
        let prop_block = PropLayout {
            name_capacity: cfg.prop_name_capacity,
            value_capacity: cfg.prop_value_capacity,
        }
        .entry_size();
        let mode = cfg.open_mode;
        let stores = Arc::new(Stores {
            nodes: RecordFile::open(cfg.file_path("nodes.db"), node_block, mode, false)?,
            relations: RecordFile::open(
                cfg.file_path("relations.db"),
                RELATION_BLOCK_SIZE,
                mode,
                true,
            )?,
            props: RecordFile::open(cfg.file_path("props.db"), prop_block, mode, true)?,
            central_props: RecordFile::open(
                cfg.file_path("central_props.db"),
                prop_block,
                mode,
                true,
            )?,
            structural: Mutex::new(()),
            cfg,
        });
        let inner = match mode {
            OpenMode::Create => ManagerInner {
                index: FxHashMap::default(),
                next_node_id: 0,
            },
            OpenMode::Reopen => rebuild_index(&stores)?,
        };
        info!(
            graph = stores.cfg.graph_id,
            partition = stores.cfg.partition_id,
            nodes = inner.index.len(),
            "opened partition store"
        );
        Ok(Self {
            stores,
            inner: Mutex::new(inner),
        })
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.stores.cfg
    }

    /// Number of indexed nodes.
    pub fn node_count(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Resolves or creates the node for `id`. Idempotent: a second call with
    /// the same external id returns a handle to the same record.
    pub fn add_node(&self, id: &str) -> Result<NodeBlock> {
        if id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "external node id must be non-empty".into(),
            ));
        }
        let mut inner = self.inner.lock();
        if let Some(&addr) = inner.index.get(id) {
            return NodeBlock::load(&self.stores, addr);
        }

        let inline = id.len() <= self.stores.cfg.label_capacity;
        if !inline && id.len() > self.stores.cfg.prop_value_capacity {
            return Err(StoreError::InvalidArgument(format!(
                "external node id of {} bytes exceeds the escalated label capacity {}",
                id.len(),
                self.stores.cfg.prop_value_capacity
            )));
        }

        let node_id = inner.next_node_id;
        let raw = RawNode {
            active: true,
            node_id,
            local_head: BlockAddr::NONE,
            central_head: BlockAddr::NONE,
            central_partition: 0,
            prop_head: BlockAddr::NONE,
            label: if inline { id.to_owned() } else { String::new() },
        };
        let bytes = node::encode(&raw, self.stores.cfg.label_capacity)?;
        let addr = self.stores.nodes.alloc()?;
        self.stores.nodes.write_block(addr, &bytes)?;

        let mut node = NodeBlock::from_raw(&self.stores, addr, raw, id.to_owned());
        if !inline {
            // Escalated id: the record is on disk with an empty label, so
            // the property must land before the node is published.
            node.add_property("label", id)?;
        }

        inner.next_node_id += 1;
        inner.index.insert(id.to_owned(), addr);
        debug!(id, node_id, addr = %addr, inline, "created node");
        Ok(node)
    }

    /// Index lookup by external id. Unknown ids are `None`, not an error.
    pub fn find(&self, id: &str) -> Result<Option<NodeBlock>> {
        let addr = { self.inner.lock().index.get(id).copied() };
        match addr {
            Some(addr) => NodeBlock::load(&self.stores, addr).map(Some),
            None => Ok(None),
        }
    }

    /// Creates a partition-local relation from `source_id` to
    /// `destination_id`, splicing it into the head of both endpoints' local
    /// adjacency lists. Endpoint nodes are created as needed.
    pub fn add_edge(&self, source_id: &str, destination_id: &str) -> Result<RelationBlock> {
        self.add_edge_impl(source_id, destination_id, ListKind::Local, SplicePolicy::Head)
    }

    /// [`Self::add_edge`] with an explicit splice policy, for callers that
    /// need traversal to preserve insertion order.
    pub fn add_edge_with(
        &self,
        source_id: &str,
        destination_id: &str,
        policy: SplicePolicy,
    ) -> Result<RelationBlock> {
        self.add_edge_impl(source_id, destination_id, ListKind::Local, policy)
    }

    /// Creates a cross-partition relation, spliced into both endpoints'
    /// central adjacency lists. Subsequent property writes for this copy go
    /// through [`RelationBlock::add_central_property`].
    pub fn add_central_edge(&self, source_id: &str, destination_id: &str) -> Result<RelationBlock> {
        self.add_edge_impl(
            source_id,
            destination_id,
            ListKind::Central,
            SplicePolicy::Head,
        )
    }

    /// [`Self::add_central_edge`] with an explicit splice policy.
    pub fn add_central_edge_with(
        &self,
        source_id: &str,
        destination_id: &str,
        policy: SplicePolicy,
    ) -> Result<RelationBlock> {
        self.add_edge_impl(source_id, destination_id, ListKind::Central, policy)
    }

    fn add_edge_impl(
        &self,
        source_id: &str,
        destination_id: &str,
        kind: ListKind,
        policy: SplicePolicy,
    ) -> Result<RelationBlock> {
        let src_addr = self.add_node(source_id)?.addr;
        let dst_addr = self.add_node(destination_id)?.addr;

        let _guard = self.stores.structural.lock();
        // Reload both mirrors under the lock so the heads are current, and
        // validate every record the splice will read before any mutation:
        // head insertion touches only the head records, tail append walks
        // the full list. After this point the splice can only fail on I/O,
        // keeping the two-sided update all-or-nothing with respect to
        // structural faults.
        let mut src = NodeBlock::load(&self.stores, src_addr)?;
        let mut dst = NodeBlock::load(&self.stores, dst_addr)?;
        match policy {
            SplicePolicy::Head => {
                self.validate_head(&src, kind)?;
                self.validate_head(&dst, kind)?;
            }
            SplicePolicy::Tail => {
                src.validate_list(kind)?;
                dst.validate_list(kind)?;
            }
        }

        let mut rel = RelationBlock::create(&self.stores, src.addr, dst.addr)?;
        src.splice(kind, &mut rel, policy)?;
        dst.splice(kind, &mut rel, policy)?;
        debug!(
            source = source_id,
            destination = destination_id,
            relation = %rel.addr,
            ?kind,
            "created relation"
        );
        Ok(rel)
    }

    fn validate_head(&self, node: &NodeBlock, kind: ListKind) -> Result<()> {
        let head = node.head(kind);
        if head.is_none() {
            return Ok(());
        }
        let rel = RelationBlock::load(&self.stores, head)?;
        if rel.role_of(node.addr).is_none() {
            warn!(node = %node.addr, relation = %head, "recorded head does not reference its node");
            return Err(rel.corrupt_for(node.addr));
        }
        Ok(())
    }

    /// Forces all four backing files to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.stores.nodes.sync()?;
        self.stores.relations.sync()?;
        self.stores.props.sync()?;
        self.stores.central_props.sync()
    }
}

fn rebuild_index(stores: &Arc<Stores>) -> Result<ManagerInner> {
    let mut index = FxHashMap::default();
    let mut next_node_id: NodeId = 0;
    let block = stores.nodes.block_size();
    let mut addr = BlockAddr(0);
    while addr.0 < stores.nodes.tail() {
        let node = NodeBlock::load(stores, addr)?;
        next_node_id = next_node_id.max(node.node_id + 1);
        if node.active {
            if let Some(previous) = index.insert(node.id.clone(), addr) {
                return Err(StoreError::Corruption(format!(
                    "external id {:?} appears at both {previous} and {addr}",
                    node.id
                )));
            }
        }
        addr = BlockAddr(addr.0 + block);
    }
    debug!(nodes = index.len(), next_node_id, "rebuilt id index from node store");
    Ok(ManagerInner {
        index,
        next_node_id,
    })
}
