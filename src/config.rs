//! Store configuration.

use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::types::{GraphId, PartitionId};

/// How to open the backing files.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OpenMode {
    /// Truncate any existing files and start a fresh partition store.
    Create,
    /// Reopen existing files; the id index is rebuilt from the node store.
    Reopen,
}

/// Configuration supplied when opening a [`crate::storage::NodeManager`].
///
/// One instance describes one partition of one graph. The capacities are
/// baked into the on-disk record sizes, so a store must be reopened with the
/// same capacities it was created with.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Graph this partition belongs to.
    pub graph_id: GraphId,
    /// Partition id within the graph.
    pub partition_id: PartitionId,
    /// Directory holding the partition's store files.
    pub dir: PathBuf,
    /// Fresh store vs. reopen-existing.
    pub open_mode: OpenMode,
    /// Whether destination-side traversal is eligible when searching
    /// relations. Graph-level setting, not per edge.
    pub directed: bool,
    /// Inline label capacity in the node record, in bytes. Longer external
    /// ids are escalated to a `label` property.
    pub label_capacity: usize,
    /// Property name capacity, in bytes.
    pub prop_name_capacity: usize,
    /// Property value capacity, in bytes.
    pub prop_value_capacity: usize,
}

impl StoreConfig {
    /// Creates a configuration with default capacities for one partition.
    pub fn new(graph_id: GraphId, partition_id: PartitionId, dir: impl Into<PathBuf>) -> Self {
        Self {
            graph_id,
            partition_id,
            dir: dir.into(),
            open_mode: OpenMode::Create,
            directed: false,
            label_capacity: 43,
            prop_name_capacity: 12,
            prop_value_capacity: 180,
        }
    }

    /// Sets the open mode.
    pub fn open_mode(mut self, mode: OpenMode) -> Self {
        self.open_mode = mode;
        self
    }

    /// Sets whether the graph is directed.
    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Sets the inline label capacity.
    pub fn label_capacity(mut self, bytes: usize) -> Self {
        self.label_capacity = bytes;
        self
    }

    /// Sets the property name capacity.
    pub fn prop_name_capacity(mut self, bytes: usize) -> Self {
        self.prop_name_capacity = bytes;
        self
    }

    /// Sets the property value capacity.
    pub fn prop_value_capacity(mut self, bytes: usize) -> Self {
        self.prop_value_capacity = bytes;
        self
    }

    /// Validates the capacity constraints.
    ///
    /// An escalated label is stored as a property value, so the label
    /// capacity must not exceed the value capacity.
    pub fn validate(&self) -> Result<()> {
        if self.label_capacity == 0 {
            return Err(StoreError::InvalidArgument(
                "label capacity must be non-zero".into(),
            ));
        }
        if self.prop_name_capacity == 0 || self.prop_value_capacity == 0 {
            return Err(StoreError::InvalidArgument(
                "property capacities must be non-zero".into(),
            ));
        }
        if self.label_capacity > self.prop_value_capacity {
            return Err(StoreError::InvalidArgument(format!(
                "label capacity {} exceeds property value capacity {}",
                self.label_capacity, self.prop_value_capacity
            )));
        }
        Ok(())
    }

    pub(crate) fn file_path(&self, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("g{}_p{}.{suffix}", self.graph_id, self.partition_id))
    }
}
