//! JSON ingestion boundary.
//!
//! Adapts the textual node/edge documents produced by the partitioner onto
//! the [`NodeManager`] API. A batch never aborts on a single bad record:
//! malformed or partially-specified documents are logged and skipped, the
//! store is left unchanged for that record, and processing continues.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::storage::{NodeManager, RelationBlock};
use crate::types::ListKind;

#[derive(Deserialize)]
struct VertexDoc {
    id: String,
}

#[derive(Deserialize)]
struct EdgeDoc {
    source: VertexDoc,
    destination: VertexDoc,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct NodeDoc {
    id: String,
}

fn parse<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T> {
    serde_json::from_str(line).map_err(|err| StoreError::MalformedInput(err.to_string()))
}

/// JSON property values are flattened to strings; non-string scalars keep
/// their JSON rendering.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Outcome of one batch ingestion run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    /// Documents applied to the store.
    pub applied: usize,
    /// Documents skipped after a parse or store error.
    pub skipped: usize,
}

/// Drives a [`NodeManager`] from JSON documents.
pub struct Ingestor<'a> {
    manager: &'a NodeManager,
}

impl<'a> Ingestor<'a> {
    /// Wraps a manager.
    pub fn new(manager: &'a NodeManager) -> Self {
        Self { manager }
    }

    /// Applies one node document of the shape `{"id": "..."}`.
    pub fn add_node_from_json(&self, line: &str) -> Result<()> {
        let doc: NodeDoc = parse(line)?;
        self.manager.add_node(&doc.id)?;
        Ok(())
    }

    /// Applies one edge document of the shape
    /// `{"source": {"id": ...}, "destination": {"id": ...},
    /// "properties": {...}}` as a partition-local edge; properties land on
    /// the relation's own chain.
    pub fn add_edge_from_json(&self, line: &str) -> Result<RelationBlock> {
        let doc: EdgeDoc = parse(line)?;
        let mut rel = self.manager.add_edge(&doc.source.id, &doc.destination.id)?;
        for (name, value) in &doc.properties {
            rel.add_property(name, &value_text(value))?;
        }
        Ok(rel)
    }

    /// As [`Self::add_edge_from_json`], but the edge crosses partitions:
    /// it is spliced into the central adjacency lists and its properties
    /// land on the central chain.
    pub fn add_central_edge_from_json(&self, line: &str) -> Result<RelationBlock> {
        let doc: EdgeDoc = parse(line)?;
        let mut rel = self
            .manager
            .add_central_edge(&doc.source.id, &doc.destination.id)?;
        for (name, value) in &doc.properties {
            rel.add_central_property(name, &value_text(value))?;
        }
        Ok(rel)
    }

    /// Applies a stream of node documents, skipping bad lines.
    pub fn ingest_nodes<I, S>(&self, lines: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_batch(lines, |line| self.add_node_from_json(line))
    }

    /// Applies a stream of edge documents on the given list, skipping bad
    /// lines.
    pub fn ingest_edges<I, S>(&self, lines: I, kind: ListKind) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_batch(lines, |line| {
            match kind {
                ListKind::Local => self.add_edge_from_json(line)?,
                ListKind::Central => self.add_central_edge_from_json(line)?,
            };
            Ok(())
        })
    }

    fn run_batch<I, S, F>(&self, lines: I, mut apply: F) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> Result<()>,
    {
        let mut report = BatchReport::default();
        for line in lines {
            let line = line.as_ref();
            match apply(line) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!(%err, line, "skipping record");
                    report.skipped += 1;
                }
            }
        }
        debug!(applied = report.applied, skipped = report.skipped, "batch complete");
        report
    }
}
