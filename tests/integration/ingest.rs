#![allow(missing_docs)]

use penumbra::ingest::Ingestor;
use penumbra::{ListKind, NodeManager, Result, StoreConfig, StoreError};
use tempfile::tempdir;

fn fresh(dir: &std::path::Path) -> StoreConfig {
    StoreConfig::new(1, 0, dir)
}

#[test]
fn edge_document_creates_endpoints_and_properties() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let ingestor = Ingestor::new(&nm);

    let rel = ingestor.add_edge_from_json(
        r#"{"source": {"id": "a"}, "destination": {"id": "b"}, "properties": {"weight": "2"}}"#,
    )?;
    let a = nm.find("a")?.expect("a created");
    let b = nm.find("b")?.expect("b created");
    let found = a.search_relation(&b)?.expect("relation linked");
    assert_eq!(found.addr, rel.addr);
    let props = found.properties()?;
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].name, "weight");
    assert_eq!(props[0].value, "2");
    Ok(())
}

#[test]
fn non_string_property_values_keep_their_json_rendering() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let ingestor = Ingestor::new(&nm);

    let rel = ingestor.add_edge_from_json(
        r#"{"source": {"id": "a"}, "destination": {"id": "b"}, "properties": {"weight": 7}}"#,
    )?;
    let props = rel.properties()?;
    assert_eq!(props[0].value, "7");
    Ok(())
}

#[test]
fn central_edge_document_uses_the_central_list_and_chain() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let ingestor = Ingestor::new(&nm);

    let rel = ingestor.add_central_edge_from_json(
        r#"{"source": {"id": "a"}, "destination": {"id": "far"}, "properties": {"weight": "3"}}"#,
    )?;
    let a = nm.find("a")?.expect("a created");
    assert!(a.local_head.is_none());
    assert_eq!(a.central_head, rel.addr);
    assert!(rel.properties()?.is_empty());
    assert_eq!(rel.central_properties()?.len(), 1);
    Ok(())
}

#[test]
fn node_document_is_applied() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let ingestor = Ingestor::new(&nm);

    ingestor.add_node_from_json(r#"{"id": "solo"}"#)?;
    assert!(nm.find("solo")?.is_some());
    Ok(())
}

#[test]
fn malformed_document_is_a_malformed_input_error() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let ingestor = Ingestor::new(&nm);

    let err = ingestor.add_edge_from_json("{not json").unwrap_err();
    assert!(matches!(err, StoreError::MalformedInput(_)));
    // Nothing was applied.
    assert_eq!(nm.node_count(), 0);
    Ok(())
}

#[test]
fn batch_skips_bad_lines_and_continues() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let ingestor = Ingestor::new(&nm);

    let lines = [
        r#"{"source": {"id": "a"}, "destination": {"id": "b"}}"#,
        "{broken",
        r#"{"source": {"id": "a"}}"#,
        r#"{"source": {"id": "b"}, "destination": {"id": "c"}}"#,
    ];
    let report = ingestor.ingest_edges(lines, ListKind::Local);
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 2);

    let a = nm.find("a")?.expect("a created");
    let c = nm.find("c")?.expect("c created");
    assert!(a.search_relation(&nm.find("b")?.expect("b created"))?.is_some());
    assert!(nm.find("b")?.expect("b").search_relation(&c)?.is_some());
    Ok(())
}
