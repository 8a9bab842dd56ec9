#![allow(missing_docs)]

use penumbra::{NodeManager, OpenMode, Result, StoreConfig, StoreError};
use tempfile::tempdir;

fn fresh(dir: &std::path::Path) -> StoreConfig {
    StoreConfig::new(1, 0, dir)
}

#[test]
fn add_node_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let first = nm.add_node("alpha")?;
    let second = nm.add_node("alpha")?;
    assert_eq!(first.addr, second.addr);
    assert_eq!(first.node_id, second.node_id);
    assert_eq!(nm.node_count(), 1);
    Ok(())
}

#[test]
fn find_unknown_id_is_none_not_an_error() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    nm.add_node("present")?;
    assert!(nm.find("present")?.is_some());
    assert!(nm.find("absent")?.is_none());
    Ok(())
}

#[test]
fn empty_id_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    assert!(matches!(
        nm.add_node(""),
        Err(StoreError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
fn node_fields_roundtrip_through_the_file() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let created = nm.add_node("vertex-a")?;
    let read = nm.find("vertex-a")?.expect("node present");
    assert_eq!(read.addr, created.addr);
    assert_eq!(read.node_id, created.node_id);
    assert_eq!(read.id, "vertex-a");
    assert!(read.active);
    assert!(read.local_head.is_none());
    assert!(read.central_head.is_none());
    assert!(read.prop_head.is_none());
    Ok(())
}

#[test]
fn long_id_is_escalated_to_a_label_property() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let long_id = "n".repeat(60); // over the default 43-byte inline capacity
    let node = nm.add_node(&long_id)?;
    assert_eq!(node.id, long_id);
    assert!(node.prop_head.is_some());

    // Loading back must resolve the id from the property, never MissingLabel.
    let read = nm.find(&long_id)?.expect("node present");
    assert_eq!(read.id, long_id);
    let props = read.properties()?;
    assert!(props.iter().any(|e| e.name == "label" && e.value == long_id));
    Ok(())
}

#[test]
fn id_longer_than_escalated_capacity_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let huge = "n".repeat(500);
    assert!(matches!(
        nm.add_node(&huge),
        Err(StoreError::InvalidArgument(_))
    ));
    assert_eq!(nm.node_count(), 0);
    Ok(())
}

#[test]
fn manager_and_handles_format_for_debugging() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;
    let node = nm.add_node("n")?;
    let rel = nm.add_edge("n", "m")?;
    assert!(format!("{nm:?}").contains("NodeManager"));
    assert!(format!("{node:?}").contains(&format!("{:?}", node.addr)));
    assert!(format!("{rel:?}").contains("RelationBlock"));
    Ok(())
}

#[test]
fn reopen_rebuilds_the_index_and_sequence() -> Result<()> {
    let dir = tempdir()?;
    let long_id = "n".repeat(60);
    let (alpha_addr, alpha_node_id) = {
        let nm = NodeManager::open(fresh(dir.path()))?;
        let alpha = nm.add_node("alpha")?;
        nm.add_node("beta")?;
        nm.add_node(&long_id)?;
        nm.sync()?;
        (alpha.addr, alpha.node_id)
    };

    let nm = NodeManager::open(fresh(dir.path()).open_mode(OpenMode::Reopen))?;
    assert_eq!(nm.node_count(), 3);

    let alpha = nm.find("alpha")?.expect("alpha survives reopen");
    assert_eq!(alpha.addr, alpha_addr);
    assert_eq!(alpha.node_id, alpha_node_id);

    // Escalated labels must be recovered from the property chain.
    assert!(nm.find(&long_id)?.is_some());

    // The node id sequence continues past the reopened records.
    let gamma = nm.add_node("gamma")?;
    assert!(gamma.node_id > alpha_node_id);
    Ok(())
}

#[test]
fn reopen_rejects_a_torn_node_store() -> Result<()> {
    let dir = tempdir()?;
    {
        let nm = NodeManager::open(fresh(dir.path()))?;
        nm.add_node("alpha")?;
        nm.sync()?;
    }
    let path = dir.path().join("g1_p0.nodes.db");
    let mut bytes = std::fs::read(&path)?;
    bytes.truncate(bytes.len() - 7);
    std::fs::write(&path, bytes)?;

    let err = NodeManager::open(fresh(dir.path()).open_mode(OpenMode::Reopen)).unwrap_err();
    assert!(matches!(err, StoreError::Corruption(_)));
    Ok(())
}
