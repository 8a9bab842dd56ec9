#![allow(missing_docs)]

use penumbra::{NodeManager, OpenMode, Result, StoreConfig, StoreError};
use tempfile::tempdir;

fn fresh(dir: &std::path::Path) -> StoreConfig {
    StoreConfig::new(1, 0, dir)
}

#[test]
fn append_preserves_all_prior_entries_in_order() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let mut node = nm.add_node("n")?;
    node.add_property("first", "x")?;
    node.add_property("second", "y")?;
    node.add_property("third", "z")?;

    let props = node.properties()?;
    let names: Vec<&str> = props.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["first", "second", "third"]);
    Ok(())
}

#[test]
fn duplicate_names_are_all_returned() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let mut node = nm.add_node("n")?;
    node.add_property("weight", "1")?;
    node.add_property("weight", "2")?;

    let props = node.properties()?;
    assert_eq!(props.len(), 2);
    assert_eq!((props[0].name.as_str(), props[0].value.as_str()), ("weight", "1"));
    assert_eq!((props[1].name.as_str(), props[1].value.as_str()), ("weight", "2"));
    Ok(())
}

#[test]
fn property_head_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    {
        let nm = NodeManager::open(fresh(dir.path()))?;
        let mut node = nm.add_node("n")?;
        node.add_property("color", "red")?;
        nm.sync()?;
    }
    let nm = NodeManager::open(fresh(dir.path()).open_mode(OpenMode::Reopen))?;
    let node = nm.find("n")?.expect("n survives reopen");
    let props = node.properties()?;
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].name, "color");
    assert_eq!(props[0].value, "red");
    Ok(())
}

#[test]
fn relation_local_and_central_chains_are_independent() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let mut local = nm.add_edge("a", "b")?;
    local.add_property("weight", "1")?;
    assert_eq!(local.properties()?.len(), 1);
    assert!(local.central_properties()?.is_empty());

    let mut central = nm.add_central_edge("a", "remote")?;
    central.add_central_property("weight", "9")?;
    assert!(central.properties()?.is_empty());
    let props = central.central_properties()?;
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].value, "9");
    Ok(())
}

#[test]
fn over_capacity_name_and_value_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let nm = NodeManager::open(fresh(dir.path()))?;

    let mut node = nm.add_node("n")?;
    let long_name = "k".repeat(13); // default name capacity is 12
    assert!(matches!(
        node.add_property(&long_name, "v"),
        Err(StoreError::InvalidArgument(_))
    ));
    let long_value = "v".repeat(181); // default value capacity is 180
    assert!(matches!(
        node.add_property("k", &long_value),
        Err(StoreError::InvalidArgument(_))
    ));

    // A rejected append leaves the chain untouched.
    assert!(node.properties()?.is_empty());
    Ok(())
}

#[test]
fn capacities_are_configurable() -> Result<()> {
    let dir = tempdir()?;
    let cfg = fresh(dir.path())
        .label_capacity(8)
        .prop_name_capacity(32)
        .prop_value_capacity(64);
    let nm = NodeManager::open(cfg)?;

    // Nine bytes no longer fit inline and escalate to a property.
    let node = nm.add_node("123456789")?;
    assert!(node.prop_head.is_some());
    let mut node = nm.add_node("short")?;
    node.add_property(&"n".repeat(32), &"v".repeat(64))?;
    assert_eq!(node.properties()?.len(), 1);
    Ok(())
}
