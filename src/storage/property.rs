//! Property chains.
//!
//! A chain is a singly-linked sequence of fixed-size `{name, value, next}`
//! entries in a dedicated chain store; the owning node or relation record
//! holds only the head address. Entries are never updated in place and never
//! deleted: "overwrite" is expressed by appending another entry with the same
//! name, and readers apply their own duplicate policy.

use crate::error::{Result, StoreError};
use crate::storage::file::RecordFile;
use crate::types::BlockAddr;

/// One decoded property entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PropertyEntry {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: String,
}

/// Fixed entry geometry for one chain store.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PropLayout {
    pub name_capacity: usize,
    pub value_capacity: usize,
}

impl PropLayout {
    pub(crate) fn entry_size(self) -> usize {
        self.name_capacity + self.value_capacity + 4
    }

    fn next_offset(self) -> usize {
        self.name_capacity + self.value_capacity
    }
}

fn encode_fixed(buf: &mut [u8], text: &str, what: &str, capacity: usize) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > capacity {
        return Err(StoreError::InvalidArgument(format!(
            "property {what} of {} bytes exceeds capacity {capacity}",
            bytes.len()
        )));
    }
    if bytes.contains(&0) {
        return Err(StoreError::InvalidArgument(format!(
            "property {what} contains a NUL byte"
        )));
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn decode_fixed(buf: &[u8], what: &str, addr: BlockAddr) -> Result<String> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end])
        .map(str::to_owned)
        .map_err(|_| StoreError::Corruption(format!("property {what} at {addr} is not UTF-8")))
}

fn encode_entry(layout: PropLayout, name: &str, value: &str, next: BlockAddr) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; layout.entry_size()];
    encode_fixed(&mut buf[..layout.name_capacity], name, "name", layout.name_capacity)?;
    encode_fixed(
        &mut buf[layout.name_capacity..layout.next_offset()],
        value,
        "value",
        layout.value_capacity,
    )?;
    buf[layout.next_offset()..].copy_from_slice(&next.0.to_le_bytes());
    Ok(buf)
}

fn decode_entry(
    layout: PropLayout,
    addr: BlockAddr,
    block: &[u8],
) -> Result<(PropertyEntry, BlockAddr)> {
    let name = decode_fixed(&block[..layout.name_capacity], "name", addr)?;
    let value = decode_fixed(
        &block[layout.name_capacity..layout.next_offset()],
        "value",
        addr,
    )?;
    let next = BlockAddr(u32::from_le_bytes(
        block[layout.next_offset()..layout.next_offset() + 4]
            .try_into()
            .expect("slice has exactly 4 bytes"),
    ));
    Ok((PropertyEntry { name, value }, next))
}

/// Allocates a one-entry chain and returns its head address.
pub(crate) fn create(
    file: &RecordFile,
    layout: PropLayout,
    name: &str,
    value: &str,
) -> Result<BlockAddr> {
    let bytes = encode_entry(layout, name, value, BlockAddr::NONE)?;
    let addr = file.alloc()?;
    file.write_block(addr, &bytes)?;
    Ok(addr)
}

/// Appends an entry to an existing chain.
///
/// Walks from `head` to the entry whose `next` is the terminator and links a
/// new entry there. The head address never changes: insertion never
/// reallocates or moves the head. O(length) per append.
pub(crate) fn append(
    file: &RecordFile,
    layout: PropLayout,
    head: BlockAddr,
    name: &str,
    value: &str,
) -> Result<()> {
    // Encode first so capacity violations leave the chain untouched.
    let bytes = encode_entry(layout, name, value, BlockAddr::NONE)?;
    let tail = find_tail(file, layout, head)?;
    let addr = file.alloc()?;
    file.write_block(addr, &bytes)?;
    file.write_field(tail, layout.next_offset(), &addr.0.to_le_bytes())?;
    Ok(())
}

fn find_tail(file: &RecordFile, layout: PropLayout, head: BlockAddr) -> Result<BlockAddr> {
    if head.is_none() {
        return Err(StoreError::Corruption(
            "property chain append against an empty head".into(),
        ));
    }
    let mut current = head;
    let mut remaining = file.tail() / file.block_size();
    loop {
        let block = file.read_block(current)?;
        let (_, next) = decode_entry(layout, current, &block)?;
        if next.is_none() {
            return Ok(current);
        }
        // A chain can never be longer than the store has blocks; running out
        // of budget means a pointer cycle.
        if remaining == 0 {
            return Err(StoreError::Corruption(format!(
                "property chain starting at {head} does not terminate"
            )));
        }
        remaining -= 1;
        current = next;
    }
}

/// Reads the whole chain front to back, preserving duplicates and order.
pub(crate) fn read_all(
    file: &RecordFile,
    layout: PropLayout,
    head: BlockAddr,
) -> Result<Vec<PropertyEntry>> {
    let mut entries = Vec::new();
    let mut current = head;
    let mut remaining = file.tail() / file.block_size();
    while current.is_some() {
        if remaining == 0 {
            return Err(StoreError::Corruption(format!(
                "property chain starting at {head} does not terminate"
            )));
        }
        remaining -= 1;
        let block = file.read_block(current)?;
        let (entry, next) = decode_entry(layout, current, &block)?;
        entries.push(entry);
        current = next;
    }
    Ok(entries)
}

/// Returns the value of the first entry named `name`, if any.
pub(crate) fn find(
    file: &RecordFile,
    layout: PropLayout,
    head: BlockAddr,
    name: &str,
) -> Result<Option<String>> {
    let mut current = head;
    let mut remaining = file.tail() / file.block_size();
    while current.is_some() {
        if remaining == 0 {
            return Err(StoreError::Corruption(format!(
                "property chain starting at {head} does not terminate"
            )));
        }
        remaining -= 1;
        let block = file.read_block(current)?;
        let (entry, next) = decode_entry(layout, current, &block)?;
        if entry.name == name {
            return Ok(Some(entry.value));
        }
        current = next;
    }
    Ok(None)
}
