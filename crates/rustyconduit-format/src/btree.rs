//! Version 1 B-tree of raw-data chunks (node type 1).
//!
//! Each key is `chunk size (u32), filter mask (u32), offsets (u64 x rank+1)`;
//! the extra trailing offset is always zero and belongs to the element-size
//! dimension of the layout message.

use crate::bytes::{Cursor, PutLe, UNDEF_ADDR};
use crate::error::FormatError;

/// Entries per node. Readers size nodes as `2K` with K = 32 for chunk trees.
pub const NODE_CAPACITY: usize = 64;

const MAX_DEPTH: usize = 32;

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Element coordinates of the chunk's first element, one per dataset axis.
    pub offsets: Vec<u64>,
    pub stored_size: u32,
    pub filter_mask: u32,
    pub address: u64,
}

fn key_size(rank: usize) -> usize {
    8 + 8 * (rank + 1)
}

/// Encoded size of one node for a dataset of `rank` axes.
pub fn node_size(rank: usize) -> usize {
    24 + NODE_CAPACITY * (key_size(rank) + 8) + key_size(rank)
}

/// Walk the tree rooted at `addr` and return every chunk.
pub fn collect_chunks(
    data: &[u8],
    addr: u64,
    rank: usize,
    offset_size: u8,
) -> Result<Vec<ChunkRecord>, FormatError> {
    let mut out = Vec::new();
    if addr != UNDEF_ADDR {
        walk(data, addr, rank, offset_size, 0, &mut out)?;
    }
    Ok(out)
}

fn walk(
    data: &[u8],
    addr: u64,
    rank: usize,
    offset_size: u8,
    depth: usize,
    out: &mut Vec<ChunkRecord>,
) -> Result<(), FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::Invalid("chunk B-tree too deep".into()));
    }
    let mut c = Cursor::at(data, addr as usize);
    if c.bytes(4)? != b"TREE" {
        return Err(FormatError::BadSignature("TREE"));
    }
    let node_type = c.u8()?;
    if node_type != 1 {
        return Err(FormatError::Invalid(format!("B-tree node type {node_type} in chunk index")));
    }
    let level = c.u8()?;
    let entries = c.u16()? as usize;
    c.addr(offset_size)?;
    c.addr(offset_size)?;

    for _ in 0..entries {
        let stored_size = c.u32()?;
        let filter_mask = c.u32()?;
        let mut offsets = (0..=rank).map(|_| c.u64()).collect::<Result<Vec<_>, _>>()?;
        offsets.truncate(rank);
        let child = c.addr(offset_size)?;
        if level == 0 {
            out.push(ChunkRecord {
                offsets,
                stored_size,
                filter_mask,
                address: child,
            });
        } else {
            walk(data, child, rank, offset_size, depth + 1, out)?;
        }
    }
    Ok(())
}

#[derive(Clone)]
struct Key {
    size: u32,
    mask: u32,
    offsets: Vec<u64>,
}

struct Node {
    level: u8,
    keys: Vec<Key>,
    children: Vec<u64>,
}

/// Serialize a tree over `chunks` (sorted by offsets) placed at `base`.
///
/// Returns the encoded nodes and the root address; nodes are laid out level
/// by level with the root last. No chunks yields no nodes and an undefined
/// root.
pub fn build_chunk_tree(
    chunks: &[ChunkRecord],
    chunk_dims: &[u64],
    base: u64,
) -> (Vec<u8>, u64) {
    if chunks.is_empty() {
        return (Vec::new(), UNDEF_ADDR);
    }
    let rank = chunk_dims.len();
    let nsize = node_size(rank) as u64;

    let mut level: Vec<Node> = chunks
        .chunks(NODE_CAPACITY)
        .map(|group| {
            let mut keys: Vec<Key> = group
                .iter()
                .map(|c| Key {
                    size: c.stored_size,
                    mask: c.filter_mask,
                    offsets: c.offsets.clone(),
                })
                .collect();
            let last = &group[group.len() - 1];
            keys.push(Key {
                size: 0,
                mask: 0,
                offsets: last.offsets.iter().zip(chunk_dims).map(|(o, d)| o + d).collect(),
            });
            Node {
                level: 0,
                keys,
                children: group.iter().map(|c| c.address).collect(),
            }
        })
        .collect();

    let mut levels: Vec<Vec<Node>> = Vec::new();
    let mut next_addr = base;
    loop {
        let first = next_addr;
        next_addr += nsize * level.len() as u64;
        if level.len() == 1 {
            levels.push(level);
            break;
        }
        let lvl = level[0].level + 1;
        let parents = level
            .chunks(NODE_CAPACITY)
            .enumerate()
            .map(|(g, group)| {
                let mut keys: Vec<Key> = group.iter().map(|n| n.keys[0].clone()).collect();
                if let Some(tail) = group.last().and_then(|n| n.keys.last()) {
                    keys.push(tail.clone());
                }
                let start = first + (g * NODE_CAPACITY) as u64 * nsize;
                Node {
                    level: lvl,
                    keys,
                    children: (0..group.len() as u64).map(|i| start + i * nsize).collect(),
                }
            })
            .collect();
        levels.push(level);
        level = parents;
    }

    let mut buf = Vec::with_capacity((next_addr - base) as usize);
    let mut addr = base;
    for nodes in &levels {
        for (i, node) in nodes.iter().enumerate() {
            let left = if i == 0 { UNDEF_ADDR } else { addr - nsize };
            let right = if i + 1 == nodes.len() { UNDEF_ADDR } else { addr + nsize };
            encode_node(&mut buf, node, left, right, rank);
            addr += nsize;
        }
    }
    (buf, addr - nsize)
}

fn encode_node(buf: &mut Vec<u8>, node: &Node, left: u64, right: u64, rank: usize) {
    let start = buf.len();
    buf.extend_from_slice(b"TREE");
    buf.put_u8(1);
    buf.put_u8(node.level);
    buf.put_u16(node.children.len() as u16);
    buf.put_u64(left);
    buf.put_u64(right);
    for (key, child) in node.keys.iter().zip(node.children.iter().map(Some).chain([None])) {
        buf.put_u32(key.size);
        buf.put_u32(key.mask);
        for &o in &key.offsets {
            buf.put_u64(o);
        }
        buf.put_u64(0);
        if let Some(&child) = child {
            buf.put_u64(child);
        }
    }
    buf.resize(start + node_size(rank), 0);
}
