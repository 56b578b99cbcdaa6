//! Pure operations over an ordered block sequence.
//!
//! Every function takes a borrowed slice and returns a fresh `Vec<Block>`; the
//! input is never touched. Structural operations always renumber, so the
//! output satisfies `blocks[i].position == i`.

use crate::models::{Block, BlockType};

/// Rewrite `position` from array order.
pub fn renumber(mut blocks: Vec<Block>) -> Vec<Block> {
    for (i, b) in blocks.iter_mut().enumerate() {
        b.position = i;
    }
    blocks
}

pub fn index_of(blocks: &[Block], id: &str) -> Option<usize> {
    blocks.iter().position(|b| b.id == id)
}

/// Insert `new_block` right after `after_id`, or at the end when `after_id` is unknown.
pub fn insert_after(blocks: &[Block], after_id: &str, new_block: Block) -> Vec<Block> {
    let mut out = blocks.to_vec();
    let at = index_of(blocks, after_id).map_or(out.len(), |i| i + 1);
    out.insert(at, new_block);
    renumber(out)
}

/// Remove a block.
///
/// The last remaining block and the position-0 block (while others exist) are
/// never removed; the document must stay typable at the top.
pub fn delete(blocks: &[Block], id: &str) -> Vec<Block> {
    if blocks.len() <= 1 {
        return blocks.to_vec();
    }
    let Some(idx) = index_of(blocks, id) else {
        return blocks.to_vec();
    };
    if blocks[idx].position == 0 {
        return blocks.to_vec();
    }

    let mut out = blocks.to_vec();
    out.remove(idx);
    renumber(out)
}

pub fn move_up(blocks: &[Block], id: &str) -> Vec<Block> {
    match index_of(blocks, id) {
        Some(idx) if idx > 0 => reorder(blocks, idx, idx - 1),
        _ => blocks.to_vec(),
    }
}

pub fn move_down(blocks: &[Block], id: &str) -> Vec<Block> {
    match index_of(blocks, id) {
        Some(idx) if idx + 1 < blocks.len() => reorder(blocks, idx, idx + 1),
        _ => blocks.to_vec(),
    }
}

/// Remove the element at `from` and reinsert it at `to`.
///
/// `from` out of range leaves the sequence as is; `to` is clamped to the last index.
pub fn reorder(blocks: &[Block], from: usize, to: usize) -> Vec<Block> {
    if from >= blocks.len() {
        return blocks.to_vec();
    }
    let to = to.min(blocks.len() - 1);

    let mut out = blocks.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    renumber(out)
}

/// Translate a drag-end event (dragged id, drop target id) into reorder indices.
pub fn drag_indices(blocks: &[Block], active_id: &str, over_id: &str) -> Option<(usize, usize)> {
    if active_id == over_id {
        return None;
    }
    let from = index_of(blocks, active_id)?;
    let to = index_of(blocks, over_id)?;
    Some((from, to))
}

/// Replace content (and optionally type) of one block, stamping `updated_at`.
pub fn update_content(
    blocks: &[Block],
    id: &str,
    content: &str,
    block_type: Option<BlockType>,
    now: &str,
) -> Vec<Block> {
    blocks
        .iter()
        .map(|b| {
            if b.id != id {
                return b.clone();
            }
            let mut next = b.clone();
            next.content = content.to_string();
            if let Some(t) = block_type {
                next.block_type = t;
            }
            next.updated_at = now.to_string();
            next
        })
        .collect()
}
