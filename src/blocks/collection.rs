use crate::blocks::algebra;
use crate::blocks::content::hydrate;
use crate::models::{Block, BlockRecord, BlockType};
use crate::util::{new_temp_block_id, timestamp_now};
use std::collections::HashMap;

/// Live block sequence of one open document.
///
/// All mutation goes through here. Each operation computes the next sequence
/// with `algebra` and swaps it in whole, so readers never see a half-applied
/// change.
#[derive(Clone, Debug, Default)]
pub struct BlockCollection {
    document_id: String,
    blocks: Vec<Block>,
    /// State as of the last `initialize`, used by `reset`.
    initial: Vec<Block>,
}

#[allow(clippy::len_without_is_empty)]
impl BlockCollection {
    pub fn new(document_id: impl Into<String>) -> Self {
        let document_id = document_id.into();
        let blocks = vec![default_block(&document_id)];
        Self {
            document_id,
            initial: blocks.clone(),
            blocks,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn is_first(&self, id: &str) -> bool {
        self.get(id).is_some_and(|b| b.position == 0)
    }

    pub fn is_last(&self, id: &str) -> bool {
        self.get(id)
            .is_some_and(|b| b.position + 1 == self.blocks.len())
    }

    /// Adopt server blocks as the current (and reset) state.
    ///
    /// An empty list yields a single empty text block.
    pub fn initialize(&mut self, records: &[BlockRecord]) {
        let mut blocks = hydrate(records, &self.document_id);
        if blocks.is_empty() {
            blocks.push(default_block(&self.document_id));
        }
        self.initial = blocks.clone();
        self.blocks = blocks;
    }

    /// Replace local state with the server echo, but only when they differ.
    ///
    /// An empty echo carries no blocks at all and leaves local state alone.
    /// Returns whether local state was replaced.
    pub fn sync_from_server(&mut self, records: &[BlockRecord]) -> bool {
        let incoming = hydrate(records, &self.document_id);
        if incoming.is_empty() || incoming == self.blocks {
            return false;
        }
        self.blocks = incoming;
        true
    }

    /// Drop local edits and go back to the last initialized state.
    pub fn reset(&mut self) {
        self.blocks = self.initial.clone();
    }

    pub fn update(&mut self, id: &str, content: &str, block_type: Option<BlockType>) -> bool {
        let Some(current) = self.get(id) else {
            return false;
        };
        if current.content == content && block_type.map_or(true, |t| t == current.block_type) {
            return false;
        }
        let next = algebra::update_content(&self.blocks, id, content, block_type, &timestamp_now());
        self.replace(next)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let next = algebra::delete(&self.blocks, id);
        self.replace(next)
    }

    /// Insert a new empty block after `after_id` and return its temporary id.
    pub fn add_after(&mut self, after_id: &str, block_type: BlockType) -> String {
        let now = timestamp_now();
        let block = Block {
            id: new_temp_block_id(),
            block_type,
            content: String::new(),
            position: 0,
            document_id: self.document_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        let id = block.id.clone();
        let next = algebra::insert_after(&self.blocks, after_id, block);
        self.replace(next);
        id
    }

    pub fn move_up(&mut self, id: &str) -> bool {
        let next = algebra::move_up(&self.blocks, id);
        self.replace(next)
    }

    pub fn move_down(&mut self, id: &str) -> bool {
        let next = algebra::move_down(&self.blocks, id);
        self.replace(next)
    }

    /// Apply a drag-end event: `active_id` lands where `over_id` was.
    pub fn drag_reorder(&mut self, active_id: &str, over_id: &str) -> bool {
        let Some((from, to)) = algebra::drag_indices(&self.blocks, active_id, over_id) else {
            return false;
        };
        let next = algebra::reorder(&self.blocks, from, to);
        self.replace(next)
    }

    /// Rewrite ids (temporary -> server-issued) in place of the old ones.
    pub fn remap_ids(&mut self, ids: &HashMap<String, String>) -> bool {
        if ids.is_empty() || !self.blocks.iter().any(|b| ids.contains_key(&b.id)) {
            return false;
        }
        let next = self
            .blocks
            .iter()
            .map(|b| match ids.get(&b.id) {
                Some(real) => Block {
                    id: real.clone(),
                    ..b.clone()
                },
                None => b.clone(),
            })
            .collect();
        self.replace(next)
    }

    fn replace(&mut self, next: Vec<Block>) -> bool {
        if next == self.blocks {
            return false;
        }
        self.blocks = next;
        true
    }
}

pub(crate) fn default_block(document_id: &str) -> Block {
    let now = timestamp_now();
    Block {
        id: new_temp_block_id(),
        block_type: BlockType::Text,
        content: String::new(),
        position: 0,
        document_id: document_id.to_string(),
        created_at: now.clone(),
        updated_at: now,
    }
}
