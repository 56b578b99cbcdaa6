//! Single writer for one open document.
//!
//! Owns the block collection, the title, the last persisted snapshot, and the
//! autosave machine. UI events come in as method calls; timer arming comes out
//! as [`TimerCommand`]s and saves come out as [`SaveRequest`]s.

use crate::api::{ApiResult, UpdateDocumentRequest};
use crate::blocks::collection::BlockCollection;
use crate::blocks::content::hydrate;
use crate::models::{Block, BlockType, Document, DocumentEvent};
use crate::sync::autosave::{AutoSave, SaveState, TimerCommand, DEFAULT_DEBOUNCE_MS};
use crate::sync::change::Snapshot;
use crate::util::is_temp_block_id;
use std::collections::HashMap;

pub const UNTITLED: &str = "Untitled";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub debounce_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// One persistence call, ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub document_id: String,
    /// Load generation the request belongs to; responses from an older load are dropped.
    pub epoch: u64,
    pub body: UpdateDocumentRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    Saved {
        document: Document,
        event: DocumentEvent,
        /// Local blocks were replaced (or re-keyed) from the response.
        reconciled: bool,
        /// Set when local state moved on during the request and needs another save.
        timer: Option<TimerCommand>,
    },
    /// The document was reloaded or switched while the request was in flight.
    ///
    /// `timer` is set when this response released the save guard and local
    /// state still needs saving.
    Discarded { timer: Option<TimerCommand> },
}

#[derive(Clone, Debug)]
struct InFlight {
    epoch: u64,
    title: String,
    blocks: Vec<Block>,
}

#[derive(Clone, Debug)]
pub struct DocumentEngine {
    document_id: String,
    title: String,
    /// Title as of the last `load`, used by `reset`.
    loaded_title: String,
    collection: BlockCollection,
    snapshot: Snapshot,
    autosave: AutoSave,
    epoch: u64,
    in_flight: Option<InFlight>,
    /// Latest `begin_load` ticket; older loads are dropped when they resolve.
    load_ticket: u64,
}

impl DocumentEngine {
    pub fn new(document_id: impl Into<String>, config: SyncConfig) -> Self {
        let document_id = document_id.into();
        let collection = BlockCollection::new(document_id.clone());
        let snapshot = Snapshot::new("", collection.blocks().to_vec());
        Self {
            document_id,
            title: String::new(),
            loaded_title: String::new(),
            collection,
            snapshot,
            autosave: AutoSave::new(config.debounce_ms),
            epoch: 0,
            in_flight: None,
            load_ticket: 0,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        self.collection.blocks()
    }

    pub fn collection(&self) -> &BlockCollection {
        &self.collection
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn save_state(&self) -> SaveState {
        self.autosave.state()
    }

    pub fn is_saving(&self) -> bool {
        self.autosave.is_saving()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.snapshot.differs_from(&self.title, self.collection.blocks())
    }

    /// Register a fetch about to start. Only the latest ticket may `load`.
    pub fn begin_load(&mut self) -> u64 {
        self.load_ticket += 1;
        self.load_ticket
    }

    pub fn is_current_load(&self, ticket: u64) -> bool {
        ticket == self.load_ticket
    }

    /// Adopt a freshly fetched document.
    ///
    /// The loaded state, including a synthesized first block for an empty
    /// document, becomes the snapshot, so opening a document never reads as dirty.
    ///
    /// Reloading the same document while a save is in flight keeps the save
    /// guard: the outstanding response is discarded by epoch and releases it.
    pub fn load(&mut self, document: &Document) -> TimerCommand {
        let same_document = document.id == self.document_id;
        if !same_document {
            log::debug!("engine: switching {} -> {}", self.document_id, document.id);
            self.document_id = document.id.clone();
            self.collection = BlockCollection::new(document.id.clone());
        }
        self.collection.initialize(&document.blocks);
        self.title = document.title.clone();
        self.loaded_title = document.title.clone();
        self.snapshot = Snapshot::new(self.title.clone(), self.collection.blocks().to_vec());
        self.epoch += 1;

        if same_document && self.autosave.is_saving() {
            log::debug!("engine: reloaded {} with a save in flight", self.document_id);
            return self.autosave.cancel();
        }
        self.in_flight = None;
        self.autosave.reset()
    }

    /// Unmount: drop the pending timer. An in-flight request still completes.
    pub fn close(&mut self) -> TimerCommand {
        self.autosave.cancel()
    }

    pub fn set_title(&mut self, title: &str) -> Option<TimerCommand> {
        if self.title == title {
            return None;
        }
        self.title = title.to_string();
        self.observe()
    }

    pub fn update_block(
        &mut self,
        id: &str,
        content: &str,
        block_type: Option<BlockType>,
    ) -> Option<TimerCommand> {
        if !self.collection.update(id, content, block_type) {
            return None;
        }
        self.observe()
    }

    pub fn delete_block(&mut self, id: &str) -> Option<TimerCommand> {
        if !self.collection.delete(id) {
            return None;
        }
        self.observe()
    }

    /// Returns the new block's temporary id alongside the timer command.
    pub fn add_block_after(
        &mut self,
        after_id: &str,
        block_type: BlockType,
    ) -> (String, Option<TimerCommand>) {
        let id = self.collection.add_after(after_id, block_type);
        (id, self.observe())
    }

    pub fn move_up(&mut self, id: &str) -> Option<TimerCommand> {
        if !self.collection.move_up(id) {
            return None;
        }
        self.observe()
    }

    pub fn move_down(&mut self, id: &str) -> Option<TimerCommand> {
        if !self.collection.move_down(id) {
            return None;
        }
        self.observe()
    }

    pub fn drag_reorder(&mut self, active_id: &str, over_id: &str) -> Option<TimerCommand> {
        if !self.collection.drag_reorder(active_id, over_id) {
            return None;
        }
        self.observe()
    }

    /// Revert blocks and title to the last load.
    pub fn reset(&mut self) -> Option<TimerCommand> {
        self.collection.reset();
        self.title = self.loaded_title.clone();
        self.observe()
    }

    /// Debounce timer fired.
    pub fn on_debounce_elapsed(&mut self, ticket: u64) -> Option<SaveRequest> {
        if !self.autosave.on_timer(ticket) {
            return None;
        }
        Some(self.begin_save())
    }

    /// Save immediately, regardless of pending changes. The caller clears its timer.
    pub fn save_now(&mut self) -> Option<SaveRequest> {
        if !self.autosave.save_now() {
            return None;
        }
        Some(self.begin_save())
    }

    /// Feed the persistence result back in. Errors are returned unchanged.
    pub fn complete_save(&mut self, epoch: u64, result: ApiResult<Document>) -> ApiResult<SaveOutcome> {
        if epoch != self.epoch {
            log::debug!("engine: discarding save response from load epoch {epoch}");
            return Ok(SaveOutcome::Discarded {
                timer: self.release_stale(epoch),
            });
        }
        self.autosave.finish();
        let sent = self.in_flight.take();

        let document = match result {
            Ok(document) => document,
            Err(e) => {
                log::warn!("engine: save of {} failed: {e}", self.document_id);
                return Err(e);
            }
        };

        let server_blocks = hydrate(&document.blocks, &self.document_id);
        let reconciled = match &sent {
            Some(sent) => self.reconcile(sent, &document, &server_blocks),
            None => false,
        };

        // A response without blocks did not echo them; the server holds what was sent.
        let persisted = match sent {
            Some(sent) if server_blocks.is_empty() => sent.blocks,
            _ if server_blocks.is_empty() => self.collection.blocks().to_vec(),
            _ => server_blocks,
        };
        self.snapshot = Snapshot::new(document.title.clone(), persisted);

        let timer = if self.has_unsaved_changes() {
            log::debug!("engine: local edits outran save of {}, re-arming", self.document_id);
            self.autosave.on_change()
        } else {
            None
        };

        Ok(SaveOutcome::Saved {
            event: DocumentEvent::Updated {
                id: self.document_id.clone(),
            },
            document,
            reconciled,
            timer,
        })
    }

    /// Release the guard held by a request from an older epoch, if it is ours.
    fn release_stale(&mut self, epoch: u64) -> Option<TimerCommand> {
        if self.in_flight.as_ref().map(|f| f.epoch) != Some(epoch) {
            return None;
        }
        self.in_flight = None;
        self.autosave.finish();
        if self.has_unsaved_changes() {
            self.autosave.on_change()
        } else {
            None
        }
    }

    fn observe(&mut self) -> Option<TimerCommand> {
        if self.has_unsaved_changes() {
            self.autosave.on_change()
        } else {
            self.autosave.on_settled()
        }
    }

    fn begin_save(&mut self) -> SaveRequest {
        let blocks = self.collection.blocks().to_vec();
        self.in_flight = Some(InFlight {
            epoch: self.epoch,
            title: self.title.clone(),
            blocks: blocks.clone(),
        });
        log::debug!(
            "engine: saving {} ({} blocks, epoch {})",
            self.document_id,
            blocks.len(),
            self.epoch
        );
        SaveRequest {
            document_id: self.document_id.clone(),
            epoch: self.epoch,
            body: build_payload(&self.document_id, &self.title, &blocks),
        }
    }

    /// Bring local state in line with the server's answer.
    ///
    /// Untouched since the request went out: adopt the server version (only if
    /// it differs). Edited meanwhile: keep the edits, only swap temporary ids
    /// for the ids the server assigned.
    fn reconcile(&mut self, sent: &InFlight, document: &Document, server_blocks: &[Block]) -> bool {
        if self.title == sent.title {
            self.title = document.title.clone();
        }

        if self.collection.blocks() == sent.blocks.as_slice() {
            return self.collection.sync_from_server(&document.blocks);
        }

        let ids = assigned_ids(&sent.blocks, server_blocks);
        self.collection.remap_ids(&ids)
    }
}

/// `PUT` body: positions and document id re-stamped, empty title defaulted.
pub fn build_payload(document_id: &str, title: &str, blocks: &[Block]) -> UpdateDocumentRequest {
    let title = if title.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    };
    let blocks: Vec<Block> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| Block {
            position: i,
            document_id: document_id.to_string(),
            ..b.clone()
        })
        .collect();
    let content = blocks
        .iter()
        .map(|b| b.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    UpdateDocumentRequest {
        title,
        content,
        blocks,
    }
}

/// Temporary id -> server id, paired by position.
///
/// The payload carries sequential positions and the server answers in
/// position order, so equal lengths give a one-to-one pairing. Anything else
/// is ambiguous and yields no mapping.
pub(crate) fn assigned_ids(sent: &[Block], server: &[Block]) -> HashMap<String, String> {
    if sent.len() != server.len() {
        return HashMap::new();
    }
    sent.iter()
        .zip(server)
        .filter(|(s, r)| is_temp_block_id(&s.id) && s.id != r.id)
        .map(|(s, r)| (s.id.clone(), r.id.clone()))
        .collect()
}
