//! Block document editor core: an ordered block model, its mutation algebra,
//! and a debounced, single-flight autosave that reconciles optimistic local
//! edits with the server's canonical copy.

pub mod api;
pub mod blocks;
pub mod logging;
pub mod models;
pub mod state;
mod storage;
pub mod sync;
mod util;

pub use api::{ApiClient, ApiError, ApiErrorKind, ApiResult, DocumentStore, EnvConfig};
pub use blocks::BlockCollection;
pub use models::{Block, BlockRecord, BlockType, Document, DocumentEvent};
pub use state::{provide_app_state, use_document_sync, AppContext, AppState, DocumentSyncController};
pub use sync::{DocumentEngine, SaveOutcome, SaveRequest, SaveState, SyncConfig, TimerCommand};
pub use util::is_temp_block_id;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init();
}
