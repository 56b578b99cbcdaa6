pub mod autosave;
pub mod change;
pub mod engine;
pub mod persist;

pub use autosave::{AutoSave, SaveState, TimerCommand, DEFAULT_DEBOUNCE_MS};
pub use change::{has_changed, Snapshot};
pub use engine::{DocumentEngine, SaveOutcome, SaveRequest, SyncConfig, UNTITLED};
pub use persist::{load_document, persist};
