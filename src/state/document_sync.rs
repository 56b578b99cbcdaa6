use crate::api::{ApiError, ApiResult};
use crate::models::{Block, BlockType, DocumentEvent};
use crate::state::AppContext;
use crate::sync::{
    load_document, persist, DocumentEngine, SaveOutcome, SaveRequest, TimerCommand,
};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wasm_bindgen::JsCast;

/// Reactive wrapper around a [`DocumentEngine`] for the open document.
///
/// Responsibilities:
/// - forward editor events to the engine and mirror its state into signals
/// - own the browser debounce timeout
/// - run saves on the local task queue and broadcast the result
///
/// Non-responsibilities:
/// - focus, selection, drag visuals
#[derive(Clone)]
pub struct DocumentSyncController {
    app_state: AppContext,
    engine: Arc<Mutex<DocumentEngine>>,

    pub title: RwSignal<String>,
    pub blocks: RwSignal<Vec<Block>>,
    pub loading: RwSignal<bool>,
    pub saving: RwSignal<bool>,
    pub last_error: RwSignal<Option<String>>,

    timer: TimerSlot,
}

/// Browser timeout handle for the armed debounce, if any.
#[derive(Clone, Debug, Default)]
struct TimerSlot(Arc<Mutex<Option<i32>>>);

impl TimerSlot {
    fn slot(&self) -> MutexGuard<'_, Option<i32>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Empty the slot, returning the handle that was armed.
    fn take(&self) -> Option<i32> {
        self.slot().take()
    }

    fn store(&self, handle: i32) {
        *self.slot() = Some(handle);
    }
}

/// Ticket and `setTimeout` delay for an `Arm`; `None` for `Disarm`.
fn timeout_for(cmd: TimerCommand) -> Option<(u64, i32)> {
    match cmd {
        TimerCommand::Arm { ticket, delay_ms } => {
            Some((ticket, i32::try_from(delay_ms).unwrap_or(i32::MAX)))
        }
        TimerCommand::Disarm => None,
    }
}

/// What the controller does once a save settles.
#[derive(Clone, Debug, PartialEq)]
struct SaveEffects {
    timer: Option<TimerCommand>,
    /// Broadcast to the rest of the app.
    event: Option<DocumentEvent>,
    /// New `last_error` value; `None` leaves it as is.
    last_error: Option<Option<String>>,
}

fn save_effects(result: &ApiResult<SaveOutcome>) -> SaveEffects {
    match result {
        Ok(SaveOutcome::Saved { event, timer, .. }) => SaveEffects {
            timer: *timer,
            event: Some(event.clone()),
            last_error: Some(None),
        },
        Ok(SaveOutcome::Discarded { timer }) => SaveEffects {
            timer: *timer,
            event: None,
            last_error: None,
        },
        Err(e) => SaveEffects {
            timer: None,
            event: None,
            last_error: Some(Some(e.to_string())),
        },
    }
}

/// Write `value` only when it differs, so subscribers are not woken for nothing.
fn set_if_changed<T>(signal: RwSignal<T>, value: T) -> bool
where
    T: PartialEq + Send + Sync + 'static,
{
    if signal.with_untracked(|current| *current == value) {
        return false;
    }
    signal.set(value);
    true
}

impl DocumentSyncController {
    pub fn new(app_state: AppContext) -> Self {
        let engine = DocumentEngine::new(String::new(), app_state.0.sync_config);
        let title = RwSignal::new(engine.title().to_string());
        let blocks = RwSignal::new(engine.blocks().to_vec());

        Self {
            app_state,
            engine: Arc::new(Mutex::new(engine)),
            title,
            blocks,
            loading: RwSignal::new(false),
            saving: RwSignal::new(false),
            last_error: RwSignal::new(None),
            timer: TimerSlot::default(),
        }
    }

    fn engine(&self) -> MutexGuard<'_, DocumentEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document_id(&self) -> String {
        self.engine().document_id().to_string()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.engine().has_unsaved_changes()
    }

    pub fn is_first(&self, id: &str) -> bool {
        self.engine().collection().is_first(id)
    }

    pub fn is_last(&self, id: &str) -> bool {
        self.engine().collection().is_last(id)
    }

    /// Open (or switch to) a document. Any armed timer of the previous one is dropped.
    pub fn open(&self, document_id: String) {
        let cmd = self.engine().close();
        self.apply_timer(Some(cmd));
        if document_id.trim().is_empty() {
            return;
        }

        self.loading.set(true);
        self.last_error.set(None);

        let api_client = self.app_state.0.api_client.get_untracked();
        let s2 = self.clone();
        spawn_local(async move {
            match load_document(&s2.engine, &api_client, &document_id).await {
                Ok(true) => s2.publish(),
                // A newer `open` owns the loading flag now.
                Ok(false) => return,
                Err(e) => s2.record_error(&e),
            }
            s2.loading.set(false);
        });
    }

    /// Unmount: clear the debounce timer. A request already sent still lands.
    pub fn close(&self) {
        let cmd = self.engine().close();
        self.apply_timer(Some(cmd));
    }

    pub fn set_title(&self, title: &str) {
        self.mutate(|e| e.set_title(title));
    }

    pub fn update_block(&self, id: &str, content: &str, block_type: Option<BlockType>) {
        self.mutate(|e| e.update_block(id, content, block_type));
    }

    pub fn delete_block(&self, id: &str) {
        self.mutate(|e| e.delete_block(id));
    }

    pub fn add_block_after(&self, after_id: &str, block_type: BlockType) -> String {
        let (id, cmd) = self.engine().add_block_after(after_id, block_type);
        self.apply_timer(cmd);
        self.publish();
        id
    }

    pub fn move_up(&self, id: &str) {
        self.mutate(|e| e.move_up(id));
    }

    pub fn move_down(&self, id: &str) {
        self.mutate(|e| e.move_down(id));
    }

    /// Drag ended with `active_id` dropped onto `over_id`.
    pub fn drag_end(&self, active_id: &str, over_id: &str) {
        self.mutate(|e| e.drag_reorder(active_id, over_id));
    }

    pub fn reset(&self) {
        self.mutate(|e| e.reset());
    }

    /// Save right away. A save already in flight makes this a no-op.
    pub async fn save_now(&self) -> ApiResult<()> {
        self.apply_timer(Some(TimerCommand::Disarm));
        let Some(request) = self.engine().save_now() else {
            return Ok(());
        };
        self.run_save(request).await
    }

    fn mutate(&self, f: impl FnOnce(&mut DocumentEngine) -> Option<TimerCommand>) {
        let cmd = f(&mut *self.engine());
        self.apply_timer(cmd);
        self.publish();
    }

    fn on_timer(&self, ticket: u64) {
        self.timer.take();
        let Some(request) = self.engine().on_debounce_elapsed(ticket) else {
            return;
        };

        let s2 = self.clone();
        spawn_local(async move {
            // Already recorded in `last_error`; autosave has no caller to hand it to.
            let _ = s2.run_save(request).await;
        });
    }

    async fn run_save(&self, request: SaveRequest) -> ApiResult<()> {
        self.saving.set(true);
        let api_client = self.app_state.0.api_client.get_untracked();
        let result = persist(&self.engine, &api_client, request).await;
        self.saving.set(false);

        if let Err(e) = &result {
            log::warn!("document sync: {e}");
        }
        let effects = save_effects(&result);
        self.apply_timer(effects.timer);
        if let Some(last_error) = effects.last_error {
            self.last_error.set(last_error);
        }
        self.publish();
        if let Some(event) = effects.event {
            self.app_state.0.notify(event);
        }
        result.map(|_| ())
    }

    fn record_error(&self, e: &ApiError) {
        log::warn!("document sync: {e}");
        self.last_error.set(Some(e.to_string()));
    }

    /// Copy engine state into the signals, skipping writes that would not change anything.
    fn publish(&self) {
        let (title, blocks) = {
            let e = self.engine();
            (e.title().to_string(), e.blocks().to_vec())
        };
        set_if_changed(self.title, title);
        set_if_changed(self.blocks, blocks);
    }

    fn apply_timer(&self, cmd: Option<TimerCommand>) {
        let Some(cmd) = cmd else {
            return;
        };
        let Some(win) = web_sys::window() else {
            return;
        };

        if let Some(tid) = self.timer.take() {
            win.clear_timeout_with_handle(tid);
        }

        let Some((ticket, delay)) = timeout_for(cmd) else {
            return;
        };

        let s2 = self.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            s2.on_timer(ticket);
        });

        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                delay,
            )
            .unwrap_or(0);
        self.timer.store(tid);
    }
}

/// Controller bound to a reactive document id.
///
/// Switching ids reloads; unmounting clears the debounce timer.
pub fn use_document_sync(document_id: Signal<String>) -> DocumentSyncController {
    let app_state = expect_context::<AppContext>();
    let controller = DocumentSyncController::new(app_state);

    let c2 = controller.clone();
    Effect::new(move |_| {
        c2.open(document_id.get());
    });

    let c3 = controller.clone();
    on_cleanup(move || c3.close());

    controller
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiErrorKind;
    use crate::models::Document;

    fn saved(timer: Option<TimerCommand>) -> SaveOutcome {
        SaveOutcome::Saved {
            document: Document {
                id: "doc".to_string(),
                title: "T".to_string(),
                content: None,
                blocks: vec![],
                created_at: None,
                updated_at: None,
                deleted_at: None,
            },
            event: DocumentEvent::Updated {
                id: "doc".to_string(),
            },
            reconciled: false,
            timer,
        }
    }

    #[test]
    fn test_saved_broadcasts_and_clears_error() {
        let arm = TimerCommand::Arm {
            ticket: 4,
            delay_ms: 500,
        };
        let effects = save_effects(&Ok(saved(Some(arm))));
        assert_eq!(
            effects.event,
            Some(DocumentEvent::Updated {
                id: "doc".to_string()
            })
        );
        assert_eq!(effects.timer, Some(arm));
        assert_eq!(effects.last_error, Some(None));
    }

    #[test]
    fn test_discarded_save_does_not_broadcast() {
        let effects = save_effects(&Ok(SaveOutcome::Discarded {
            timer: Some(TimerCommand::Disarm),
        }));
        assert_eq!(effects.event, None);
        assert_eq!(effects.timer, Some(TimerCommand::Disarm));
        assert_eq!(effects.last_error, None);
    }

    #[test]
    fn test_failed_save_records_error_only() {
        let err = ApiError {
            kind: ApiErrorKind::Network,
            message: "offline".to_string(),
        };
        let effects = save_effects(&Err(err));
        assert_eq!(effects.event, None);
        assert_eq!(effects.timer, None);
        assert_eq!(effects.last_error, Some(Some("offline".to_string())));
    }

    #[test]
    fn test_set_if_changed_skips_identical_writes() {
        let title = RwSignal::new("Notes".to_string());
        assert!(!set_if_changed(title, "Notes".to_string()));
        assert!(set_if_changed(title, "Notes v2".to_string()));
        assert_eq!(title.get_untracked(), "Notes v2");

        let blocks: RwSignal<Vec<Block>> = RwSignal::new(vec![]);
        assert!(!set_if_changed(blocks, vec![]));
    }

    #[test]
    fn test_timeout_for_commands() {
        assert_eq!(
            timeout_for(TimerCommand::Arm {
                ticket: 7,
                delay_ms: 500
            }),
            Some((7, 500))
        );
        assert_eq!(
            timeout_for(TimerCommand::Arm {
                ticket: 8,
                delay_ms: u32::MAX
            }),
            Some((8, i32::MAX))
        );
        assert_eq!(timeout_for(TimerCommand::Disarm), None);
    }

    #[test]
    fn test_timer_slot_hands_out_handle_once() {
        let slot = TimerSlot::default();
        assert_eq!(slot.take(), None);
        slot.store(12);
        let shared = slot.clone();
        assert_eq!(shared.take(), Some(12));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_timer_slot_survives_poisoning() {
        let slot = TimerSlot::default();
        let poisoner = slot.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.slot();
            panic!("poison the slot");
        })
        .join();
        slot.store(3);
        assert_eq!(slot.take(), Some(3));
    }
}
