use crate::api::{ApiResult, DocumentStore};
use crate::sync::engine::{DocumentEngine, SaveOutcome, SaveRequest};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Run one save round-trip.
///
/// The engine lock is only taken after the request settles; the await point
/// never holds it.
pub async fn persist<S: DocumentStore>(
    engine: &Mutex<DocumentEngine>,
    store: &S,
    request: SaveRequest,
) -> ApiResult<SaveOutcome> {
    let result = store
        .update_document(&request.document_id, &request.body)
        .await;
    lock(engine).complete_save(request.epoch, result)
}

/// Fetch a document and load it into the engine.
///
/// Returns `Ok(false)` when another load was started while this one was in
/// flight; its result (or error) is dropped.
pub async fn load_document<S: DocumentStore>(
    engine: &Mutex<DocumentEngine>,
    store: &S,
    id: &str,
) -> ApiResult<bool> {
    let ticket = lock(engine).begin_load();
    let result = store.get_document(id).await;

    let mut engine = lock(engine);
    if !engine.is_current_load(ticket) {
        log::debug!("load of {id} superseded, dropped");
        return Ok(false);
    }
    engine.load(&result?);
    Ok(true)
}

fn lock(engine: &Mutex<DocumentEngine>) -> MutexGuard<'_, DocumentEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiErrorKind, UpdateDocumentRequest};
    use crate::models::{BlockRecord, Document, DocumentEvent};
    use crate::sync::autosave::TimerCommand;
    use crate::sync::engine::SyncConfig;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::FutureExt;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory backend that stores whatever it is sent.
    #[derive(Default)]
    struct MemoryStore {
        documents: RefCell<Vec<Document>>,
        puts: RefCell<Vec<UpdateDocumentRequest>>,
        fail_next: RefCell<bool>,
    }

    impl MemoryStore {
        fn with(doc: Document) -> Self {
            let s = Self::default();
            s.documents.borrow_mut().push(doc);
            s
        }
    }

    impl DocumentStore for MemoryStore {
        async fn get_document(&self, id: &str) -> ApiResult<Document> {
            self.documents
                .borrow()
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or_else(|| ApiError {
                    kind: ApiErrorKind::Http,
                    message: "Request failed (404 Not Found): Not Found".to_string(),
                })
        }

        async fn update_document(
            &self,
            id: &str,
            body: &UpdateDocumentRequest,
        ) -> ApiResult<Document> {
            if self.fail_next.replace(false) {
                return Err(ApiError {
                    kind: ApiErrorKind::Http,
                    message: "Request failed (500 Internal Server Error): boom".to_string(),
                });
            }
            self.puts.borrow_mut().push(body.clone());
            let doc = Document {
                id: id.to_string(),
                title: body.title.clone(),
                content: Some(body.content.clone()),
                blocks: body
                    .blocks
                    .iter()
                    .enumerate()
                    .map(|(i, b)| {
                        let mut r = BlockRecord::from(b);
                        // The backend issues its own ids for new blocks.
                        if crate::util::is_temp_block_id(&b.id) {
                            r.id = format!("srv-{i}");
                        }
                        r
                    })
                    .collect(),
                created_at: None,
                updated_at: None,
                deleted_at: None,
            };
            let mut docs = self.documents.borrow_mut();
            docs.retain(|d| d.id != id);
            docs.push(doc.clone());
            Ok(doc)
        }
    }

    /// Backend whose `get_document` answers only when the test sends the document.
    #[derive(Default)]
    struct GatedStore {
        pending: RefCell<HashMap<String, oneshot::Receiver<Document>>>,
    }

    impl GatedStore {
        fn gate(&self, id: &str) -> oneshot::Sender<Document> {
            let (tx, rx) = oneshot::channel();
            self.pending.borrow_mut().insert(id.to_string(), rx);
            tx
        }
    }

    impl DocumentStore for GatedStore {
        async fn get_document(&self, id: &str) -> ApiResult<Document> {
            let rx = self.pending.borrow_mut().remove(id);
            let Some(rx) = rx else {
                return Err(ApiError {
                    kind: ApiErrorKind::Http,
                    message: "Request failed (404 Not Found): Not Found".to_string(),
                });
            };
            rx.await.map_err(|_| ApiError {
                kind: ApiErrorKind::Network,
                message: "connection dropped".to_string(),
            })
        }

        async fn update_document(
            &self,
            _id: &str,
            _body: &UpdateDocumentRequest,
        ) -> ApiResult<Document> {
            Err(ApiError {
                kind: ApiErrorKind::Network,
                message: "read-only".to_string(),
            })
        }
    }

    fn doc_with_id(id: &str, title: &str) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            ..empty_doc()
        }
    }

    fn empty_doc() -> Document {
        Document {
            id: "doc".to_string(),
            title: "Notes".to_string(),
            content: None,
            blocks: vec![],
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    fn engine() -> Mutex<DocumentEngine> {
        Mutex::new(DocumentEngine::new("doc", SyncConfig::default()))
    }

    #[test]
    fn test_load_then_debounced_save_round_trip() {
        let store = MemoryStore::with(empty_doc());
        let engine = engine();
        block_on(load_document(&engine, &store, "doc")).expect("load");

        let request = {
            let mut e = engine.lock().expect("lock");
            let first = e.blocks()[0].id.clone();
            e.update_block(&first, "hello", None);
            let Some(TimerCommand::Arm { ticket, .. }) = e.set_title("Notes v2") else {
                panic!("change should arm the debounce");
            };
            e.on_debounce_elapsed(ticket).expect("timer starts the save")
        };

        let outcome = block_on(persist(&engine, &store, request)).expect("save");
        let SaveOutcome::Saved { event, .. } = outcome else {
            panic!("should be saved");
        };
        assert_eq!(event, DocumentEvent::Updated { id: "doc".to_string() });

        let puts = store.puts.borrow();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].title, "Notes v2");
        assert_eq!(puts[0].content, "hello");

        let e = engine.lock().expect("lock");
        assert_eq!(e.blocks()[0].id, "srv-0");
        assert!(!e.has_unsaved_changes());
    }

    #[test]
    fn test_failed_save_propagates_and_allows_next_attempt() {
        let store = MemoryStore::with(empty_doc());
        let engine = engine();
        block_on(load_document(&engine, &store, "doc")).expect("load");
        *store.fail_next.borrow_mut() = true;

        let request = engine.lock().expect("lock").save_now().expect("manual save");
        let err = block_on(persist(&engine, &store, request)).expect_err("should fail");
        assert!(err.to_string().contains("500"));
        assert!(!engine.lock().expect("lock").is_saving());

        let request = engine.lock().expect("lock").save_now().expect("guard released");
        block_on(persist(&engine, &store, request)).expect("second save");
        assert_eq!(store.puts.borrow().len(), 1);
    }

    #[test]
    fn test_out_of_order_loads_keep_latest_document() {
        let store = GatedStore::default();
        let engine = engine();
        let reply_a = store.gate("a");
        let reply_b = store.gate("b");

        let mut load_a = Box::pin(load_document(&engine, &store, "a"));
        let mut load_b = Box::pin(load_document(&engine, &store, "b"));
        assert!(load_a.as_mut().now_or_never().is_none());
        assert!(load_b.as_mut().now_or_never().is_none());

        reply_b.send(doc_with_id("b", "B")).expect("b listening");
        assert!(block_on(load_b).expect("load b"));

        reply_a.send(doc_with_id("a", "A")).expect("a listening");
        assert!(!block_on(load_a).expect("stale load is not an error"));

        let e = engine.lock().expect("lock");
        assert_eq!(e.document_id(), "b");
        assert_eq!(e.title(), "B");
    }

    #[test]
    fn test_superseded_load_error_is_dropped() {
        let store = GatedStore::default();
        let engine = engine();
        let reply_a = store.gate("a");
        let reply_b = store.gate("b");

        let mut load_a = Box::pin(load_document(&engine, &store, "a"));
        assert!(load_a.as_mut().now_or_never().is_none());
        let mut load_b = Box::pin(load_document(&engine, &store, "b"));
        assert!(load_b.as_mut().now_or_never().is_none());

        drop(reply_a);
        assert!(!block_on(load_a).expect("superseded failure is swallowed"));

        reply_b.send(doc_with_id("b", "B")).expect("b listening");
        assert!(block_on(load_b).expect("load b"));
        assert_eq!(engine.lock().expect("lock").document_id(), "b");
    }

    #[test]
    fn test_load_missing_document_errors() {
        let store = MemoryStore::default();
        let engine = engine();
        let err = block_on(load_document(&engine, &store, "nope")).expect_err("missing");
        assert_eq!(err.kind, ApiErrorKind::Http);
    }
}
