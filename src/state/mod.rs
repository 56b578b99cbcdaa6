pub mod document_sync;

pub use document_sync::{use_document_sync, DocumentSyncController};

use crate::api::{ApiClient, ApiResult, EnvConfig};
use crate::models::DocumentEvent;
use crate::storage::{clear_token, load_token, save_token};
use crate::sync::SyncConfig;
use leptos::prelude::*;

#[derive(Clone)]
pub struct AppState {
    pub api_client: RwSignal<ApiClient>,
    pub sync_config: SyncConfig,

    /// Last broadcast from an editor (saved, trashed, ...).
    pub last_document_event: RwSignal<Option<DocumentEvent>>,

    /// Bumped on every broadcast; the document list refetches when it changes.
    pub documents_revision: RwSignal<u64>,
}

impl AppState {
    pub fn new() -> Self {
        let config = EnvConfig::new();
        let mut client = ApiClient::new(config.api_url);
        if let Some(token) = load_token() {
            client.set_token(token);
        }

        Self {
            api_client: RwSignal::new(client),
            sync_config: SyncConfig {
                debounce_ms: config.autosave_ms,
            },
            last_document_event: RwSignal::new(None),
            documents_revision: RwSignal::new(0),
        }
    }

    /// Fire-and-forget: nobody waits for listeners.
    pub fn notify(&self, event: DocumentEvent) {
        log::debug!("document event: {event:?}");
        self.last_document_event.set(Some(event));
        self.documents_revision.update(|r| *r = r.wrapping_add(1));
    }

    pub fn set_token(&self, token: String) {
        save_token(&token);
        self.api_client.update(|c| c.set_token(token));
    }

    pub fn sign_out(&self) {
        clear_token();
        self.api_client.update(|c| c.clear_token());
    }

    /// Move a document to the trash.
    pub async fn delete_document(&self, id: &str) -> ApiResult<()> {
        let client = self.api_client.get_untracked();
        client.delete_document(id).await?;
        self.notify(DocumentEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    pub async fn restore_document(&self, id: &str) -> ApiResult<()> {
        let client = self.api_client.get_untracked();
        client.restore_document(id).await?;
        self.notify(DocumentEvent::Updated { id: id.to_string() });
        Ok(())
    }

    pub async fn delete_document_permanently(&self, id: &str) -> ApiResult<()> {
        let client = self.api_client.get_untracked();
        client.delete_document_permanently(id).await?;
        self.notify(DocumentEvent::Deleted { id: id.to_string() });
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppContext(pub AppState);

/// Install the shared state for the editor tree and hand it back.
pub fn provide_app_state() -> AppContext {
    let ctx = AppContext(AppState::new());
    provide_context(ctx.clone());
    ctx
}
