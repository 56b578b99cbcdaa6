use crate::models::{Block, Document};
use crate::sync::autosave::DEFAULT_DEBOUNCE_MS;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    pub(crate) fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        let text = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("").to_string()
        } else {
            body
        };
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {text}"),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EnvConfig {
    pub api_url: String,
    pub autosave_ms: u32,
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self {
            api_url: "http://localhost:6689".to_string(),
            autosave_ms: DEFAULT_DEBOUNCE_MS,
        };

        // Both `window.ENV.API_URL` and the lowercase `window.ENV.api_url` are accepted.
        let Some(env) = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object())
        else {
            return cfg;
        };

        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| js_sys::Reflect::get(&env, &(*k).into()).ok())
                .find(|v| !v.is_undefined() && !v.is_null())
        };

        if let Some(url) = get(&["API_URL", "api_url"]).and_then(|v| v.as_string()) {
            cfg.api_url = url;
        }
        if let Some(ms) = get(&["AUTOSAVE_MS", "autosave_ms"]).and_then(|v| v.as_f64()) {
            if ms >= 0.0 {
                cfg.autosave_ms = ms as u32;
            }
        }

        cfg
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateDocumentRequest {
    pub title: String,
}

/// Body of `PUT /api/documents/{id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UpdateDocumentRequest {
    pub title: String,

    /// Legacy plain-text rendition: block contents joined by newlines.
    pub content: String,

    pub blocks: Vec<Block>,
}

/// Persistence seam used by the autosave driver.
///
/// Futures are not `Send`; everything runs on the browser's single thread.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn get_document(&self, id: &str) -> ApiResult<Document>;
    async fn update_document(&self, id: &str, body: &UpdateDocumentRequest) -> ApiResult<Document>;
}

#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn with_auth_headers(
        mut req: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    pub(crate) fn document_path(id: &str, suffix: &str) -> String {
        format!("/api/documents/{}{}", urlencoding::encode(id), suffix)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> ApiResult<reqwest::Response> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.request(method, url);
        req = Self::with_auth_headers(req, self.token.as_deref());

        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            Ok(res)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Request failed"))
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> ApiResult<T> {
        let res = self.send(method, path, body).await?;
        res.json().await.map_err(ApiError::parse)
    }

    /// Like `request`, for endpoints whose response body is irrelevant.
    async fn request_empty(&self, method: reqwest::Method, path: &str) -> ApiResult<()> {
        self.send(method, path, None::<&()>).await.map(|_| ())
    }

    pub async fn list_documents(&self) -> ApiResult<Vec<Document>> {
        let data: serde_json::Value = self
            .request(reqwest::Method::GET, "/api/documents", None::<&()>)
            .await?;
        Self::parse_document_list_response(data)
    }

    pub async fn create_document(&self, title: &str) -> ApiResult<Document> {
        self.request(
            reqwest::Method::POST,
            "/api/documents",
            Some(&CreateDocumentRequest {
                title: title.to_string(),
            }),
        )
        .await
    }

    pub async fn get_document(&self, id: &str) -> ApiResult<Document> {
        self.request(reqwest::Method::GET, &Self::document_path(id, ""), None::<&()>)
            .await
    }

    pub async fn update_document(
        &self,
        id: &str,
        body: &UpdateDocumentRequest,
    ) -> ApiResult<Document> {
        self.request(reqwest::Method::PUT, &Self::document_path(id, ""), Some(body))
            .await
    }

    /// Move to trash.
    pub async fn delete_document(&self, id: &str) -> ApiResult<()> {
        self.request_empty(reqwest::Method::DELETE, &Self::document_path(id, ""))
            .await
    }

    pub async fn restore_document(&self, id: &str) -> ApiResult<()> {
        self.request_empty(reqwest::Method::POST, &Self::document_path(id, "/restore"))
            .await
    }

    pub async fn delete_document_permanently(&self, id: &str) -> ApiResult<()> {
        self.request_empty(reqwest::Method::DELETE, &Self::document_path(id, "/permanent"))
            .await
    }

    /// The list endpoint has been seen both as a bare array and wrapped in `documents`.
    pub(crate) fn parse_document_list_response(data: serde_json::Value) -> ApiResult<Vec<Document>> {
        let list = match data {
            serde_json::Value::Array(items) => serde_json::Value::Array(items),
            serde_json::Value::Object(mut m) => m
                .remove("documents")
                .unwrap_or(serde_json::Value::Array(vec![])),
            _ => serde_json::Value::Array(vec![]),
        };
        serde_json::from_value(list).map_err(ApiError::parse)
    }
}

impl DocumentStore for ApiClient {
    async fn get_document(&self, id: &str) -> ApiResult<Document> {
        ApiClient::get_document(self, id).await
    }

    async fn update_document(&self, id: &str, body: &UpdateDocumentRequest) -> ApiResult<Document> {
        ApiClient::update_document(self, id, body).await
    }
}
