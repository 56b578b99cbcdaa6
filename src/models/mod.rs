use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Closed set of block variants.
///
/// The wire format (and `Display`) is the lowercase variant name, e.g. `heading1`.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BlockType {
    #[default]
    Text,
    Heading1,
    Heading2,
    Heading3,
    Bullet,
    Numbered,
    Quote,
    Code,
    Image,
    File,
}

impl BlockType {
    /// Image and file blocks carry a serialized JSON payload instead of text.
    pub fn is_media(self) -> bool {
        matches!(self, BlockType::Image | BlockType::File)
    }
}

/// One unit of document content, as the engine holds it.
///
/// `content` is always a string; structured payloads are serialized before
/// they get here (see `blocks::content`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,

    #[serde(rename = "type")]
    pub block_type: BlockType,

    pub content: String,

    /// Zero-based index; always equals the block's index in its document.
    pub position: usize,

    pub document_id: String,

    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A block exactly as the backend sent it.
///
/// Kept loose on purpose: `type` may be any string and `content` any JSON value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub id: String,

    #[serde(rename = "type", default)]
    pub block_type: String,

    #[serde(default)]
    pub content: serde_json::Value,

    #[serde(default)]
    pub position: i64,

    #[serde(default)]
    pub document_id: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<&Block> for BlockRecord {
    fn from(b: &Block) -> Self {
        Self {
            id: b.id.clone(),
            block_type: b.block_type.to_string(),
            content: serde_json::Value::String(b.content.clone()),
            position: b.position as i64,
            document_id: Some(b.document_id.clone()),
            created_at: Some(b.created_at.clone()),
            updated_at: Some(b.updated_at.clone()),
        }
    }
}

/// Document as returned by `GET`/`PUT /api/documents/{id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Legacy plain-text rendition (newline-joined block contents).
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub blocks: Vec<BlockRecord>,

    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,

    /// Set when the document sits in the trash.
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl Document {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fire-and-forget signal for sibling UI (document list, sidebar).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentEvent {
    Updated { id: String },
    Deleted { id: String },
}

impl DocumentEvent {
    pub fn document_id(&self) -> &str {
        match self {
            DocumentEvent::Updated { id } | DocumentEvent::Deleted { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_block_type_wire_names_match_display() {
        for t in BlockType::iter() {
            let wire = serde_json::to_value(t).expect("should serialize");
            assert_eq!(wire, serde_json::Value::String(t.to_string()));
        }
        assert_eq!(BlockType::Heading2.as_ref(), "heading2");
    }

    #[test]
    fn test_block_type_parse_is_case_insensitive() {
        assert_eq!(BlockType::from_str("Numbered").ok(), Some(BlockType::Numbered));
        assert!(BlockType::from_str("table").is_err());
    }

    #[test]
    fn test_block_serializes_camel_case() {
        let b = Block {
            id: "b1".to_string(),
            block_type: BlockType::Quote,
            content: "hi".to_string(),
            position: 2,
            document_id: "d1".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let v = serde_json::to_value(&b).expect("should serialize");
        assert_eq!(v["type"], "quote");
        assert_eq!(v["documentId"], "d1");
        assert_eq!(v["position"], 2);
        assert!(v.get("block_type").is_none());
    }

    #[test]
    fn test_document_contract_deserialize_with_structured_content() {
        let json = r#"{
            "id": "doc-1",
            "title": "Plans",
            "blocks": [
                {"id": "b1", "type": "image", "position": 0,
                 "content": {"src": "https://cdn/x.png", "caption": "x"}},
                {"id": "b2", "type": "text", "position": 1, "content": "hello",
                 "documentId": "doc-1", "createdAt": "2024-01-01T00:00:00Z"}
            ],
            "deletedAt": null
        }"#;
        let doc: Document = serde_json::from_str(json).expect("document should parse");
        assert_eq!(doc.blocks.len(), 2);
        assert!(doc.blocks[0].content.is_object());
        assert_eq!(doc.blocks[1].document_id.as_deref(), Some("doc-1"));
        assert!(!doc.is_trashed());
    }

    #[test]
    fn test_document_event_id() {
        let e = DocumentEvent::Deleted {
            id: "d9".to_string(),
        };
        assert_eq!(e.document_id(), "d9");
    }
}
