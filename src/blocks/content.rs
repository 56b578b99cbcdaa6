use crate::blocks::algebra::renumber;
use crate::models::{Block, BlockRecord, BlockType};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Structured payload stored (serialized) in image and file blocks.
///
/// Only `src` is required; the upload service decides what else to return.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

pub fn parse_media(content: &str) -> Option<MediaContent> {
    if content.trim().is_empty() {
        return None;
    }
    serde_json::from_str(content).ok()
}

pub fn media_content_string(media: &MediaContent) -> String {
    serde_json::to_string(media).unwrap_or_default()
}

/// Unknown or missing type names degrade to plain text.
pub(crate) fn normalize_block_type(raw: &str) -> BlockType {
    BlockType::from_str(raw.trim()).unwrap_or_default()
}

/// Canonical string form of a block's content.
///
/// Media blocks frequently arrive with an object payload; everything is
/// flattened to a string so equality checks see one representation.
pub fn normalize_content(block_type: BlockType, value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => {
            if !block_type.is_media() {
                log::debug!("non-string content on {block_type} block, serializing");
            }
            other.to_string()
        }
    }
}

pub fn normalize_block(record: &BlockRecord, document_id: &str) -> Block {
    let block_type = normalize_block_type(&record.block_type);
    Block {
        id: record.id.clone(),
        block_type,
        content: normalize_content(block_type, &record.content),
        position: usize::try_from(record.position.max(0)).unwrap_or(usize::MAX),
        document_id: record
            .document_id
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| document_id.to_string()),
        created_at: record.created_at.clone().unwrap_or_default(),
        updated_at: record.updated_at.clone().unwrap_or_default(),
    }
}

/// Turn server records into the engine's block sequence: sorted by position,
/// normalized, and renumbered to `0..n-1`.
pub fn hydrate(records: &[BlockRecord], document_id: &str) -> Vec<Block> {
    let mut sorted: Vec<&BlockRecord> = records.iter().collect();
    // Stable sort keeps server order for duplicate positions.
    sorted.sort_by_key(|r| r.position);
    renumber(
        sorted
            .into_iter()
            .map(|r| normalize_block(r, document_id))
            .collect(),
    )
}
