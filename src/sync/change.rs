use crate::models::Block;

/// Whether `(title, blocks)` differs from the last persisted pair.
///
/// Blocks are compared field by field, which is the same as comparing their
/// serialized form.
pub fn has_changed(
    title: &str,
    blocks: &[Block],
    original_title: &str,
    original_blocks: &[Block],
) -> bool {
    title != original_title || blocks != original_blocks
}

/// The last `(title, blocks)` pair the engine believes the server holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Snapshot {
    pub fn new(title: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            title: title.into(),
            blocks,
        }
    }

    pub fn differs_from(&self, title: &str, blocks: &[Block]) -> bool {
        has_changed(title, blocks, &self.title, &self.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockType;

    fn blocks() -> Vec<Block> {
        ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, c)| Block {
                id: format!("b{i}"),
                block_type: BlockType::Text,
                content: c.to_string(),
                position: i,
                document_id: "doc".to_string(),
                created_at: String::new(),
                updated_at: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_has_changed_is_reflexive() {
        let b = blocks();
        assert!(!has_changed("T", &b, "T", &b));
        assert!(!has_changed("", &[], "", &[]));
    }

    #[test]
    fn test_any_single_content_change_is_detected() {
        let original = blocks();
        for i in 0..original.len() {
            let mut edited = original.clone();
            edited[i].content.push('!');
            assert!(has_changed("T", &edited, "T", &original));
        }
    }

    #[test]
    fn test_title_order_and_type_changes_are_detected() {
        let original = blocks();
        assert!(has_changed("T2", &original, "T", &original));

        let mut swapped = original.clone();
        swapped.swap(0, 1);
        assert!(has_changed("T", &swapped, "T", &original));

        let mut retyped = original.clone();
        retyped[2].block_type = BlockType::Code;
        assert!(has_changed("T", &retyped, "T", &original));

        assert!(has_changed("T", &original[..2], "T", &original));
    }

    #[test]
    fn test_snapshot_differs_from() {
        let snap = Snapshot::new("T", blocks());
        assert!(!snap.differs_from("T", &blocks()));
        assert!(snap.differs_from("", &blocks()));
    }
}
