pub mod algebra;
pub mod collection;
pub mod content;

pub use collection::BlockCollection;
pub use content::{media_content_string, normalize_block, parse_media, MediaContent};
