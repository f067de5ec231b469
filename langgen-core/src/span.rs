//! Source locations for DSL text.

use serde::{Deserialize, Serialize};

/// Identifies one piece of DSL text, e.g. the body of one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// Byte range `[start, end)` inside a `FileId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub file_id: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: FileId, start: u32, end: u32) -> Self {
        Span {
            file_id,
            start,
            end,
        }
    }
}
