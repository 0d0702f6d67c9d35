//! NDJSON export parsing.

use crate::document::Document;
use crate::error::ProtocolResult;

/// Parses one line of a dataset export.
///
/// Blank lines yield `Ok(None)`.
pub fn parse_export_line(line: &str) -> ProtocolResult<Option<Document>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(line)?;
    Document::from_value(value).map(Some)
}
