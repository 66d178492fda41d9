//! MCP request types.
//!
//! Argument names are camelCase on the wire.

use rmcp::schemars;
use serde::Deserialize;

/// Open a file from disk.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOpenRequest {
    /// Path of the file to open
    #[schemars(description = "The full path of the file to open.")]
    pub file_path: String,
}

/// Save the document, optionally under a new path.
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSaveRequest {
    /// Target path; omitted means the current path
    #[schemars(description = "Optional file path to save to. If omitted, saves to the current path.")]
    pub file_path: Option<String>,
}

/// Replace the entire document text.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetTextRequest {
    #[schemars(description = "The new text content for the document.")]
    pub text: String,
}

/// Insert text at a character offset.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InsertTextRequest {
    #[schemars(description = "The text to insert.")]
    pub text: String,
    /// Character offset, 0 through the document length
    #[schemars(description = "The character position at which to insert the text (0-based).")]
    pub position: i64,
}

/// Replace the selected text.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceSelectionRequest {
    #[schemars(description = "The text to replace the selection with.")]
    pub new_text: String,
}

/// Select a character range.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetSelectionRequest {
    #[schemars(description = "Character offset where the selection starts (0-based).")]
    pub start: i64,
    #[schemars(description = "Number of characters to select. 0 places the caret.")]
    pub length: i64,
}
