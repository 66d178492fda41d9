//! MCP server exposing a single text document.
//!
//! The document lives on its own owner thread (see `scriptorium-editor`);
//! this crate maps MCP tool calls onto it and serves them over one of two
//! transports.
//!
//! ## Module Structure
//!
//! - `models`: Request types for MCP tools
//! - `helpers`: Response text formatting
//! - `auth`: Bearer-token gate for the HTTP transport
//! - `config`: Transport configuration (RON file, env, CLI overrides)
//! - `transport`: stdio and streamable HTTP listeners, TLS material
//! - `lifecycle`: Startup gate and shutdown coupling between listener and owner

pub mod auth;
pub mod config;
mod helpers;
pub mod lifecycle;
mod models;
pub mod transport;

use std::future::Future;
use std::path::PathBuf;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use scriptorium_editor::{EditorError, EditorHandle};
use tracing::Instrument;

pub use helpers::{UNTITLED, format_path, format_selection, format_text};
pub use models::*;

/// MCP server over one editor document.
///
/// Clones share the same document; the HTTP transport builds one per session.
#[derive(Clone)]
pub struct EditorMcp {
    editor: EditorHandle,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for EditorMcp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorMcp")
            .field("editor", &self.editor)
            .field("tool_router", &self.tool_router)
            .finish()
    }
}

impl EditorMcp {
    pub fn new(editor: EditorHandle) -> Self {
        Self {
            editor,
            tool_router: Self::tool_router(),
        }
    }

    /// Names of every registered tool, in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect()
    }

    /// Run one tool body and turn its outcome into a tool result.
    ///
    /// Document errors become `isError` results the caller can read; an
    /// unreachable owner is a server fault and surfaces as a JSON-RPC error.
    async fn run<F>(&self, tool: &'static str, work: F) -> Result<CallToolResult, McpError>
    where
        F: Future<Output = Result<String, EditorError>>,
    {
        let span = tracing::info_span!("tool.call", tool);
        match work.instrument(span).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(EditorError::Dispatch(e)) => {
                tracing::error!(tool, "Document owner unavailable: {e}");
                Err(McpError::internal_error(e.to_string(), None))
            }
            Err(e) => {
                tracing::debug!(tool, kind = %e.kind(), "Tool failed: {e}");
                Ok(CallToolResult::error(vec![Content::text(format!("Error: {e}"))]))
            }
        }
    }
}

#[tool_router]
impl EditorMcp {
    // ========================================================================
    // File lifecycle
    // ========================================================================

    #[tool(
        name = "editor_document_new",
        description = "Create a new empty document in the editor, discarding the current content. The new document has no file path."
    )]
    async fn document_new(&self) -> Result<CallToolResult, McpError> {
        self.run("editor_document_new", async {
            self.editor.new_document().await?;
            Ok("New document created.".to_string())
        })
        .await
    }

    #[tool(
        name = "editor_document_open",
        description = "Open a text file from disk into the editor, replacing the current document."
    )]
    async fn document_open(
        &self,
        Parameters(req): Parameters<DocumentOpenRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("editor_document_open", async {
            let opened = self.editor.open(req.file_path).await?;
            Ok(format!("Opened: {}", opened.display()))
        })
        .await
    }

    #[tool(
        name = "editor_document_save",
        description = "Save the current document to disk. Uses the current file path unless a new one is given."
    )]
    async fn document_save(
        &self,
        Parameters(req): Parameters<DocumentSaveRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("editor_document_save", async {
            let target = req.file_path.filter(|p| !p.is_empty()).map(PathBuf::from);
            let saved = self.editor.save(target).await?;
            Ok(format!("Saved: {}", saved.display()))
        })
        .await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    #[tool(
        name = "editor_get_text",
        description = "Get the full text of the current document along with its file path, modified state and length."
    )]
    async fn get_text(&self) -> Result<CallToolResult, McpError> {
        self.run("editor_get_text", async {
            Ok(format_text(&self.editor.snapshot().await?))
        })
        .await
    }

    #[tool(
        name = "editor_get_selection",
        description = "Get the currently selected text and its start position and length."
    )]
    async fn get_selection(&self) -> Result<CallToolResult, McpError> {
        self.run("editor_get_selection", async {
            Ok(format_selection(&self.editor.selection().await?))
        })
        .await
    }

    #[tool(
        name = "editor_get_current_path",
        description = "Get the file path of the current document, or 'untitled' if it has never been saved."
    )]
    async fn get_current_path(&self) -> Result<CallToolResult, McpError> {
        self.run("editor_get_current_path", async {
            Ok(format_path(self.editor.current_path().await?.as_deref()))
        })
        .await
    }

    #[tool(
        name = "editor_get_dirty",
        description = "Check whether the current document has unsaved changes. Returns true or false."
    )]
    async fn get_dirty(&self) -> Result<CallToolResult, McpError> {
        self.run("editor_get_dirty", async {
            Ok(self.editor.is_dirty().await?.to_string())
        })
        .await
    }

    // ========================================================================
    // Edits
    // ========================================================================

    #[tool(
        name = "editor_set_text",
        description = "Replace the entire text of the current document."
    )]
    async fn set_text(
        &self,
        Parameters(req): Parameters<SetTextRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("editor_set_text", async {
            let len = self.editor.set_text(req.text).await?;
            Ok(format!("Text replaced. New length: {len} chars."))
        })
        .await
    }

    #[tool(
        name = "editor_insert_text",
        description = "Insert text at a character position in the current document. The caret moves to the end of the inserted text."
    )]
    async fn insert_text(
        &self,
        Parameters(req): Parameters<InsertTextRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("editor_insert_text", async {
            let position = req.position;
            let inserted = self.editor.insert_text(req.text, position).await?;
            Ok(format!("Inserted {inserted} chars at position {position}."))
        })
        .await
    }

    #[tool(
        name = "editor_set_selection",
        description = "Select a range of characters in the current document. A length of 0 places the caret without selecting."
    )]
    async fn set_selection(
        &self,
        Parameters(req): Parameters<SetSelectionRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("editor_set_selection", async {
            let selection = self.editor.select(req.start, req.length).await?;
            Ok(format!(
                "Selected {} chars at position {}.",
                selection.length, selection.start
            ))
        })
        .await
    }

    #[tool(
        name = "editor_replace_selection",
        description = "Replace the currently selected text with new text. Fails if nothing is selected."
    )]
    async fn replace_selection(
        &self,
        Parameters(req): Parameters<ReplaceSelectionRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run("editor_replace_selection", async {
            let len = self.editor.replace_selection(req.new_text).await?;
            Ok(format!("Selection replaced with {len} chars."))
        })
        .await
    }
}

#[tool_handler]
impl ServerHandler for EditorMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "Scriptorium text editor. Tools operate on a single open document: open, edit, select and save it.",
        )
    }
}
