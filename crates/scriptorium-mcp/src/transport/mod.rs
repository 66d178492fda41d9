//! Listeners that carry MCP traffic to the tool registry.

pub mod http;
pub mod stdio;
pub mod tls;

use scriptorium_editor::EditorHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{TransportConfig, TransportMode};

pub use http::{BindTarget, HttpError, HttpListener, resolve_bind};
pub use stdio::{StdioListener, serve_transport};
pub use tls::{TlsError, TlsMaterial};

/// The configured listener.
#[derive(Debug, Clone)]
pub enum Listener {
    Stdio(StdioListener),
    Http(HttpListener),
}

impl Listener {
    pub fn from_config(config: &TransportConfig) -> Self {
        match config.mode {
            TransportMode::Stdio => Self::Stdio(StdioListener),
            TransportMode::Http => Self::Http(HttpListener::new(config.http.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::Http(_) => "http",
        }
    }

    /// Serve until the peer goes away, the listener fails, or `shutdown` fires.
    pub async fn serve(self, editor: EditorHandle, shutdown: CancellationToken) -> anyhow::Result<()> {
        match self {
            Self::Stdio(listener) => listener.serve(editor, shutdown).await,
            Self::Http(listener) => Ok(listener.serve(editor, shutdown).await?),
        }
    }
}
