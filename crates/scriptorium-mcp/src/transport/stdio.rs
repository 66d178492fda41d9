//! Local-stream listener: newline-delimited JSON-RPC over stdin/stdout.

use rmcp::{
    RoleServer, ServiceExt,
    service::QuitReason,
    transport::{IntoTransport, stdio},
};
use scriptorium_editor::EditorHandle;
use tokio_util::sync::CancellationToken;

use crate::EditorMcp;

/// Serves one MCP session on the process's stdin/stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioListener;

impl StdioListener {
    /// Serve until the peer closes the stream or `shutdown` fires.
    pub async fn serve(self, editor: EditorHandle, shutdown: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("MCP server listening on stdio");
        let reason = serve_transport(EditorMcp::new(editor), stdio(), shutdown).await?;
        tracing::info!(?reason, "stdio session ended");
        Ok(())
    }
}

/// Run `server` over any byte transport until it ends or `shutdown` fires.
pub async fn serve_transport<T, E, A>(
    server: EditorMcp,
    transport: T,
    shutdown: CancellationToken,
) -> anyhow::Result<QuitReason>
where
    T: IntoTransport<RoleServer, E, A>,
    E: std::error::Error + Send + Sync + 'static,
{
    let service = server.serve(transport).await.inspect_err(|e| {
        tracing::error!("MCP server error: {:?}", e);
    })?;

    let cancel = service.cancellation_token();
    let watcher = tokio::spawn(async move {
        shutdown.cancelled().await;
        cancel.cancel();
    });

    let reason = service.waiting().await?;
    watcher.abort();
    Ok(reason)
}
