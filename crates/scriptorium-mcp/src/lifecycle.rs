//! Startup and shutdown coupling between the listener and the document owner.
//!
//! The listener thread does not serve until the owner's startup gate opens.
//! Whichever side stops first takes the other with it: a stopped owner
//! cancels the listener, and a listener that exits (cleanly or not) asks the
//! owner to stop. Ctrl-C stops the listener, which then stops the owner.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use scriptorium_dispatch::{OwnerControl, ReadyWait};
use scriptorium_editor::EditorHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::Listener;

pub const LISTENER_THREAD_NAME: &str = "mcp-listener";

/// How long blocked runtime tasks (stdin readers) get after the listener returns.
const RUNTIME_DRAIN: Duration = Duration::from_millis(500);

/// Spawn the listener on its own thread with its own runtime.
///
/// The returned handle yields the listener's result once it has stopped and
/// the owner has been asked to stop.
pub fn spawn_listener(
    listener: Listener,
    editor: EditorHandle,
    owner: OwnerControl,
    ready: ReadyWait,
) -> std::io::Result<JoinHandle<anyhow::Result<()>>> {
    thread::Builder::new()
        .name(LISTENER_THREAD_NAME.into())
        .spawn(move || {
            let name = listener.name();
            let result = run_listener(listener, editor, &owner, ready);
            match &result {
                Ok(()) => tracing::info!(listener = name, "Listener stopped"),
                Err(e) => tracing::error!(listener = name, "Listener failed: {e:#}"),
            }
            owner.shutdown();
            result
        })
}

fn run_listener(
    listener: Listener,
    editor: EditorHandle,
    owner: &OwnerControl,
    ready: ReadyWait,
) -> anyhow::Result<()> {
    ready.wait().context("document owner failed to start")?;

    let runtime = match listener {
        Listener::Stdio(_) => tokio::runtime::Builder::new_current_thread(),
        Listener::Http(_) => tokio::runtime::Builder::new_multi_thread(),
    }
    .enable_all()
    .build()
    .context("failed to build listener runtime")?;

    let shutdown = owner.stopped_token().child_token();
    let result = runtime.block_on(async {
        let interrupt = tokio::spawn(cancel_on_interrupt(shutdown.clone()));
        let result = listener.serve(editor, shutdown).await;
        interrupt.abort();
        result
    });

    runtime.shutdown_timeout(RUNTIME_DRAIN);
    result
}

async fn cancel_on_interrupt(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Interrupt received, shutting down");
            shutdown.cancel();
        }
        Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {e}"),
    }
}
