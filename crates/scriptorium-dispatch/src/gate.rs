//! One-shot startup rendezvous between the owner and its listeners.
//!
//! The owner sets the signal exactly once, after its state exists. A listener
//! waits exactly once before it starts serving. Both halves are consumed by
//! use, so the gate cannot be reset or reused.

use tokio::sync::oneshot;

use crate::DispatchError;

/// Create a connected signal/wait pair.
pub fn startup_gate() -> (ReadySignal, ReadyWait) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal { tx }, ReadyWait { rx })
}

/// Setter half, held by the owner's initialization path.
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<()>,
}

impl ReadySignal {
    /// Mark the owner as ready. Dropping without calling this tells the
    /// waiting side the owner never came up.
    pub fn set(self) {
        // Receiver gone means nobody is waiting any more; nothing to report.
        let _ = self.tx.send(());
    }
}

/// Waiting half, held by the listener startup path.
#[derive(Debug)]
pub struct ReadyWait {
    rx: oneshot::Receiver<()>,
}

impl ReadyWait {
    /// Block the current thread until the owner is ready.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`ReadyWait::wait_async`] there.
    pub fn wait(self) -> Result<(), DispatchError> {
        self.rx
            .blocking_recv()
            .map_err(|_| DispatchError::OwnerUnavailable)
    }

    /// Await readiness from async code.
    pub async fn wait_async(self) -> Result<(), DispatchError> {
        self.rx.await.map_err(|_| DispatchError::OwnerUnavailable)
    }
}
