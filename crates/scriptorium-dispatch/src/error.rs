/// Errors from the dispatch layer itself.
///
/// Failures raised by a dispatched operation are not represented here: they
/// travel back to the caller inside the operation's own return type.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("document owner unavailable")]
    OwnerUnavailable,
    #[error("dispatch re-entered from inside a running operation")]
    Reentrant,
    #[error("owner thread panicked")]
    OwnerPanicked,
    #[error("failed to spawn owner thread: {0}")]
    Spawn(#[from] std::io::Error),
}
