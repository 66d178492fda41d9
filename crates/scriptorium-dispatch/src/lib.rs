//! Single-owner dispatch for state that must live on one thread.
//!
//! A dedicated owner thread holds the state. Any other thread submits a
//! closure through a [`Dispatcher`] and blocks (or awaits) until the owner has
//! run it. Calls are executed strictly one at a time, in the order they were
//! enqueued, which linearizes every mutation without a lock on the state.
//!
//! ```text
//!   Dispatcher (Send+Sync)        mpsc        owner thread (!Send state ok)
//!   ┌──────────────────────┐  ──────────▶  ┌──────────────────────────────┐
//!   │ .dispatch(|s| ...)   │   PendingCall │ init() -> S                  │
//!   │ .dispatch_async(..)  │  ◀──────────  │ run calls one by one         │
//!   └──────────────────────┘    oneshot    │ catch panics, keep serving   │
//!                                          └──────────────────────────────┘
//! ```
//!
//! The [`gate`] module provides the one-shot readiness signal that keeps
//! listeners from serving before the owner exists.

mod error;
pub mod gate;
mod owner;

pub use error::DispatchError;
pub use gate::{ReadySignal, ReadyWait, startup_gate};
pub use owner::{Dispatcher, Owner, OwnerBuilder, OwnerControl, OwnerHandle};
