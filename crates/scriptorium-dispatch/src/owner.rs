//! The owner thread and the handles that talk to it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::DispatchError;
use crate::gate::{ReadySignal, ReadyWait, startup_gate};

type PanicPayload = Box<dyn Any + Send + 'static>;
type Outcome<T> = Result<T, PanicPayload>;
type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;
type ReadyHook<S> = Box<dyn FnOnce(&Dispatcher<S>) + Send + 'static>;

thread_local! {
    /// State of the owner running on this thread. Borrowed mutably for the
    /// duration of each operation.
    static OWNED: RefCell<Option<Box<dyn Any>>> = const { RefCell::new(None) };
}

// ============================================================================
// PendingCall (internal)
// ============================================================================

/// One in-flight marshaled request.
///
/// The job owns the operation, its captured arguments, and the oneshot reply
/// sender. It is consumed exactly once by the owner; if it is dropped unrun
/// the caller observes [`DispatchError::OwnerUnavailable`].
struct PendingCall<S> {
    label: &'static str,
    job: Job<S>,
}

enum OwnerMessage<S> {
    Call(PendingCall<S>),
    Stop,
}

// ============================================================================
// Dispatcher (Send + Sync public API)
// ============================================================================

/// Send+Sync handle that runs closures on the owner thread.
///
/// Cheap to clone. Every clone feeds the same FIFO queue, so calls from any
/// number of threads are executed one at a time in enqueue order.
pub struct Dispatcher<S> {
    tx: mpsc::UnboundedSender<OwnerMessage<S>>,
    owner: ThreadId,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            owner: self.owner,
        }
    }
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("owner", &self.owner)
            .field("available", &!self.tx.is_closed())
            .finish()
    }
}

impl<S: 'static> Dispatcher<S> {
    /// Run `op` on the owner thread and block until it completes.
    ///
    /// On the owner thread itself the operation runs inline. A panic inside
    /// `op` is caught on the owner thread and resumed here with the original
    /// payload; the owner keeps serving.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`Dispatcher::dispatch_async`] there.
    pub fn dispatch<T, F>(&self, label: &'static str, op: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.on_owner_thread() {
            return run_inline(op);
        }
        let rx = self.enqueue(label, op)?;
        settle(rx.blocking_recv())
    }

    /// Async variant of [`Dispatcher::dispatch`]. The calling task is
    /// suspended, not the worker thread.
    pub async fn dispatch_async<T, F>(&self, label: &'static str, op: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.on_owner_thread() {
            return run_inline(op);
        }
        let rx = self.enqueue(label, op)?;
        settle(rx.await)
    }

    /// Whether the current thread is the owner thread.
    pub fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// False once the owner loop has exited.
    pub fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }

    fn enqueue<T, F>(&self, label: &'static str, op: F) -> Result<oneshot::Receiver<Outcome<T>>, DispatchError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |state: &mut S| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(state)));
            // Caller gave up waiting; the result has nowhere to go.
            let _ = reply.send(outcome);
        });
        self.tx
            .send(OwnerMessage::Call(PendingCall { label, job }))
            .map_err(|_| DispatchError::OwnerUnavailable)?;
        Ok(rx)
    }
}

fn settle<T>(received: Result<Outcome<T>, oneshot::error::RecvError>) -> Result<T, DispatchError> {
    match received {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => panic::resume_unwind(payload),
        Err(_) => Err(DispatchError::OwnerUnavailable),
    }
}

fn run_inline<S: 'static, T>(op: impl FnOnce(&mut S) -> T) -> Result<T, DispatchError> {
    OWNED.with(|slot| {
        let mut guard = slot.try_borrow_mut().map_err(|_| DispatchError::Reentrant)?;
        let state = guard
            .as_mut()
            .and_then(|owned| owned.downcast_mut::<S>())
            .ok_or(DispatchError::OwnerUnavailable)?;
        Ok(op(state))
    })
}

// ============================================================================
// Owner lifecycle
// ============================================================================

/// Entry point for spawning an owner thread.
pub struct Owner;

impl Owner {
    /// Start configuring an owner thread with the given thread name.
    pub fn builder<S: 'static>(name: impl Into<String>) -> OwnerBuilder<S> {
        OwnerBuilder {
            name: name.into(),
            on_ready: None,
        }
    }
}

/// Configures and spawns an owner thread.
pub struct OwnerBuilder<S> {
    name: String,
    on_ready: Option<ReadyHook<S>>,
}

impl<S: 'static> OwnerBuilder<S> {
    /// Run `hook` on the owner thread after the state exists and before the
    /// startup gate opens. Dispatches made from the hook run inline.
    pub fn on_ready(mut self, hook: impl FnOnce(&Dispatcher<S>) + Send + 'static) -> Self {
        self.on_ready = Some(Box::new(hook));
        self
    }

    /// Spawn the owner thread. `init` builds the state on that thread, so the
    /// state type itself does not have to be `Send`.
    pub fn spawn<I>(self, init: I) -> Result<(Dispatcher<S>, OwnerHandle, ReadyWait), DispatchError>
    where
        I: FnOnce() -> S + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready, wait) = startup_gate();
        let stopped = CancellationToken::new();

        let thread_tx = tx.clone();
        let thread_stopped = stopped.clone();
        let on_ready = self.on_ready;
        let thread = thread::Builder::new().name(self.name).spawn(move || {
            let _stopped = thread_stopped.drop_guard();
            let local = Dispatcher {
                tx: thread_tx,
                owner: thread::current().id(),
            };
            run_owner(init, on_ready, local, rx, ready);
        })?;

        let dispatcher = Dispatcher {
            tx: tx.clone(),
            owner: thread.thread().id(),
        };
        let control = OwnerControl {
            stop: Arc::new(move || tx.send(OwnerMessage::Stop).is_ok()),
            stopped,
        };
        Ok((dispatcher, OwnerHandle { thread, control }, wait))
    }
}

fn run_owner<S: 'static>(
    init: impl FnOnce() -> S,
    on_ready: Option<ReadyHook<S>>,
    local: Dispatcher<S>,
    mut rx: mpsc::UnboundedReceiver<OwnerMessage<S>>,
    ready: ReadySignal,
) {
    let state = init();
    OWNED.with(|slot| *slot.borrow_mut() = Some(Box::new(state) as Box<dyn Any>));

    if let Some(hook) = on_ready {
        hook(&local);
    }
    // The owner must not keep its own queue alive.
    drop(local);
    ready.set();
    log::debug!("owner thread ready");

    while let Some(message) = rx.blocking_recv() {
        match message {
            OwnerMessage::Call(call) => {
                log::trace!("owner running {}", call.label);
                OWNED.with(|slot| {
                    let mut guard = slot.borrow_mut();
                    if let Some(state) = guard.as_mut().and_then(|owned| owned.downcast_mut::<S>()) {
                        (call.job)(state);
                    }
                });
            }
            OwnerMessage::Stop => {
                log::info!("owner thread stopping");
                break;
            }
        }
    }

    // Queued calls are dropped unrun; their callers see OwnerUnavailable.
    rx.close();
    drop(rx);
    let state = OWNED.with(|slot| slot.borrow_mut().take());
    drop(state);
    log::debug!("owner thread exited");
}

/// Owns the owner thread's join handle.
pub struct OwnerHandle {
    thread: JoinHandle<()>,
    control: OwnerControl,
}

impl OwnerHandle {
    /// A cloneable control for other threads (listeners, signal handlers).
    pub fn control(&self) -> OwnerControl {
        self.control.clone()
    }

    /// Ask the owner to stop after the calls already queued.
    pub fn shutdown(&self) {
        self.control.shutdown();
    }

    /// Wait for the owner thread to exit.
    pub fn join(self) -> Result<(), DispatchError> {
        self.thread.join().map_err(|_| DispatchError::OwnerPanicked)
    }
}

impl fmt::Debug for OwnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerHandle")
            .field("thread", &self.thread.thread().name())
            .field("stopped", &self.control.is_stopped())
            .finish()
    }
}

/// Shutdown control shared between the owner and its listeners.
#[derive(Clone)]
pub struct OwnerControl {
    stop: Arc<dyn Fn() -> bool + Send + Sync>,
    stopped: CancellationToken,
}

impl OwnerControl {
    /// Ask the owner to stop after the calls already queued. Idempotent.
    pub fn shutdown(&self) {
        if !(self.stop)() {
            log::debug!("owner already stopped");
        }
    }

    /// Token cancelled when the owner loop exits, for whatever reason.
    pub fn stopped_token(&self) -> CancellationToken {
        self.stopped.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

impl fmt::Debug for OwnerControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerControl")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn spawn_counter() -> (Dispatcher<u64>, OwnerHandle) {
        let (dispatcher, handle, ready) = Owner::builder("test-owner").spawn(|| 0u64).unwrap();
        ready.wait().unwrap();
        (dispatcher, handle)
    }

    #[test]
    fn test_dispatch_returns_value_and_mutates_state() {
        let (dispatcher, handle) = spawn_counter();

        let after = dispatcher
            .dispatch("incr", |n: &mut u64| {
                *n += 5;
                *n
            })
            .unwrap();
        assert_eq!(after, 5);
        assert_eq!(dispatcher.dispatch("read", |n: &mut u64| *n).unwrap(), 5);

        handle.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_operation_error_kind_is_preserved() {
        let (dispatcher, handle) = spawn_counter();

        let result = dispatcher
            .dispatch("fail", |_: &mut u64| -> std::io::Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "nope"))
            })
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);

        handle.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_panic_is_resumed_on_caller_and_owner_survives() {
        let (dispatcher, handle) = spawn_counter();

        let caught = std::panic::catch_unwind(AssertUnwindSafe(|| {
            dispatcher.dispatch("boom", |_: &mut u64| -> () { panic!("boom") })
        }));
        let payload = caught.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));

        // Still serving after the panic.
        assert_eq!(dispatcher.dispatch("read", |n: &mut u64| *n).unwrap(), 0);

        handle.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_dispatch_after_shutdown_fails_fast() {
        let (dispatcher, handle) = spawn_counter();
        let control = handle.control();
        let stopped = control.stopped_token();

        handle.shutdown();
        handle.join().unwrap();

        assert!(stopped.is_cancelled());
        assert!(control.is_stopped());
        assert!(!dispatcher.is_available());
        assert!(matches!(
            dispatcher.dispatch("late", |n: &mut u64| *n),
            Err(DispatchError::OwnerUnavailable)
        ));
        // Second shutdown is a no-op.
        control.shutdown();
    }

    #[test]
    fn test_nested_dispatch_is_rejected() {
        let (dispatcher, handle) = spawn_counter();
        let inner = dispatcher.clone();

        let nested = dispatcher
            .dispatch("outer", move |_: &mut u64| {
                inner.dispatch("inner", |n: &mut u64| *n).map(|_| ())
            })
            .unwrap();
        assert!(matches!(nested, Err(DispatchError::Reentrant)));

        handle.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_on_ready_dispatches_inline() {
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        let (dispatcher, handle, ready) = Owner::builder("ready-owner")
            .on_ready(move |d: &Dispatcher<Vec<&'static str>>| {
                let inline = d.on_owner_thread();
                let pushed = d.dispatch("seed", |log: &mut Vec<&'static str>| {
                    log.push("seed");
                    log.len()
                });
                seen_tx.send((inline, pushed.ok())).unwrap();
            })
            .spawn(Vec::new)
            .unwrap();
        ready.wait().unwrap();

        assert_eq!(seen_rx.recv().unwrap(), (true, Some(1)));
        assert!(!dispatcher.on_owner_thread());
        assert_eq!(dispatcher.dispatch("read", |log: &mut Vec<&'static str>| log.clone()).unwrap(), vec!["seed"]);

        handle.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_state_need_not_be_send() {
        let (dispatcher, handle, ready) = Owner::builder("rc-owner")
            .spawn(|| Rc::new(Cell::new(1u32)))
            .unwrap();
        ready.wait().unwrap();

        let value = dispatcher
            .dispatch("bump", |cell: &mut Rc<Cell<u32>>| {
                cell.set(cell.get() + 1);
                cell.get()
            })
            .unwrap();
        assert_eq!(value, 2);

        handle.shutdown();
        handle.join().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_async() {
        let (dispatcher, handle, ready) = Owner::builder("async-owner").spawn(|| 0u64).unwrap();
        ready.wait_async().await.unwrap();

        let value = dispatcher
            .dispatch_async("incr", |n: &mut u64| {
                *n += 1;
                *n
            })
            .await
            .unwrap();
        assert_eq!(value, 1);

        handle.shutdown();
        handle.join().unwrap();
    }
}
