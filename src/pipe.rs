//! Thread-safe FIFO data pipe
//!
//! [`ThreadPipe`] moves items between producer and consumer threads. Every
//! mutation — push, pop, the removal step of a blocking pop, mounting a
//! processor, clearing — runs as a job on one shared [`SerialQueue`], so a
//! pipe needs no lock of its own and all pipes in the process share a total
//! order of operations.
//!
//! # Consumption modes
//!
//! - **Direct**: [`pop`](ThreadPipe::pop) (non-blocking) and
//!   [`block_pop`](ThreadPipe::block_pop) (suspends the caller until data
//!   arrives or the pipe is cleared) remove from the head.
//! - **Bound**: [`mount_processor`](ThreadPipe::mount_processor) redirects
//!   incoming data into fixed-size batches delivered on the processor's own
//!   queue. An exclusive processor locks direct consumers out entirely; a
//!   shared one leaves `pop` working.
//!
//! # Ordering
//!
//! Within one pipe, items come out in push order, whether popped directly or
//! delivered in batches. Across pipes, only operation execution is totally
//! ordered; no relationship holds between different pipes' data.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Sender};

use crate::error::{PipeError, Result};
use crate::list::SpliceList;
use crate::processor::PipeProcessor;
use crate::queue::SerialQueue;

/// Binding state of a pipe, determined by the mounted processor's
/// exclusivity flag at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No processor mounted; direct consumers see all data.
    Unbound,
    /// A non-exclusive processor is mounted; `pop` still returns data.
    BoundShared,
    /// An exclusive processor is mounted; direct consumption is locked out.
    BoundExclusive,
}

/// A mounted processor with its flags frozen at mount time.
struct Mounted<T: Send + 'static> {
    processor: Arc<dyn PipeProcessor<T>>,
    queue: Arc<SerialQueue>,
    batch_size: usize,
    exclusive: bool,
}

/// Pipe state, touched only from the shared serialization queue.
struct PipeInner<T: Send + 'static> {
    /// Buffered items; doubles as the pending-batch accumulator while bound.
    buffer: SpliceList<T>,
    /// Blocked `block_pop` callers in the order they began waiting. Each
    /// entry is a one-shot rendezvous: `Some(item)` serves the waiter,
    /// `None` cancels it.
    waiters: VecDeque<Sender<Option<T>>>,
    processor: Option<Mounted<T>>,
}

impl<T: Send + 'static> PipeInner<T> {
    fn binding(&self) -> BindingState {
        match &self.processor {
            None => BindingState::Unbound,
            Some(m) if m.exclusive => BindingState::BoundExclusive,
            Some(_) => BindingState::BoundShared,
        }
    }

    /// Hands the head item to the oldest live waiter, if both exist.
    ///
    /// Each wakeup consumes exactly one item; an item is never left in the
    /// buffer *and* sent to a waiter, so no waiter can be double-served.
    fn wake_one_waiter(&mut self) {
        while !self.waiters.is_empty() {
            let Some(item) = self.buffer.pop_head() else {
                return;
            };
            let waiter = self
                .waiters
                .pop_front()
                .expect("non-empty waiter queue yielded no waiter");
            match waiter.send(Some(item)) {
                Ok(()) => return,
                Err(err) => {
                    // Waiter vanished before delivery; put the item back
                    // for the next in line.
                    if let Some(item) = err.into_inner() {
                        self.buffer.push_head(item);
                    }
                }
            }
        }
    }

    /// Splits off and dispatches every complete batch in the buffer.
    ///
    /// Dispatch is fire-and-forget onto the processor's queue; the pipe
    /// never waits for `process` to finish. A saturated processor queue
    /// therefore lets the buffer grow without bound — accepted tradeoff.
    fn dispatch_ready_batches(&mut self) {
        while let Some(mounted) = self.processor.as_ref() {
            let n = mounted.batch_size;
            if self.buffer.len() < n {
                return;
            }
            // extract_prefix refuses to take the whole list, so an exact
            // fit takes the buffer itself.
            let batch = if self.buffer.len() == n {
                std::mem::take(&mut self.buffer)
            } else {
                self.buffer
                    .extract_prefix(n)
                    .expect("batch length bounds already checked")
            };
            let processor = Arc::clone(&mounted.processor);
            tracing::trace!(batch_len = n, "dispatching batch to processor queue");
            if mounted
                .queue
                .submit(move || processor.process(batch))
                .is_err()
            {
                tracing::warn!(
                    batch_len = n,
                    "processor queue closed; dropping batch"
                );
                return;
            }
        }
    }

    fn cancel_all_waiters(&mut self) -> usize {
        let woken = self.waiters.len();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(None);
        }
        woken
    }
}

/// An unbounded FIFO pipe between threads.
///
/// # Example
///
/// ```
/// use threadpipe::ThreadPipe;
///
/// let pipe = ThreadPipe::new();
/// pipe.push("A").unwrap();
/// pipe.push("B").unwrap();
///
/// assert_eq!(pipe.pop().unwrap(), Some("A"));
/// assert_eq!(pipe.pop().unwrap(), Some("B"));
/// assert_eq!(pipe.pop().unwrap(), None);
/// ```
pub struct ThreadPipe<T: Send + 'static> {
    queue: Arc<SerialQueue>,
    inner: Arc<Mutex<PipeInner<T>>>,
}

impl<T: Send + 'static> Default for ThreadPipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> ThreadPipe<T> {
    /// Creates an empty pipe on the process-wide shared serialization queue.
    pub fn new() -> Self {
        Self::with_queue(SerialQueue::global())
    }

    /// Creates an empty pipe on the given serialization queue.
    ///
    /// Tests inject a private queue here for deterministic ordering;
    /// production pipes normally share [`SerialQueue::global`].
    pub fn with_queue(queue: Arc<SerialQueue>) -> Self {
        Self {
            queue,
            inner: Arc::new(Mutex::new(PipeInner {
                buffer: SpliceList::new(),
                waiters: VecDeque::new(),
                processor: None,
            })),
        }
    }

    /// The serialization queue this pipe runs its operations on.
    pub fn queue(&self) -> &Arc<SerialQueue> {
        &self.queue
    }

    /// Appends an item to the pipe.
    ///
    /// If a blocking consumer is waiting and the pipe is not bound
    /// exclusively, the oldest waiter is woken with the head item. If a
    /// processor is mounted, the item feeds the pending-batch accumulator
    /// and every complete batch is dispatched.
    ///
    /// Fails only if the serialization queue has shut down.
    pub fn push(&self, item: T) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.run_sync(move || {
            let mut st = inner.lock().expect("pipe state mutex poisoned");
            st.buffer.push_tail(item);
            if st.binding() != BindingState::BoundExclusive {
                st.wake_one_waiter();
            }
            if st.processor.is_some() {
                st.dispatch_ready_batches();
            }
        })
    }

    /// Removes and returns the head item without blocking.
    ///
    /// Returns `Ok(None)` if the pipe is empty, or — regardless of buffered
    /// content — while an exclusive processor is mounted. A shared binding
    /// leaves `pop` behaving as if unbound.
    pub fn pop(&self) -> Result<Option<T>> {
        let inner = Arc::clone(&self.inner);
        self.queue.run_sync(move || {
            let mut st = inner.lock().expect("pipe state mutex poisoned");
            if st.binding() == BindingState::BoundExclusive {
                return None;
            }
            st.buffer.pop_head()
        })
    }

    /// Removes and returns the head item, suspending the calling thread
    /// until one is available.
    ///
    /// If data is buffered and the pipe is not bound exclusively, returns
    /// immediately. Otherwise the caller waits until either a push makes an
    /// item available while the pipe is unbound/shared (consuming exactly
    /// one item), or [`clear_pipe`](Self::clear_pipe) cancels the wait —
    /// then `Ok(None)` is returned. Cancellation is a defined result, not
    /// an error. Waiters are served strictly in the order they began
    /// waiting.
    ///
    /// A transition into an exclusive binding does not release waiters
    /// already suspended; only data arrival (after the exclusive binding is
    /// gone), clearing, or pipe teardown does.
    pub fn block_pop(&self) -> Result<Option<T>> {
        let (wake_tx, wake_rx) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let immediate = self.queue.run_sync(move || {
            let mut st = inner.lock().expect("pipe state mutex poisoned");
            if st.binding() != BindingState::BoundExclusive {
                if let Some(item) = st.buffer.pop_head() {
                    return Some(item);
                }
            }
            st.waiters.push_back(wake_tx);
            None
        })?;

        match immediate {
            Some(item) => Ok(Some(item)),
            // A disconnected wake channel means the pipe was torn down;
            // report it as cancellation like any other clear.
            None => Ok(wake_rx.recv().unwrap_or(None)),
        }
    }

    /// Mounts `processor` on the pipe, replacing any existing binding, or
    /// unbinds with `None`.
    ///
    /// The processor's batch size, exclusivity, and clear-on-mount flags
    /// are read here, once, and frozen until the next mount. With
    /// clear-on-mount set, all currently buffered items are discarded;
    /// otherwise already-buffered complete batches are delivered
    /// immediately, before any newly pushed items are considered. A partial
    /// batch keeps accumulating.
    ///
    /// # Errors
    ///
    /// - [`PipeError::InvalidArgument`] if the batch size is zero.
    /// - [`PipeError::StateConflict`] if the processor's queue is the
    ///   pipe's own serialization queue.
    /// - [`PipeError::QueueClosed`] if the pipe has been torn down.
    pub fn mount_processor(&self, processor: Option<Arc<dyn PipeProcessor<T>>>) -> Result<()> {
        let mounted = match processor {
            None => None,
            Some(p) => {
                let batch_size = p.batch_size();
                if batch_size == 0 {
                    return Err(PipeError::InvalidArgument(
                        "processor batch size must be greater than zero".to_string(),
                    ));
                }
                let queue = p.process_queue();
                if Arc::ptr_eq(&queue, &self.queue) {
                    return Err(PipeError::StateConflict(
                        "processor queue must be distinct from the pipe's serialization queue"
                            .to_string(),
                    ));
                }
                Some((
                    Mounted {
                        exclusive: p.exclusive(),
                        batch_size,
                        queue,
                        processor: p.clone(),
                    },
                    p.clear_existing(),
                ))
            }
        };

        let inner = Arc::clone(&self.inner);
        self.queue.run_sync(move || {
            let mut st = inner.lock().expect("pipe state mutex poisoned");
            match mounted {
                None => {
                    st.processor = None;
                    tracing::debug!("processor unmounted");
                }
                Some((mounted, clear_existing)) => {
                    let state = if mounted.exclusive {
                        BindingState::BoundExclusive
                    } else {
                        BindingState::BoundShared
                    };
                    st.processor = Some(mounted);
                    if clear_existing {
                        let discarded = st.buffer.len();
                        st.buffer.clear();
                        tracing::debug!(?state, discarded, "processor mounted, buffer discarded");
                    } else {
                        tracing::debug!(?state, buffered = st.buffer.len(), "processor mounted");
                        st.dispatch_ready_batches();
                    }
                }
            }
        })
    }

    /// Discards all buffered items and wakes every blocked
    /// [`block_pop`](Self::block_pop) caller with cancellation.
    ///
    /// The current processor binding is untouched, and batches already
    /// handed to a processor's queue are not recalled.
    pub fn clear_pipe(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.queue.run_sync(move || {
            let mut st = inner.lock().expect("pipe state mutex poisoned");
            let discarded = st.buffer.len();
            st.buffer.clear();
            let woken = st.cancel_all_waiters();
            tracing::debug!(discarded, woken, "pipe cleared");
        })
    }

    /// Current binding state, observed on the serialization queue.
    pub fn binding_state(&self) -> Result<BindingState> {
        let inner = Arc::clone(&self.inner);
        self.queue
            .run_sync(move || inner.lock().expect("pipe state mutex poisoned").binding())
    }

    /// Number of currently buffered items, observed on the serialization
    /// queue. Snapshot only — stale by the time the caller sees it.
    pub fn len(&self) -> Result<usize> {
        let inner = Arc::clone(&self.inner);
        self.queue
            .run_sync(move || inner.lock().expect("pipe state mutex poisoned").buffer.len())
    }

    /// Returns `true` if no items are buffered. Snapshot only.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T: Send + 'static> Drop for ThreadPipe<T> {
    fn drop(&mut self) {
        // A blocked waiter borrows the pipe, so none can exist once drop
        // runs; any still-registered wake channel is torn down with the
        // state and reports as cancellation. Releasing the buffer on the
        // queue keeps teardown ordered after in-flight operations.
        let inner = Arc::clone(&self.inner);
        let _ = self.queue.submit(move || {
            let mut st = inner.lock().expect("pipe state mutex poisoned");
            st.cancel_all_waiters();
            st.buffer.clear();
        });
    }
}
