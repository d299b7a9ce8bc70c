//! PipeProcessor trait for batch-consuming pipe bindings
//!
//! A processor is a polymorphic consumer a [`ThreadPipe`](crate::ThreadPipe)
//! can be bound to. While mounted, pushed items accumulate inside the pipe
//! and are handed to the processor in fixed-size, push-ordered batches on
//! the processor's own execution queue — never on the pipe's shared
//! serialization queue, so a slow processor cannot starve other pipes.
//!
//! The three flags ([`batch_size`](PipeProcessor::batch_size),
//! [`exclusive`](PipeProcessor::exclusive),
//! [`clear_existing`](PipeProcessor::clear_existing)) are read once, when
//! the processor is mounted, and not re-read afterwards.

use std::sync::Arc;

use crate::list::SpliceList;
use crate::queue::SerialQueue;

/// A consumer that receives pipe data in fixed-size batches.
///
/// Implementations must be `Send + Sync`: the pipe holds the processor as a
/// shared trait object and invokes [`process`](Self::process) from the
/// processor's own queue while mount/unmount calls arrive from other
/// threads.
///
/// Batch dispatch is fire-and-forget: the pipe never waits for `process` to
/// finish before accepting more pushes or forming the next batch. Batches
/// are ordered by submission; if the processor's queue is concurrent,
/// completion order is not guaranteed.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use threadpipe::{PipeProcessor, SerialQueue, SpliceList};
///
/// struct Printer {
///     queue: Arc<SerialQueue>,
/// }
///
/// impl PipeProcessor<String> for Printer {
///     fn process_queue(&self) -> Arc<SerialQueue> {
///         Arc::clone(&self.queue)
///     }
///
///     fn batch_size(&self) -> usize {
///         8
///     }
///
///     fn exclusive(&self) -> bool {
///         true
///     }
///
///     fn clear_existing(&self) -> bool {
///         false
///     }
///
///     fn process(&self, batch: SpliceList<String>) {
///         for line in batch {
///             println!("{line}");
///         }
///     }
/// }
/// ```
pub trait PipeProcessor<T: Send + 'static>: Send + Sync {
    /// The execution queue batches are delivered on.
    ///
    /// Must be distinct from the pipe's serialization queue; mounting a
    /// processor whose queue is the pipe's own is rejected with a state
    /// conflict.
    fn process_queue(&self) -> Arc<SerialQueue>;

    /// Number of items per batch. Must be greater than zero; the pipe
    /// invokes [`process`](Self::process) only with exactly this many items.
    fn batch_size(&self) -> usize;

    /// Whether this processor takes exclusive ownership of incoming data.
    ///
    /// While an exclusive processor is mounted, `pop` returns empty
    /// regardless of buffered content and `block_pop` callers stay
    /// suspended. A non-exclusive (shared) processor leaves direct
    /// consumption available.
    fn exclusive(&self) -> bool;

    /// Whether mounting this processor discards the pipe's already-buffered
    /// items. If unset, buffered items are delivered to the processor in
    /// batches immediately on mount, before any newly pushed items.
    fn clear_existing(&self) -> bool;

    /// Receives one batch of items in push order.
    fn process(&self, batch: SpliceList<T>);
}
