//! # threadpipe: In-process FIFO data pipe between threads
//!
//! An unbounded, thread-safe pipe that moves owned items from producer
//! threads to consumer threads, together with the doubly linked container
//! that backs it.
//!
//! ## Architecture
//!
//! - **[`SpliceList`]**: ordered container with O(1) head/tail operations,
//!   sub-range extraction, and splicing; not internally synchronized
//! - **[`SerialQueue`]**: one shared, process-wide worker thread that
//!   serializes every pipe mutation, giving a total order of operations
//!   across all pipe instances
//! - **[`ThreadPipe`]**: push / pop / blocking pop over a private
//!   `SpliceList`, with all mutation funneled through the shared queue
//! - **[`PipeProcessor`]**: consumer contract a pipe can be bound to;
//!   receives push-ordered, fixed-size batches on its own execution queue
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use threadpipe::ThreadPipe;
//!
//! let pipe = Arc::new(ThreadPipe::new());
//!
//! let producer = {
//!     let pipe = Arc::clone(&pipe);
//!     thread::spawn(move || {
//!         for i in 0..10u32 {
//!             pipe.push(i).unwrap();
//!         }
//!     })
//! };
//!
//! // Blocking consumption, in push order.
//! for expected in 0..10 {
//!     assert_eq!(pipe.block_pop().unwrap(), Some(expected));
//! }
//! producer.join().unwrap();
//! ```
//!
//! ## Blocking and cancellation
//!
//! [`ThreadPipe::block_pop`] suspends the calling thread until an item
//! arrives; blocked callers are served strictly in the order they began
//! waiting. [`ThreadPipe::clear_pipe`] discards buffered items and wakes
//! every blocked caller with `Ok(None)` — a defined cancellation result,
//! not an error.

pub mod error;
pub mod list;
pub mod pipe;
pub mod processor;
pub mod queue;

// Re-export commonly used types
pub use error::{PipeError, Result};
pub use list::SpliceList;
pub use pipe::{BindingState, ThreadPipe};
pub use processor::PipeProcessor;
pub use queue::SerialQueue;
