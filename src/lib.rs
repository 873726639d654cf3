//! Tuplecore - typed tuple/component buffers with bounded parallel dispatch
//!
//! The two hot-path primitives of a per-element data processing engine:
//!
//! - **[`TypedBuffer`]**: a generic, contiguous, resizable store of
//!   fixed-width elements grouped into tuples of N components each. Owns or
//!   borrows its backing memory, exposes flat and tuple-wise iteration, and
//!   keeps (re)allocation behavior explicit and predictable.
//! - **[`TaskRunner`]**: accepts independent closures, fans them out across
//!   a bounded worker pool, and joins them with [`TaskRunner::wait`]. Falls
//!   back to synchronous in-caller execution when parallelism is disabled.
//!
//! The two are coupled only at the call site: a caller pre-sizes one or more
//! buffers, partitions the index space into disjoint ranges, dispatches one
//! task per range, and waits. No locking happens inside either component;
//! disjoint ranges and no-resize-in-flight are the caller's contract.
//!
//! # Example
//!
//! ```rust
//! use tuplecore::{SharedPtr, TaskRunner, TypedBuffer};
//!
//! // 1000 tuples of 3 components each, zero-filled.
//! let mut buf = TypedBuffer::<i32>::with_components(1000, &[3], "signal").unwrap();
//!
//! let mut runner = TaskRunner::with_concurrency(4);
//! let ptr = SharedPtr::new(buf.as_mut_ptr());
//! runner.execute_range(0..buf.tuple_count(), 4, move |tuples| {
//!     for t in tuples {
//!         for c in 0..3 {
//!             // Safety: ranges are disjoint and the buffer is pre-sized.
//!             unsafe { ptr.write(t * 3 + c, (t * 3 + c) as i32) };
//!         }
//!     }
//! });
//! runner.wait();
//!
//! assert_eq!(buf[2999], 2999);
//! ```

pub mod buffer;
pub mod config;
pub mod task;

pub use buffer::{
    ranges_equal, BufferError, BufferResult, Element, GrowStrategy, SharedPtr, TupleIter,
    TupleIterMut, TupleRef, TupleRefMut, TypedBuffer,
};
pub use config::{ConfigError, ConfigResult, CoreConfig, MemoryConfig, ParallelConfig};
pub use task::{hardware_concurrency, InlineExecutor, Task, TaskExecutor, TaskRunner, ThreadPoolExecutor};
