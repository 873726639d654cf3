//! Bounded parallel task dispatch
//!
//! A [`TaskRunner`] accepts independent closures and fans them out across a
//! worker pool with a hard in-flight bound, or runs them synchronously in
//! the calling thread when parallelism is disabled. It is a
//! fire-and-forget-then-join primitive: no results, no ordering, no
//! cancellation. Callers must invoke [`TaskRunner::wait`] before reading any
//! side effect of submitted work.

mod executor;
mod runner;

pub use executor::{hardware_concurrency, InlineExecutor, Task, TaskExecutor, ThreadPoolExecutor};
pub use runner::TaskRunner;
