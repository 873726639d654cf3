//! Bounded task runner
//!
//! `TaskRunner` is the facade filters dispatch through: submit closures with
//! `execute`, join with `wait`. The in-flight count never exceeds the
//! configured bound because `execute` drains the runner before accepting
//! work past it. With parallelism disabled every closure runs synchronously
//! in the calling thread, giving deterministic sequential ordering.

use std::ops::Range;

use super::executor::{hardware_concurrency, InlineExecutor, TaskExecutor, ThreadPoolExecutor};
use crate::config::CoreConfig;

pub struct TaskRunner {
    executor: Box<dyn TaskExecutor>,
    parallel_enabled: bool,
    max_concurrency: usize,
    in_flight: usize,
}

impl TaskRunner {
    /// Parallel runner bounded by the hardware concurrency.
    pub fn new() -> Self {
        Self::with_concurrency(hardware_concurrency())
    }

    /// Parallel runner bounded by `max_concurrency` (clamped to hardware
    /// concurrency; 0 means hardware concurrency).
    pub fn with_concurrency(max_concurrency: usize) -> Self {
        let bound = clamp_concurrency(max_concurrency);
        Self {
            executor: Box::new(ThreadPoolExecutor::new(bound)),
            parallel_enabled: true,
            max_concurrency: bound,
            in_flight: 0,
        }
    }

    /// Runner configured from `[parallel]` settings.
    pub fn from_config(config: &CoreConfig) -> Self {
        let mut runner = Self::with_concurrency(config.parallel.max_tasks);
        runner.set_parallel_enabled(config.parallel.enabled);
        runner
    }

    pub fn is_parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    /// Switch between the pool and inline strategies. Pending work is
    /// drained before the switch.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        if enabled == self.parallel_enabled {
            return;
        }
        self.wait();
        self.parallel_enabled = enabled;
        self.executor = if enabled {
            Box::new(ThreadPoolExecutor::new(self.max_concurrency))
        } else {
            Box::new(InlineExecutor)
        };
    }

    /// Effective in-flight bound. Reports the hardware concurrency when
    /// parallelism is disabled so callers can size partitions the same way
    /// in both modes.
    pub fn max_concurrency(&self) -> usize {
        if self.parallel_enabled {
            self.max_concurrency
        } else {
            hardware_concurrency()
        }
    }

    /// Re-bound the runner (clamped to hardware concurrency; 0 means
    /// hardware concurrency). Drains pending work before rebuilding the
    /// pool.
    pub fn set_max_concurrency(&mut self, max_concurrency: usize) {
        let bound = clamp_concurrency(max_concurrency);
        if bound == self.max_concurrency {
            return;
        }
        self.wait();
        self.max_concurrency = bound;
        if self.parallel_enabled {
            self.executor = Box::new(ThreadPoolExecutor::new(bound));
        }
    }

    /// Number of submitted-but-not-yet-joined tasks.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Run `task`. Parallel mode submits it to the pool and, once the
    /// in-flight count reaches the bound, drains the runner before
    /// returning, so the bound is never exceeded. Disabled mode runs the
    /// task in the calling thread and returns after it completes.
    pub fn execute<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.parallel_enabled {
            task();
            return;
        }
        self.executor.submit(Box::new(task));
        self.in_flight += 1;
        if self.in_flight >= self.max_concurrency {
            self.wait();
        }
    }

    /// Block until every submitted task has completed. After this returns,
    /// all side effects of submitted tasks are visible to the caller and the
    /// in-flight count is zero. No-op when idle.
    pub fn wait(&mut self) {
        if self.in_flight > 0 {
            self.executor.wait();
            self.in_flight = 0;
        }
    }

    /// Partition `range` into `partitions` near-equal disjoint sub-ranges
    /// and dispatch one task per non-empty sub-range (0 means one partition
    /// per concurrency slot). The caller still owns the final `wait()`.
    pub fn execute_range<F>(&mut self, range: Range<usize>, partitions: usize, task: F)
    where
        F: Fn(Range<usize>) + Send + Sync + Clone + 'static,
    {
        let total = range.end.saturating_sub(range.start);
        if total == 0 {
            return;
        }
        let partitions = if partitions == 0 {
            self.max_concurrency()
        } else {
            partitions
        }
        .min(total);

        let chunk = total / partitions;
        let remainder = total % partitions;
        let mut start = range.start;
        for i in 0..partitions {
            let len = chunk + usize::from(i < remainder);
            let sub = start..start + len;
            start = sub.end;
            let task = task.clone();
            self.execute(move || task(sub));
        }
        debug_assert_eq!(start, range.end);
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_concurrency(requested: usize) -> usize {
    let hardware = hardware_concurrency();
    if requested == 0 {
        hardware
    } else {
        requested.min(hardware)
    }
}
