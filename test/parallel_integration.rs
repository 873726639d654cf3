//! Integration tests for TaskRunner and the partition-then-parallelize
//! pattern over a shared TypedBuffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tuplecore::{SharedPtr, TaskRunner, TypedBuffer};

/// Records the highest number of tasks observed inside the critical section
/// at the same time.
struct HighWater {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl HighWater {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[test]
fn concurrency_bound_is_respected() {
    let mut runner = TaskRunner::with_concurrency(2);
    let bound = runner.max_concurrency();
    let gauge = HighWater::new();

    for _ in 0..24 {
        let gauge = Arc::clone(&gauge);
        runner.execute(move || {
            gauge.enter();
            std::thread::sleep(Duration::from_millis(2));
            gauge.exit();
        });
    }
    runner.wait();

    assert!(gauge.peak() >= 1);
    assert!(
        gauge.peak() <= bound,
        "observed {} concurrent tasks with bound {}",
        gauge.peak(),
        bound
    );
}

#[test]
fn every_task_side_effect_visible_after_wait() {
    let tasks = 200usize;
    let mut results = TypedBuffer::<u64>::new(tasks, "results").unwrap();
    let ptr = SharedPtr::new(results.as_mut_ptr());

    let mut runner = TaskRunner::new();
    for i in 0..tasks {
        // One unique slot per task; disjoint by construction.
        runner.execute(move || unsafe { ptr.write(i, i as u64 + 1) });
    }
    runner.wait();
    assert_eq!(runner.in_flight(), 0);

    for i in 0..tasks {
        assert_eq!(results[i], i as u64 + 1, "task {i} result missing");
    }
}

#[test]
fn disabled_mode_is_sequential_and_deterministic() {
    for _ in 0..3 {
        let mut runner = TaskRunner::new();
        runner.set_parallel_enabled(false);

        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..16 {
            let log = Arc::clone(&log);
            runner.execute(move || log.lock().push(i));
        }
        // No wait() needed: everything already ran in this thread, in order.
        assert_eq!(*log.lock(), (0..16).collect::<Vec<_>>());
    }
}

#[test]
fn end_to_end_partitioned_fill() {
    // 1000 tuples x 3 components, 4 disjoint partitions, bound 4: every
    // element must equal tuple*3 + component after the join.
    let tuples = 1000usize;
    let comps = 3usize;
    let mut buf = TypedBuffer::<i32>::with_components(tuples, &[comps], "field").unwrap();
    buf.initialize_with_value(0);

    let mut runner = TaskRunner::with_concurrency(4);
    let ptr = SharedPtr::new(buf.as_mut_ptr());
    runner.execute_range(0..tuples, 4, move |range| {
        for t in range {
            for c in 0..comps {
                // Safety: partitions are disjoint and the buffer is
                // pre-sized; no resize happens while tasks are in flight.
                unsafe { ptr.write(t * comps + c, (t * comps + c) as i32) };
            }
        }
    });
    runner.wait();

    for t in 0..tuples {
        for c in 0..comps {
            assert_eq!(buf.component(t, c), (t * comps + c) as i32);
        }
    }
}

#[test]
fn end_to_end_matches_serial_fallback() {
    let tuples = 300usize;

    let run = |parallel: bool| -> Vec<f64> {
        let mut buf = TypedBuffer::<f64>::with_components(tuples, &[2], "pair").unwrap();
        let mut runner = TaskRunner::with_concurrency(4);
        runner.set_parallel_enabled(parallel);

        let ptr = SharedPtr::new(buf.as_mut_ptr());
        runner.execute_range(0..tuples, 0, move |range| {
            for t in range {
                unsafe {
                    ptr.write(t * 2, t as f64);
                    ptr.write(t * 2 + 1, t as f64 / 2.0);
                }
            }
        });
        runner.wait();
        buf.as_slice().to_vec()
    };

    assert_eq!(run(true), run(false));
}

#[test]
fn runner_reusable_across_batches() {
    let mut runner = TaskRunner::with_concurrency(3);
    let counter = Arc::new(AtomicUsize::new(0));

    for batch in 1..=4 {
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            runner.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        runner.wait();
        assert_eq!(counter.load(Ordering::SeqCst), batch * 10);
    }
}
