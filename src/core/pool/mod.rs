//! # Pool Module
//!
//! Bounded parallel execution for hashing and signature work.
//!
//! A fixed worker group consumes a bounded task channel fed by a producer
//! thread; finished `(item, result)` pairs flow back to the calling thread
//! over a completion channel and are handed to a sink closure as they
//! arrive. The sink therefore runs serially on the caller, which is what
//! lets the orchestrator interleave cache writes with result consumption.
//!
//! The task queue holds `workers * (multiplier - 1)` items and the workers
//! hold at most `workers` more, so no more than `multiplier * workers`
//! tasks are in flight at once. That bound caps peak memory and open file
//! descriptors no matter how large the candidate set is.

use crossbeam_channel::bounded;
use std::thread;

/// Run `job` over `items` on `workers` threads, delivering each completed
/// pair to `sink` on the calling thread in completion order.
///
/// With `workers <= 1` everything runs inline on the caller.
pub fn bounded_for_each<T, R, F, S>(
    items: Vec<T>,
    workers: usize,
    in_flight_multiplier: usize,
    job: F,
    mut sink: S,
) where
    T: Send,
    R: Send,
    F: Fn(&T) -> R + Sync,
    S: FnMut(T, R),
{
    if items.is_empty() {
        return;
    }
    if workers <= 1 {
        for item in items {
            let output = job(&item);
            sink(item, output);
        }
        return;
    }

    let queue_capacity = workers
        .saturating_mul(in_flight_multiplier.saturating_sub(1))
        .max(1);
    let (task_tx, task_rx) = bounded::<T>(queue_capacity);
    let (done_tx, done_rx) = bounded::<(T, R)>(queue_capacity);

    thread::scope(|scope| {
        let job = &job;
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                for item in task_rx.iter() {
                    let output = job(&item);
                    if done_tx.send((item, output)).is_err() {
                        break;
                    }
                }
            });
        }
        // The scope keeps its own clones alive otherwise, and the drain
        // below relies on the channels closing.
        drop(task_rx);
        drop(done_tx);

        scope.spawn(move || {
            for item in items {
                if task_tx.send(item).is_err() {
                    break;
                }
            }
        });

        for (item, output) in done_rx.iter() {
            sink(item, output);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parallel_run_completes_every_item() {
        let items: Vec<u64> = (0..200).collect();
        let mut seen = HashSet::new();
        let mut sum = 0u64;

        bounded_for_each(
            items,
            4,
            4,
            |n| n * n,
            |n, squared| {
                assert_eq!(squared, n * n);
                seen.insert(n);
                sum += squared;
            },
        );

        assert_eq!(seen.len(), 200);
        assert_eq!(sum, (0..200u64).map(|n| n * n).sum::<u64>());
    }

    #[test]
    fn single_worker_runs_inline_in_order() {
        let mut order = Vec::new();
        bounded_for_each(
            vec![1, 2, 3],
            1,
            4,
            |n| *n,
            |n, _| {
                order.push(n);
            },
        );
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        bounded_for_each(
            Vec::<u32>::new(),
            8,
            2,
            |_| unreachable!("no items to process"),
            |_: u32, _: ()| {},
        );
    }

    #[test]
    fn sink_can_mutate_caller_state() {
        let mut total_len = 0usize;
        bounded_for_each(
            vec!["alpha".to_string(), "bc".to_string()],
            2,
            2,
            |s| s.len(),
            |_, len| {
                total_len += len;
            },
        );
        assert_eq!(total_len, 7);
    }
}
