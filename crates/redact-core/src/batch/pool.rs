//! Worker pools, one per endpoint.
//!
//! Items are dealt round-robin by index onto the endpoint queues; each
//! endpoint has its own fixed set of worker threads draining its queue.
//! All pools are joined before [`run_pools`] returns.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Mutex;

use crate::cancel::CancelToken;

use super::item::{BatchItem, ItemOutcome};

/// Queue of one endpoint.
struct EndpointQueue<'c, C> {
    endpoint: &'c C,
    work: Mutex<VecDeque<(usize, BatchItem)>>,
}

impl<C> EndpointQueue<'_, C> {
    fn pop(&self) -> Option<(usize, BatchItem)> {
        self.work.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    fn drain(&self) -> Vec<(usize, BatchItem)> {
        self.work.lock().unwrap_or_else(|e| e.into_inner()).drain(..).collect()
    }
}

/// Deal `items` cyclically onto `endpoints.len()` queues.
pub fn assign_round_robin(items: Vec<BatchItem>, endpoints: usize) -> Vec<Vec<(usize, BatchItem)>> {
    let mut queues: Vec<Vec<(usize, BatchItem)>> = (0..endpoints.max(1)).map(|_| Vec::new()).collect();
    let n = queues.len();
    for (i, item) in items.into_iter().enumerate() {
        queues[i % n].push((i, item));
    }
    queues
}

/// Run `process` for every item on `workers_per_endpoint` threads per
/// endpoint. Returns one outcome per item, in item order.
///
/// A panic in `process` is recorded as an error for that item. After
/// cancellation, workers stop picking up items and the remaining ones are
/// reported as [`ItemOutcome::NotStarted`].
pub fn run_pools<C, F>(
    endpoints: &[C],
    items: Vec<BatchItem>,
    workers_per_endpoint: usize,
    cancel: &CancelToken,
    process: F,
) -> Vec<(BatchItem, ItemOutcome)>
where
    C: Sync,
    F: Fn(&C, &BatchItem) -> ItemOutcome + Sync,
{
    let total = items.len();
    if total == 0 || endpoints.is_empty() {
        return items.into_iter().map(|i| (i, ItemOutcome::NotStarted)).collect();
    }
    let queues: Vec<EndpointQueue<'_, C>> = assign_round_robin(items, endpoints.len())
        .into_iter()
        .zip(endpoints)
        .map(|(work, endpoint)| EndpointQueue { endpoint, work: Mutex::new(work.into()) })
        .collect();
    let workers = workers_per_endpoint.max(1);
    let (tx, rx) = mpsc::channel::<(usize, BatchItem, ItemOutcome)>();

    std::thread::scope(|scope| {
        for (pool, queue) in queues.iter().enumerate() {
            let busy = workers.min(queue.work.lock().map(|q| q.len()).unwrap_or(workers));
            for worker in 0..busy {
                let tx = tx.clone();
                let process = &process;
                std::thread::Builder::new()
                    .name(format!("redact-{}-{}", pool, worker))
                    .spawn_scoped(scope, move || {
                        while !cancel.is_cancelled() {
                            let Some((index, item)) = queue.pop() else {
                                break;
                            };
                            let outcome =
                                panic::catch_unwind(AssertUnwindSafe(|| process(queue.endpoint, &item)))
                                    .unwrap_or_else(|payload| {
                                        let msg = panic_message(payload.as_ref());
                                        tracing::error!("worker panicked on '{}': {}", item.relative.display(), msg);
                                        ItemOutcome::Error(format!("panic: {}", msg))
                                    });
                            if tx.send((index, item, outcome)).is_err() {
                                break;
                            }
                        }
                    })
                    .map(drop)
                    .unwrap_or_else(|e| tracing::error!("could not start worker thread: {}", e));
            }
        }
    });
    drop(tx);

    let mut slots: Vec<Option<(BatchItem, ItemOutcome)>> = (0..total).map(|_| None).collect();
    for (index, item, outcome) in rx.into_iter() {
        slots[index] = Some((item, outcome));
    }
    for queue in &queues {
        for (index, item) in queue.drain() {
            slots[index] = Some((item, ItemOutcome::NotStarted));
        }
    }
    slots.into_iter().flatten().collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
