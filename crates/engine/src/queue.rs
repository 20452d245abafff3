//! Per-run scheduler queue — priority-by-time single-producer/multi-consumer
//! structure (spec §4.3).

use std::collections::BinaryHeap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Poll interval used when [`ReadyQueue::dequeue`] finds nothing ready yet.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    not_before: DateTime<Utc>,
    node_id: String,
}

// `BinaryHeap` is a max-heap; flip the ordering so the earliest
// `not_before` sorts first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.not_before.cmp(&self.not_before)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Entries `{nodeId, notBefore}` ordered by readiness time. `dequeue`
/// returns the oldest entry whose `notBefore <= now`; duplicates for the
/// same node coalesce naturally since readiness is re-checked at dequeue
/// time by the caller-supplied `executed` predicate.
#[derive(Default)]
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<Entry>>,
}

impl ReadyQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Enqueue a node to become ready no earlier than `not_before` (`now`
    /// if omitted). Idempotent in effect: callers skip nodes already in
    /// `executedNodes` rather than suppressing the push here, matching the
    /// "skipped at dequeue" rule in spec §4.3.
    pub async fn enqueue(&self, node_id: impl Into<String>, not_before: Option<DateTime<Utc>>) {
        let entry = Entry {
            node_id: node_id.into(),
            not_before: not_before.unwrap_or_else(Utc::now),
        };
        self.heap.lock().await.push(entry);
    }

    /// Pop the oldest ready, not-yet-executed entry. Polls at
    /// [`POLL_INTERVAL`] while nothing is ready. Returns `None` once the
    /// heap is empty and `should_stop` reports the run is done — this is
    /// how a worker notices there is nothing left to do and exits.
    pub async fn dequeue<F, S>(&self, executed: F, should_stop: S) -> Option<String>
    where
        F: Fn(&str) -> bool,
        S: Fn() -> bool,
    {
        loop {
            {
                let mut heap = self.heap.lock().await;
                let mut deferred = Vec::new();
                let now = Utc::now();
                while let Some(entry) = heap.pop() {
                    if executed(&entry.node_id) {
                        continue;
                    }
                    if entry.not_before <= now {
                        for d in deferred {
                            heap.push(d);
                        }
                        return Some(entry.node_id);
                    }
                    deferred.push(entry);
                }
                let heap_empty = deferred.is_empty();
                for d in deferred {
                    heap.push(d);
                }
                if heap_empty && should_stop() {
                    return None;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeues_in_not_before_order() {
        let queue = ReadyQueue::new();
        let now = Utc::now();
        queue.enqueue("b", Some(now + chrono::Duration::seconds(5))).await;
        queue.enqueue("a", Some(now)).await;

        let first = queue.dequeue(|_| false, || true).await;
        assert_eq!(first, Some("a".to_string()));
    }

    #[tokio::test]
    async fn executed_nodes_are_skipped() {
        let queue = ReadyQueue::new();
        queue.enqueue("done", None).await;
        queue.enqueue("todo", None).await;

        let next = queue.dequeue(|id| id == "done", || true).await;
        assert_eq!(next, Some("todo".to_string()));
    }

    #[tokio::test]
    async fn returns_none_when_empty_and_stopped() {
        let queue = ReadyQueue::new();
        let result = queue.dequeue(|_| false, || true).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn not_yet_ready_entry_waits_for_not_before() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let queue = ReadyQueue::new();
        queue
            .enqueue("future", Some(Utc::now() + chrono::Duration::milliseconds(120)))
            .await;

        let polls = AtomicU32::new(0);
        let result = queue
            .dequeue(|_| false, || polls.fetch_add(1, Ordering::Relaxed) > 10)
            .await;
        assert_eq!(result, Some("future".to_string()));
    }
}
