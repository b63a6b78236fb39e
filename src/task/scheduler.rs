use crate::task::types::{Task, TaskId, TaskOutcome};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tokio::sync::{Mutex, Notify, oneshot};

/// A submitted task waiting for dispatch, with the channel its outcome is
/// delivered on
#[derive(Debug)]
pub struct QueuedTask {
    pub task: Task,
    /// Admission sequence number; ties break on it and tracking entries are keyed to it
    pub seq: u64,
    pub done: oneshot::Sender<TaskOutcome>,
}

impl QueuedTask {
    /// Resolve the submitter's handle without running the task
    pub fn resolve(self, outcome: TaskOutcome) {
        let _ = self.done.send(outcome);
    }
}

struct Entry(QueuedTask);

impl Entry {
    fn key(&self) -> (i32, Reverse<u64>) {
        (self.0.task.priority, Reverse(self.0.seq))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Priority queue feeding the dispatch loop.
///
/// Higher priority pops first; equal priorities pop in submission order.
#[derive(Default)]
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<Entry>>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, queued: QueuedTask) {
        self.heap.lock().await.push(Entry(queued));
        self.notify.notify_one();
    }

    /// Wait for the highest-priority task
    pub async fn pop(&self) -> QueuedTask {
        loop {
            if let Some(Entry(queued)) = self.heap.lock().await.pop() {
                return queued;
            }
            // A push between the check and here leaves a stored permit
            self.notify.notified().await;
        }
    }

    /// Remove every queued task with this id
    pub async fn remove(&self, id: &TaskId) -> Vec<QueuedTask> {
        let mut heap = self.heap.lock().await;
        let (removed, kept): (Vec<Entry>, Vec<Entry>) =
            heap.drain().partition(|entry| &entry.0.task.id == id);
        heap.extend(kept);
        removed.into_iter().map(|Entry(queued)| queued).collect()
    }

    /// Remove a single admission, identified by id and sequence number
    pub async fn remove_exact(&self, id: &TaskId, seq: u64) -> Option<QueuedTask> {
        let mut heap = self.heap.lock().await;
        let (mut removed, kept): (Vec<Entry>, Vec<Entry>) = heap
            .drain()
            .partition(|entry| &entry.0.task.id == id && entry.0.seq == seq);
        heap.extend(kept);
        removed.pop().map(|Entry(queued)| queued)
    }

    pub async fn drain(&self) -> Vec<QueuedTask> {
        let mut heap = self.heap.lock().await;
        heap.drain().map(|Entry(queued)| queued).collect()
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::actions::WaitTask;
    use crate::task::types::TaskKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn queued(id: &str, priority: i32, seq: u64) -> (QueuedTask, oneshot::Receiver<TaskOutcome>) {
        let (done, rx) = oneshot::channel();
        let task = Task::new(id, TaskKind::Wait(WaitTask::millis(0))).with_priority(priority);
        (QueuedTask { task, seq, done }, rx)
    }

    #[tokio::test]
    async fn test_pop_order_priority_then_fifo() {
        let queue = TaskQueue::new();
        for (id, priority, seq) in [("low", 0, 0), ("a", 5, 1), ("high", 10, 2), ("b", 5, 3)] {
            queue.push(queued(id, priority, seq).0).await;
        }

        let mut order = Vec::new();
        while !queue.is_empty().await {
            order.push(queue.pop().await.task.id.to_string());
        }
        assert_eq!(order, vec!["high", "a", "b", "low"]);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(TaskQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await.task.id.to_string() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.push(queued("late", 5, 0).0).await;
        assert_eq!(waiter.await.unwrap(), "late");
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let queue = TaskQueue::new();
        queue.push(queued("keep", 5, 0).0).await;
        let (item, rx) = queued("drop", 5, 1);
        queue.push(item).await;

        let removed = queue.remove(&TaskId::new("drop")).await;
        assert_eq!(removed.len(), 1);
        for item in removed {
            item.resolve(TaskOutcome::Cancelled);
        }
        assert!(matches!(rx.await, Ok(TaskOutcome::Cancelled)));
        assert_eq!(queue.len().await, 1);
        assert!(queue.remove_exact(&TaskId::new("keep"), 7).await.is_none());
        assert!(queue.remove_exact(&TaskId::new("keep"), 0).await.is_some());
    }
}
