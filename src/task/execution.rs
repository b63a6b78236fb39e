//! Priority-ordered task executor.
//!
//! A single dispatch loop pulls the highest-priority task off the queue,
//! claims a worker permit and spawns the run. Blocking tasks hold the loop
//! until they finish; non-blocking tasks overlap with whatever is dequeued
//! next, up to `max_workers` at a time.
//!
//! Ids are tracked from admission until the run reaches a terminal state, so
//! a second submission with the same id is rejected while the first is still
//! queued or running.

use crate::task::context::TaskContext;
use crate::task::scheduler::{QueuedTask, TaskQueue};
use crate::task::types::{Task, TaskError, TaskId, TaskOutcome, TaskResult, TaskState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Executor configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    /// Upper bound on concurrently running tasks (default: 4)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Buffered lifecycle events per subscriber (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_workers() -> usize {
    4
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Lifecycle notification broadcast to subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub state: TaskState,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
}

/// Completion handle returned by [`TaskExecutor::submit`]
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Wait for the task to reach a terminal state
    pub async fn wait(self) -> TaskOutcome {
        // A dropped sender means the task was discarded without running
        self.rx.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

struct Tracked {
    seq: u64,
    state: TaskState,
    token: CancellationToken,
}

struct Inner {
    context: TaskContext,
    queue: TaskQueue,
    tracked: DashMap<TaskId, Tracked>,
    shutdown: CancellationToken,
    workers: Arc<Semaphore>,
    max_workers: usize,
    events: broadcast::Sender<TaskEvent>,
    next_seq: AtomicU64,
}

impl Inner {
    fn emit(&self, task_id: &TaskId, state: TaskState, message: Option<String>) {
        // No subscribers is fine
        let _ = self.events.send(TaskEvent {
            task_id: task_id.clone(),
            state,
            timestamp: Utc::now(),
            message,
        });
    }

    fn set_state(&self, id: &TaskId, seq: u64, state: TaskState) -> bool {
        match self.tracked.get_mut(id) {
            Some(mut tracked) if tracked.seq == seq => {
                tracked.state = state;
                true
            }
            _ => false,
        }
    }

    fn untrack(&self, id: &TaskId, seq: u64) {
        self.tracked.remove_if(id, |_, tracked| tracked.seq == seq);
    }

    fn discard(&self, queued: QueuedTask) {
        self.emit(&queued.task.id, TaskState::Cancelled, None);
        queued.resolve(TaskOutcome::Cancelled);
    }
}

/// Priority-ordered executor with a bounded worker pool
pub struct TaskExecutor {
    inner: Arc<Inner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl TaskExecutor {
    /// Start an executor. Must be called inside a tokio runtime; the dispatch
    /// loop is spawned immediately.
    pub fn new(config: ExecutorConfig, context: TaskContext) -> Self {
        let max_workers = config.max_workers.max(1);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let inner = Arc::new(Inner {
            context,
            queue: TaskQueue::new(),
            tracked: DashMap::new(),
            shutdown: CancellationToken::new(),
            workers: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            events,
            next_seq: AtomicU64::new(0),
        });

        let dispatcher = tokio::spawn(dispatch_loop(inner.clone()));
        info!("Task executor started with {} workers", max_workers);

        Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Admit a task and report whether it was accepted for scheduling
    pub async fn execute(&self, task: Task) -> TaskResult {
        let task_id = task.id.clone();
        let data = serde_json::json!({
            "kind": task.kind_name(),
            "priority": task.priority,
            "blocking": task.blocking,
        });
        match self.submit(task).await {
            Ok(_handle) => TaskResult::accepted(task_id, Some(data)),
            Err(e) => {
                warn!("Rejected task {}: {}", task_id, e);
                TaskResult::rejected(task_id, &e)
            }
        }
    }

    /// Admit a task and return a handle resolving to its outcome
    pub async fn submit(&self, task: Task) -> Result<TaskHandle, TaskError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(TaskError::ExecutorShutdown);
        }

        let id = task.id.clone();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        match self.inner.tracked.entry(id.clone()) {
            Entry::Occupied(_) => return Err(TaskError::DuplicateTaskId(id)),
            Entry::Vacant(slot) => {
                slot.insert(Tracked {
                    seq,
                    state: TaskState::Submitted,
                    token: self.inner.shutdown.child_token(),
                });
            }
        }

        let (done, rx) = oneshot::channel();
        self.inner.emit(&id, TaskState::Submitted, None);
        self.inner.queue.push(QueuedTask { task, seq, done }).await;
        if self.inner.set_state(&id, seq, TaskState::Queued) {
            self.inner.emit(&id, TaskState::Queued, None);
        }
        debug!("Task {} queued", id);

        // Shutdown may have drained the queue between the check above and the push
        if self.inner.shutdown.is_cancelled() {
            if let Some(queued) = self.inner.queue.remove_exact(&id, seq).await {
                self.inner.untrack(&id, seq);
                queued.resolve(TaskOutcome::Cancelled);
            }
        }

        Ok(TaskHandle { id, rx })
    }

    /// Cancel a queued or running task. Returns whether anything was found.
    pub async fn cancel(&self, id: &TaskId) -> bool {
        let mut found = false;

        if let Some((_, tracked)) = self.inner.tracked.remove(id) {
            tracked.token.cancel();
            found = true;
        }

        for queued in self.inner.queue.remove(id).await {
            self.inner.discard(queued);
            found = true;
        }

        if found {
            info!("Cancelled task {}", id);
        }
        found
    }

    /// Cancel every tracked task; returns how many were cancelled
    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<TaskId> = self
            .inner
            .tracked
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut cancelled = 0;
        for id in ids {
            if self.cancel(&id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancel everything, stop the dispatch loop and wait for running tasks
    /// to wind down. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let Some(dispatcher) = self.dispatcher.lock().await.take() else {
            return;
        };
        info!("Shutting down task executor");

        self.inner.shutdown.cancel();
        for queued in self.inner.queue.drain().await {
            self.inner.discard(queued);
        }
        self.inner.tracked.clear();

        if let Err(e) = dispatcher.await {
            error!("Dispatch loop ended abnormally: {}", e);
        }
        // Every worker holds a permit until it has delivered its outcome
        if let Ok(permits) = self
            .inner
            .workers
            .acquire_many(self.inner.max_workers as u32)
            .await
        {
            drop(permits);
        }
        info!("Task executor stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.inner.tracked.get(id).map(|tracked| tracked.state)
    }

    pub fn is_tracked(&self, id: &TaskId) -> bool {
        self.inner.tracked.contains_key(id)
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.tracked.len()
    }

    pub async fn queued_count(&self) -> usize {
        self.inner.queue.len().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

async fn dispatch_loop(inner: Arc<Inner>) {
    loop {
        let queued = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            queued = inner.queue.pop() => queued,
        };

        let permit = tokio::select! {
            _ = inner.shutdown.cancelled() => {
                inner.discard(queued);
                break;
            }
            permit = inner.workers.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let id = queued.task.id.clone();
        let seq = queued.seq;
        // Cancelled while waiting for a worker
        let token = match inner.tracked.get(&id) {
            Some(tracked) if tracked.seq == seq => tracked.token.clone(),
            _ => {
                inner.discard(queued);
                continue;
            }
        };
        inner.set_state(&id, seq, TaskState::Dispatched);
        inner.emit(&id, TaskState::Dispatched, None);

        let blocking = queued.task.blocking;
        let run = tokio::spawn(run_task(inner.clone(), queued, token, permit));

        if blocking {
            tokio::select! {
                _ = inner.shutdown.cancelled() => break,
                _ = run => {}
            }
        }
    }
    debug!("Dispatch loop stopped");
}

async fn run_task(
    inner: Arc<Inner>,
    queued: QueuedTask,
    token: CancellationToken,
    permit: OwnedSemaphorePermit,
) {
    let QueuedTask { task, seq, done } = queued;
    let id = task.id.clone();

    inner.set_state(&id, seq, TaskState::Running);
    inner.emit(&id, TaskState::Running, None);
    debug!("Starting task {} ({})", id, task.kind_name());

    let ctx = inner.context.with_cancellation(token.clone());
    let outcome = tokio::select! {
        _ = token.cancelled() => TaskOutcome::Cancelled,
        result = AssertUnwindSafe(task.execute(&ctx)).catch_unwind() => match result {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(TaskError::Cancelled)) => TaskOutcome::Cancelled,
            Ok(Err(e)) => {
                error!("Task {} ({}) failed: {}", id, task.kind_name(), e);
                TaskOutcome::Failed(e)
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("Task {} ({}) panicked: {}", id, task.kind_name(), reason);
                TaskOutcome::Failed(TaskError::ActionFailed(format!("task panicked: {}", reason)))
            }
        },
    };

    inner.untrack(&id, seq);
    debug!("Task {} finished: {:?}", id, outcome.state());

    let message = match &outcome {
        TaskOutcome::Failed(e) => Some(e.to_string()),
        _ => None,
    };
    inner.emit(&id, outcome.state(), message);
    let _ = done.send(outcome);
    drop(permit);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
