//! Async event distribution for streaming task progress to subscribers
//! (SSE/WebSocket style). Headless — no HTTP framework dependency.
//!
//! Grounded on the Python predecessor's `EventPublisher`: events are
//! partitioned by task id, multiple subscribers can watch the same task,
//! and `complete_task` closes every subscriber for that task. A lagging
//! subscriber drops the oldest buffered events rather than blocking the
//! publisher, bounded by `EventConfig::subscriber_queue_size`.

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Progress { task_id: String, phase: String, step: usize, total_steps: usize },
    Output { task_id: String, stream: String, line: String },
    Completion { task_id: String, success: bool, summary: String },
    Error { task_id: String, message: String },
}

impl ExecutionEvent {
    pub fn task_id(&self) -> &str {
        match self {
            ExecutionEvent::Progress { task_id, .. }
            | ExecutionEvent::Output { task_id, .. }
            | ExecutionEvent::Completion { task_id, .. }
            | ExecutionEvent::Error { task_id, .. } => task_id,
        }
    }

    fn is_completion(&self) -> bool {
        matches!(self, ExecutionEvent::Completion { .. })
    }
}

struct TaskChannel {
    sender: broadcast::Sender<ExecutionEvent>,
}

/// Distributes [`ExecutionEvent`]s to subscribers, partitioned by task id.
pub struct EventPublisher {
    queue_size: usize,
    channels: Mutex<HashMap<String, TaskChannel>>,
}

impl EventPublisher {
    pub fn new(queue_size: usize) -> Self {
        Self { queue_size: queue_size.max(1), channels: Mutex::new(HashMap::new()) }
    }

    fn channel_for(&self, task_id: &str) -> broadcast::Sender<ExecutionEvent> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(task_id.to_string())
            .or_insert_with(|| TaskChannel { sender: broadcast::channel(self.queue_size).0 })
            .sender
            .clone()
    }

    /// Publishes an event to every current subscriber of `task_id`.
    /// A no-op (not an error) if nobody is subscribed.
    pub async fn publish(&self, task_id: &str, event: ExecutionEvent) {
        let sender = self.channel_for(task_id);
        let _ = sender.send(event);
    }

    /// Non-blocking variant, identical semantics (broadcast send never blocks).
    pub fn try_publish(&self, task_id: &str, event: ExecutionEvent) {
        let sender = self.channel_for(task_id);
        let _ = sender.send(event);
    }

    /// Streams events for `task_id`. Dropping the returned stream unsubscribes.
    /// A lagged receiver (subscriber fell behind the queue bound) silently
    /// resumes from the next available event rather than erroring.
    pub fn subscribe(&self, task_id: &str) -> impl Stream<Item = ExecutionEvent> {
        let sender = self.channel_for(task_id);
        let receiver = sender.subscribe();
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    pub fn subscriber_count(&self, task_id: &str) -> usize {
        let channels = self.channels.lock().unwrap();
        channels.get(task_id).map_or(0, |c| c.sender.receiver_count())
    }

    /// Publishes a terminal completion event and drops the task's channel,
    /// closing every subscriber's stream.
    pub async fn complete_task(&self, task_id: &str, success: bool, summary: impl Into<String>) {
        let event = ExecutionEvent::Completion {
            task_id: task_id.to_string(),
            success,
            summary: summary.into(),
        };
        debug_assert!(event.is_completion());
        let sender = self.channel_for(task_id);
        let _ = sender.send(event);
        self.channels.lock().unwrap().remove(task_id);
    }

    pub fn complete_task_blocking(&self, task_id: &str, success: bool, summary: impl Into<String>) {
        let event = ExecutionEvent::Completion {
            task_id: task_id.to_string(),
            success,
            summary: summary.into(),
        };
        let sender = self.channel_for(task_id);
        let _ = sender.send(event);
        self.channels.lock().unwrap().remove(task_id);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
