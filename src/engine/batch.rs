// ABOUTME: Batch aggregator coalescing fine-grained execution events into single store updates
// ABOUTME: Flushes when the buffer reaches its size limit or a timeout passes, whichever is first

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::result::TaskResult;
use super::state::{ExecutionStore, LogKind};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchLog {
    pub message: String,
    pub kind: LogKind,
}

/// One task-level event: an optional result and timing plus log lines.
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    pub run_id: String,
    pub task_id: String,
    pub result: Option<TaskResult>,
    pub execution_time: Option<u64>,
    pub logs: Vec<BatchLog>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub size: usize,
    #[serde(with = "humantime_serde", default = "default_batch_timeout")]
    pub timeout: Duration,
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_timeout() -> Duration {
    Duration::from_millis(1000)
}

pub struct BatchAggregator {
    config: BatchConfig,
    store: ExecutionStore,
    buffer: Arc<Mutex<BatchBuffer>>,
}

#[derive(Default)]
struct BatchBuffer {
    updates: Vec<BatchUpdate>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every flush so a timer that lost the race does nothing
    generation: u64,
}

impl BatchLog {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: LogKind::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: LogKind::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: LogKind::Error,
        }
    }
}

impl BatchUpdate {
    pub fn new(run_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            task_id: task_id.into(),
            result: None,
            execution_time: None,
            logs: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_result(mut self, result: TaskResult, execution_time: u64) -> Self {
        self.result = Some(result);
        self.execution_time = Some(execution_time);
        self
    }

    pub fn with_log(mut self, message: impl Into<String>, kind: LogKind) -> Self {
        self.logs.push(BatchLog {
            message: message.into(),
            kind,
        });
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            timeout: default_batch_timeout(),
        }
    }
}

impl BatchAggregator {
    pub fn new(store: ExecutionStore, config: BatchConfig) -> Self {
        let config = BatchConfig {
            size: config.size.max(1),
            ..config
        };
        Self {
            config,
            store,
            buffer: Arc::new(Mutex::new(BatchBuffer::default())),
        }
    }

    /// Buffer an update, flushing immediately once the size limit is reached
    /// and otherwise arming the flush timer if none is pending.
    pub fn add_update(&self, update: BatchUpdate) {
        let mut buffer = self.buffer.lock();
        buffer.updates.push(update);

        if buffer.updates.len() >= self.config.size {
            Self::flush_buffer(&mut buffer, &self.store);
        } else if buffer.timer.is_none() {
            self.arm_timer(&mut buffer);
        }
    }

    /// Apply everything buffered now and cancel the pending timer
    pub fn flush(&self) {
        let mut buffer = self.buffer.lock();
        Self::flush_buffer(&mut buffer, &self.store);
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().updates.len()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.buffer.lock().timer.is_some()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn arm_timer(&self, buffer: &mut BatchBuffer) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available for the batch timer, flushing immediately");
                Self::flush_buffer(buffer, &self.store);
                return;
            }
        };

        let shared = Arc::clone(&self.buffer);
        let store = self.store.clone();
        let generation = buffer.generation;
        let timeout = self.config.timeout;

        buffer.timer = Some(handle.spawn(async move {
            tokio::time::sleep(timeout).await;

            let mut buffer = shared.lock();
            if buffer.generation != generation {
                return;
            }
            // our own handle; dropping it detaches rather than aborts
            buffer.timer = None;
            debug!("Batch timeout reached after {:?}", timeout);
            Self::flush_buffer(&mut buffer, &store);
        }));
    }

    fn flush_buffer(buffer: &mut BatchBuffer, store: &ExecutionStore) {
        if let Some(timer) = buffer.timer.take() {
            timer.abort();
        }
        buffer.generation = buffer.generation.wrapping_add(1);

        if buffer.updates.is_empty() {
            return;
        }

        let updates = std::mem::take(&mut buffer.updates);
        debug!("Flushing {} batched updates", updates.len());
        store.apply_batch(&updates);
    }
}
