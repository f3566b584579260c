//! In-memory broker implementation.
//!
//! Design:
//! - `records` is the single source of truth for task state.
//! - Lane and heap structures hold TaskIds only; heap entries are validated
//!   against the record when popped, so stale entries are skipped.
//! - Time comes from the injected [`Clock`], never from the OS directly.
//! - Every dequeue bumps `attempt`; acks and nacks must carry the current
//!   one, so a worker whose lease expired cannot settle the new delivery.
//! - Completed and archived records stay until `purge_terminal` drops them.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{DeliveryOptions, QueueName, Schedule, TaskEnvelope, TaskId, TaskState};
use crate::ports::{
    Broker, BrokerError, Clock, Delivery, DeliveryTag, IdGenerator, QueueCounts,
    RetryDisposition, SystemClock, TaskInfo, UlidGenerator,
};
use crate::settings::BrokerSettings;

/// Metadata + envelope for a task held by the broker.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub envelope: TaskEnvelope,
    pub queue: QueueName,
    pub state: TaskState,

    /// Number of failed attempts so far.
    pub retried: u32,
    pub max_retry: u32,

    /// Number of times the task was handed to a worker.
    pub attempt: u64,

    /// Last error message (if any).
    pub last_error: Option<String>,

    /// When the task becomes (or became) eligible for delivery.
    pub ready_at: DateTime<Utc>,

    /// Set while Active; the task is re-delivered once this passes.
    pub lease_deadline: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    fn touch(&mut self, state: TaskState, now: DateTime<Utc>) {
        self.state = state;
        self.updated_at = now;
    }
}

/// Timed heap entry.
///
/// We use Reverse ordering so BinaryHeap acts as a min-heap (earliest
/// first); `seq` keeps entries with the same time in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Timed {
    at: DateTime<Utc>,
    seq: u64,
    task_id: TaskId,
}

impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timed {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct BrokerState {
    records: HashMap<TaskId, TaskRecord>,

    /// Pending tasks per lane, FIFO.
    lanes: HashMap<QueueName, VecDeque<TaskId>>,

    /// Scheduled and Retry tasks by ready_at.
    scheduled: BinaryHeap<Timed>,

    /// Active tasks by lease deadline.
    leases: BinaryHeap<Timed>,

    seq: u64,
    closed: bool,
}

impl BrokerState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn push_pending(&mut self, id: TaskId, queue: &QueueName) {
        self.lanes.entry(queue.clone()).or_default().push_back(id);
    }

    fn push_scheduled(&mut self, id: TaskId, at: DateTime<Utc>) {
        let seq = self.next_seq();
        self.scheduled.push(Timed {
            at,
            seq,
            task_id: id,
        });
    }

    /// Move tasks from scheduled/retry to pending if their time has come.
    fn promote_ready(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            let Some(record) = self.records.get_mut(&entry.task_id) else {
                continue;
            };
            if matches!(record.state, TaskState::Scheduled | TaskState::Retry)
                && record.ready_at == entry.at
            {
                record.touch(TaskState::Pending, now);
                let queue = record.queue.clone();
                self.push_pending(entry.task_id, &queue);
            }
        }
    }

    /// Put Active tasks whose lease ran out back in their lane.
    fn reclaim_expired(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.leases.peek() {
            if entry.at > now {
                break;
            }
            let Some(entry) = self.leases.pop() else {
                break;
            };
            let Some(record) = self.records.get_mut(&entry.task_id) else {
                continue;
            };
            if record.state == TaskState::Active && record.lease_deadline == Some(entry.at) {
                warn!(task.id = %record.id, queue = %record.queue, "lease expired, re-delivering task");
                record.lease_deadline = None;
                record.touch(TaskState::Pending, now);
                let queue = record.queue.clone();
                self.push_pending(entry.task_id, &queue);
            }
        }
    }

    /// The record `tag` may still settle.
    fn active_mut(&mut self, tag: DeliveryTag) -> Result<&mut TaskRecord, BrokerError> {
        match self.records.get_mut(&tag.id) {
            Some(record) if record.attempt != tag.attempt => Err(BrokerError::Superseded(tag)),
            Some(record) if record.state == TaskState::Active => Ok(record),
            _ => Err(BrokerError::NotInFlight(tag.id)),
        }
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Scheduled => counts.scheduled += 1,
                TaskState::Pending => counts.pending += 1,
                TaskState::Active => counts.active += 1,
                TaskState::Retry => counts.retry += 1,
                TaskState::Archived => counts.archived += 1,
                TaskState::Completed => counts.completed += 1,
            }
        }
        counts
    }
}

/// In-memory broker for development and tests.
///
/// Completed and archived records are kept so they can be inspected; call
/// [`InMemoryBroker::purge_terminal`] periodically in long-running processes.
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    lease_timeout: Duration,
}

impl InMemoryBroker {
    pub fn new(settings: &BrokerSettings) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            lease_timeout: settings.lease_timeout(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Stops accepting and handing out tasks. Outstanding acks still work.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    pub async fn task(&self, id: TaskId) -> Option<TaskRecord> {
        self.state.lock().await.records.get(&id).cloned()
    }

    /// Drops completed and archived records last touched at least
    /// `older_than` ago. Returns how many were removed.
    pub async fn purge_terminal(&self, older_than: Duration) -> usize {
        let now = self.clock.now();
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
        else {
            return 0;
        };
        let mut state = self.state.lock().await;
        let before = state.records.len();
        state
            .records
            .retain(|_, record| !(record.state.is_terminal() && record.updated_at <= cutoff));
        let purged = before - state.records.len();
        if purged > 0 {
            debug!(purged, "purged finished tasks");
        }
        purged
    }

    /// All records, oldest first.
    pub async fn tasks(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(&BrokerSettings::default())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(
        &self,
        envelope: TaskEnvelope,
        options: &DeliveryOptions,
    ) -> Result<TaskInfo, BrokerError> {
        if envelope.task_type().is_empty() {
            return Err(BrokerError::Rejected("task type must not be empty".into()));
        }
        if options.queue.as_str().is_empty() {
            return Err(BrokerError::Rejected("queue name must not be empty".into()));
        }

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(BrokerError::Closed);
        }

        let now = self.clock.now();
        let id = self.ids.generate_task_id();
        let ready_at = options.schedule.ready_at(now);
        let initial = if ready_at <= now {
            TaskState::Pending
        } else {
            TaskState::Scheduled
        };

        state.records.insert(
            id,
            TaskRecord {
                id,
                envelope,
                queue: options.queue.clone(),
                state: initial,
                retried: 0,
                max_retry: options.max_retry,
                attempt: 0,
                last_error: None,
                ready_at,
                lease_deadline: None,
                created_at: now,
                updated_at: now,
            },
        );
        match initial {
            TaskState::Pending => state.push_pending(id, &options.queue),
            _ => state.push_scheduled(id, ready_at),
        }

        Ok(TaskInfo {
            id,
            queue: options.queue.clone(),
            max_retry: options.max_retry,
            ready_at,
        })
    }

    async fn dequeue(&self, queues: &[QueueName]) -> Result<Option<Delivery>, BrokerError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(BrokerError::Closed);
        }

        let now = self.clock.now();
        state.promote_ready(now);
        state.reclaim_expired(now);

        let lease_deadline = Schedule::In(self.lease_timeout).ready_at(now);
        for queue in queues {
            while let Some(id) = state.lanes.get_mut(queue).and_then(VecDeque::pop_front) {
                let Some(record) = state.records.get_mut(&id) else {
                    continue;
                };
                if record.state != TaskState::Pending {
                    continue;
                }
                record.attempt += 1;
                record.lease_deadline = Some(lease_deadline);
                record.touch(TaskState::Active, now);
                let delivery = Delivery {
                    id,
                    attempt: record.attempt,
                    envelope: record.envelope.clone(),
                    queue: record.queue.clone(),
                    retried: record.retried,
                    max_retry: record.max_retry,
                };

                let seq = state.next_seq();
                state.leases.push(Timed {
                    at: lease_deadline,
                    seq,
                    task_id: id,
                });
                return Ok(Some(delivery));
            }
        }
        Ok(None)
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let record = state.active_mut(tag)?;
        record.lease_deadline = None;
        record.touch(TaskState::Completed, now);
        Ok(())
    }

    async fn nack_with_retry(
        &self,
        tag: DeliveryTag,
        error: &str,
        delay: Duration,
    ) -> Result<RetryDisposition, BrokerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let record = state.active_mut(tag)?;
        record.lease_deadline = None;
        record.last_error = Some(error.to_string());

        if record.retried >= record.max_retry {
            record.touch(TaskState::Archived, now);
            return Ok(RetryDisposition::Archived {
                retried: record.retried,
            });
        }

        record.retried += 1;
        record.ready_at = Schedule::In(delay).ready_at(now);
        record.touch(TaskState::Retry, now);
        let disposition = RetryDisposition::Scheduled {
            retried: record.retried,
            ready_at: record.ready_at,
        };
        let ready_at = record.ready_at;
        debug!(task.id = %tag.id, %ready_at, "task scheduled for retry");
        state.push_scheduled(tag.id, ready_at);
        Ok(disposition)
    }

    async fn nack_permanent(&self, tag: DeliveryTag, error: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let record = state.active_mut(tag)?;
        record.lease_deadline = None;
        record.last_error = Some(error.to_string());
        record.touch(TaskState::Archived, now);
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, BrokerError> {
        Ok(self.state.lock().await.counts())
    }
}
