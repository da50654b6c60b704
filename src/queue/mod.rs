//! Bounded-concurrency bump queue
//!
//! A FIFO of admission-approved [`QueueItem`]s drained into at most
//! `max_concurrent` running jobs. Every completion (success, failure or
//! panic) frees its slot and immediately triggers another drain, so
//! capacity is never left idle while work is pending.
//!
//! Items are never dropped or retried. The caller gets a [`Ticket`] with
//! its position at enqueue time and a oneshot receiver for the job's
//! output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tracing::debug;

use crate::types::{CommunityId, MemberId};

/// One admitted broadcast request. Immutable once created.
#[derive(Debug, Clone)]
pub struct QueueItem {
    actor: MemberId,
    community: CommunityId,
    cooldown: Duration,
    enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(actor: MemberId, community: CommunityId, cooldown: Duration) -> Self {
        Self {
            actor,
            community,
            cooldown,
            enqueued_at: Utc::now(),
        }
    }

    pub fn actor(&self) -> &MemberId {
        &self.actor
    }

    pub fn community(&self) -> &CommunityId {
        &self.community
    }

    /// Cooldown in effect when the item was admitted
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}

/// Work performed for each dequeued item
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn handle(&self, item: &QueueItem) -> Self::Output;
}

/// Handle returned from [`BumpQueue::enqueue`]
pub struct Ticket<T> {
    /// 1-based position among waiting items at enqueue time
    pub position: usize,
    /// Resolves with the job output once it has run
    pub outcome: oneshot::Receiver<T>,
}

/// Observable queue state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub depth: usize,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub completed: u64,
}

struct Pending<T> {
    item: QueueItem,
    reply: oneshot::Sender<T>,
}

struct QueueInner<T> {
    pending: VecDeque<Pending<T>>,
    in_flight: usize,
}

pub struct BumpQueue<H: JobHandler> {
    handler: Arc<H>,
    max_concurrent: usize,
    inner: Mutex<QueueInner<H::Output>>,
    completed: AtomicU64,
    idle: Notify,
}

impl<H: JobHandler> BumpQueue<H> {
    pub fn new(handler: Arc<H>, max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            handler,
            max_concurrent: max_concurrent.max(1),
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                in_flight: 0,
            }),
            completed: AtomicU64::new(0),
            idle: Notify::new(),
        })
    }

    /// Append an item and try to dispatch
    pub fn enqueue(self: &Arc<Self>, item: QueueItem) -> Ticket<H::Output> {
        let (reply, outcome) = oneshot::channel();
        let position = {
            let mut inner = self.lock();
            inner.pending.push_back(Pending { item, reply });
            inner.pending.len()
        };
        debug!(position, "Bump enqueued");

        self.drain();
        Ticket { position, outcome }
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();
        QueueStats {
            depth: inner.pending.len(),
            in_flight: inner.in_flight,
            max_concurrent: self.max_concurrent,
            completed: self.completed.load(Ordering::Relaxed),
        }
    }

    /// Wait until nothing is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            {
                let inner = self.lock();
                if inner.pending.is_empty() && inner.in_flight == 0 {
                    return;
                }
            }
            notified.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner<H::Output>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start jobs while there is capacity and pending work
    fn drain(self: &Arc<Self>) {
        loop {
            let next = {
                let mut inner = self.lock();
                if inner.in_flight >= self.max_concurrent {
                    return;
                }
                let Some(next) = inner.pending.pop_front() else {
                    return;
                };
                inner.in_flight += 1;
                next
            };

            let queue = Arc::clone(self);
            tokio::spawn(async move {
                let _slot = SlotGuard {
                    queue: Arc::clone(&queue),
                };
                let output = queue.handler.handle(&next.item).await;
                queue.completed.fetch_add(1, Ordering::Relaxed);
                // Requester may have stopped waiting
                let _ = next.reply.send(output);
            });
        }
    }

    fn release(self: &Arc<Self>) {
        let idle = {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.pending.is_empty() && inner.in_flight == 0
        };
        if idle {
            self.idle.notify_waiters();
        }
        self.drain();
    }
}

/// Frees a concurrency slot when a job ends, including by panic
struct SlotGuard<H: JobHandler> {
    queue: Arc<BumpQueue<H>>,
}

impl<H: JobHandler> Drop for SlotGuard<H> {
    fn drop(&mut self) {
        self.queue.release();
    }
}
