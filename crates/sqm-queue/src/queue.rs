//! Bounded priority queue of channel ids plus the four membership sets that
//! track where a channel currently sits in its check lifecycle.
//!
//! Lower `priority` is serviced first; ties are broken by insertion order.
//! A channel id lives in at most one of `queued` / `in_progress` / `completed`
//! / `failed` at any instant. Re-queueing a channel already in `completed`
//! is rejected unless [`ChannelQueue::remove_from_completed`] is called
//! first; a channel in `failed` is implicitly released back to `queued` on
//! the next [`ChannelQueue::enqueue`] call, since a failed check is retried
//! rather than treated as a terminal state.

use crate::error::{QueueError, Result};
use dashmap::{DashMap, DashSet};
use sqm_common::ChannelId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;

pub const DEFAULT_PRIORITY_UPDATE_DRIVEN: i32 = 10;
pub const DEFAULT_PRIORITY_GLOBAL: i32 = 5;
pub const DEFAULT_PRIORITY_MANUAL: i32 = 10;

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub channel_id: ChannelId,
    pub priority: i32,
    pub force_check: bool,
    pub skip_batch_entry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapKey {
    priority: i32,
    seq: u64,
    channel_id: ChannelId,
}

pub struct ChannelQueue {
    max_size: usize,
    heap: Mutex<BinaryHeap<Reverse<HeapKey>>>,
    items: DashMap<ChannelId, QueueItem>,
    seq: AtomicU64,
    queued: DashSet<ChannelId>,
    in_progress: DashSet<ChannelId>,
    completed: DashSet<ChannelId>,
    failed: DashMap<ChannelId, String>,
}

impl ChannelQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            heap: Mutex::new(BinaryHeap::new()),
            items: DashMap::new(),
            seq: AtomicU64::new(0),
            queued: DashSet::new(),
            in_progress: DashSet::new(),
            completed: DashSet::new(),
            failed: DashMap::new(),
        }
    }

    /// Enqueue `channel_id`. A no-op (returns `Ok`) if the channel is
    /// already `queued` or `in_progress`. Rejects a channel still sitting
    /// in `completed`; releases one sitting in `failed` automatically.
    pub fn enqueue(&self, channel_id: ChannelId, priority: i32, force_check: bool, skip_batch_entry: bool) -> Result<()> {
        if self.queued.contains(&channel_id) || self.in_progress.contains(&channel_id) {
            return Ok(());
        }
        if self.completed.contains(&channel_id) {
            return Err(QueueError::StillCompleted(channel_id.0));
        }
        if self.queued.len() >= self.max_size {
            return Err(QueueError::Full(self.max_size));
        }

        self.failed.remove(&channel_id);

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.items.insert(
            channel_id,
            QueueItem { channel_id, priority, force_check, skip_batch_entry },
        );
        self.queued.insert(channel_id);
        self.heap.lock().push(Reverse(HeapKey { priority, seq, channel_id }));
        Ok(())
    }

    /// Pop the highest-priority (lowest value) channel, moving it from
    /// `queued` to `in_progress`. Stale heap entries left behind by a
    /// channel that was dequeued out from under its seq are skipped.
    pub fn dequeue(&self) -> Option<QueueItem> {
        loop {
            let key = self.heap.lock().pop()?.0;
            if !self.queued.remove(&key.channel_id).is_some() {
                continue;
            }
            let Some((_, item)) = self.items.remove(&key.channel_id) else { continue };
            self.in_progress.insert(key.channel_id);
            return Some(item);
        }
    }

    pub fn mark_completed(&self, channel_id: ChannelId) {
        self.in_progress.remove(&channel_id);
        self.completed.insert(channel_id);
    }

    pub fn mark_failed(&self, channel_id: ChannelId, reason: impl Into<String>) {
        self.in_progress.remove(&channel_id);
        self.failed.insert(channel_id, reason.into());
    }

    pub fn remove_from_completed(&self, channel_id: ChannelId) -> bool {
        self.completed.remove(&channel_id).is_some()
    }

    pub fn is_queued(&self, channel_id: ChannelId) -> bool {
        self.queued.contains(&channel_id)
    }

    pub fn is_in_progress(&self, channel_id: ChannelId) -> bool {
        self.in_progress.contains(&channel_id)
    }

    pub fn is_completed(&self, channel_id: ChannelId) -> bool {
        self.completed.contains(&channel_id)
    }

    pub fn failure_reason(&self, channel_id: ChannelId) -> Option<String> {
        self.failed.get(&channel_id).map(|r| r.clone())
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.in_progress.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequeues_in_priority_then_fifo_order() {
        let queue = ChannelQueue::new(10);
        queue.enqueue(ChannelId(1), 10, false, false).unwrap();
        queue.enqueue(ChannelId(2), 5, false, false).unwrap();
        queue.enqueue(ChannelId(3), 10, false, false).unwrap();

        assert_eq!(queue.dequeue().unwrap().channel_id, ChannelId(2));
        assert_eq!(queue.dequeue().unwrap().channel_id, ChannelId(1));
        assert_eq!(queue.dequeue().unwrap().channel_id, ChannelId(3));
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn duplicate_enqueue_while_queued_is_a_no_op() {
        let queue = ChannelQueue::new(10);
        queue.enqueue(ChannelId(1), 10, false, false).unwrap();
        queue.enqueue(ChannelId(1), 5, false, false).unwrap();
        assert_eq!(queue.queued_len(), 1);
    }

    #[test]
    fn completed_channel_rejects_requeue_until_removed() {
        let queue = ChannelQueue::new(10);
        queue.enqueue(ChannelId(1), 10, false, false).unwrap();
        queue.dequeue();
        queue.mark_completed(ChannelId(1));

        assert!(matches!(
            queue.enqueue(ChannelId(1), 10, false, false),
            Err(QueueError::StillCompleted(1))
        ));

        queue.remove_from_completed(ChannelId(1));
        assert!(queue.enqueue(ChannelId(1), 10, false, false).is_ok());
    }

    #[test]
    fn failed_channel_is_released_back_to_queued_automatically() {
        let queue = ChannelQueue::new(10);
        queue.enqueue(ChannelId(1), 10, false, false).unwrap();
        queue.dequeue();
        queue.mark_failed(ChannelId(1), "ffmpeg spawn failed");
        assert_eq!(queue.failure_reason(ChannelId(1)).as_deref(), Some("ffmpeg spawn failed"));

        queue.enqueue(ChannelId(1), 10, false, false).unwrap();
        assert!(queue.failure_reason(ChannelId(1)).is_none());
        assert!(queue.is_queued(ChannelId(1)));
    }

    #[test]
    fn full_queue_rejects_new_enqueues() {
        let queue = ChannelQueue::new(1);
        queue.enqueue(ChannelId(1), 10, false, false).unwrap();
        assert!(matches!(queue.enqueue(ChannelId(2), 10, false, false), Err(QueueError::Full(1))));
    }
}
