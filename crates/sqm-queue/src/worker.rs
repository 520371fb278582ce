//! Single-worker drain loop: starts a changelog batch on the first dequeue
//! after idle, finalizes it once the queue runs dry, and invokes the
//! injected [`ChannelChecker`] for everything in between.

use crate::checker::ChannelChecker;
use crate::queue::ChannelQueue;
use sqm_changelog::Changelog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct QueueWorker {
    queue: Arc<ChannelQueue>,
    changelog: Arc<Changelog>,
    checker: Arc<dyn ChannelChecker>,
    running: Arc<AtomicBool>,
}

impl QueueWorker {
    pub fn new(queue: Arc<ChannelQueue>, changelog: Arc<Changelog>, checker: Arc<dyn ChannelChecker>) -> Self {
        Self {
            queue,
            changelog,
            checker,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs until [`QueueWorker::stop`] is called. Intended to be spawned
    /// once for the lifetime of the process.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        let mut batch_open = false;

        while self.running.load(Ordering::SeqCst) {
            let Some(item) = self.queue.dequeue() else {
                if batch_open {
                    debug!("queue drained, finalizing batch");
                    if let Err(err) = self.changelog.finalize_batch().await {
                        error!(error = %err, "failed to finalize changelog batch");
                    }
                    batch_open = false;
                }
                sleep(IDLE_POLL_INTERVAL).await;
                continue;
            };

            if !batch_open && !item.skip_batch_entry {
                self.changelog.start_batch(false);
                batch_open = true;
            }

            info!(channel_id = item.channel_id.0, priority = item.priority, "checking channel");
            match self.checker.check_channel(item.channel_id).await {
                Ok(()) => self.queue.mark_completed(item.channel_id),
                Err(err) => {
                    warn!(channel_id = item.channel_id.0, error = %err, "channel check failed");
                    self.queue.mark_failed(item.channel_id, err);
                }
            }
        }

        if batch_open {
            if let Err(err) = self.changelog.finalize_batch().await {
                error!(error = %err, "failed to finalize changelog batch on shutdown");
            }
        }
    }
}
