use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;

use crate::media::ItemState;

use super::{Membership, Queue, QueueError, QueueManager};

/// Items that found nothing, waiting to try again.
pub struct SleepingQueue {
    membership: Membership,
}

impl SleepingQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }
}

impl Default for SleepingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for SleepingQueue {
    fn state(&self) -> ItemState {
        ItemState::Sleeping
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let sleep = Duration::minutes(manager.config().queues.sleep_duration_minutes as i64);
        let now = manager.now();

        for entry in self.get_contents().await {
            if now - entry.entered_at < sleep {
                continue;
            }
            let mut item = entry.item;
            item.wake_count += 1;
            let limit = manager.wake_limit(&item);
            debug!(item_id = item.id, wake_count = item.wake_count, limit, "Waking item");
            if item.wake_count >= limit {
                manager.move_to_final_or_blacklist(item).await?;
            } else {
                manager.move_to_wanted(item).await?;
            }
        }
        Ok(())
    }
}
