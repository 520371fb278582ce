//! The worker never depends on the pipeline crate directly — it is handed a
//! [`ChannelChecker`] implementation at construction instead.

use async_trait::async_trait;
use sqm_common::ChannelId;

#[async_trait]
pub trait ChannelChecker: Send + Sync {
    async fn check_channel(&self, channel_id: ChannelId) -> Result<(), String>;
}
