//! The universal data index: in-memory snapshot of the aggregator's
//! channel/stream/group/logo/provider/profile catalog, with a persisted
//! JSON mirror and a short-TTL live-status cache.
//!
//! Index rebuilds take a single write lock (`parking_lot::RwLock`, chosen
//! over the std sync types for hot paths) so readers always see either the
//! old or the new snapshot, never a partial one.

use chrono::Utc;
use parking_lot::RwLock;
use sqm_aggregator::AggregatorClient;
use sqm_common::model::{Channel, ChannelGroup, Logo, Profile, Provider, Stream};
use sqm_common::{atomic, ChannelId, GroupId, LogoId, ProfileId, ProviderId, StreamId};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::{Result, UdiError};
use crate::proxy::ProxyStatusCache;
use crate::snapshot::Snapshot;
use crate::transform::apply_url_transformation;

#[derive(Debug, Default)]
struct Indexes {
    channels: HashMap<ChannelId, Channel>,
    streams: HashMap<StreamId, Stream>,
    streams_by_url: HashMap<String, StreamId>,
    groups: HashMap<GroupId, ChannelGroup>,
    logos: HashMap<LogoId, Logo>,
    providers: HashMap<ProviderId, Provider>,
    profiles_by_id: HashMap<ProfileId, Profile>,
    last_refresh: HashMap<String, chrono::DateTime<Utc>>,
}

impl Indexes {
    fn rebuild_profiles(&mut self) {
        self.profiles_by_id.clear();
        for provider in self.providers.values() {
            for profile in &provider.profiles {
                self.profiles_by_id.insert(profile.id, profile.clone());
            }
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            schema_version: crate::snapshot::SCHEMA_VERSION,
            channels: self.channels.values().cloned().collect(),
            streams: self.streams.values().cloned().collect(),
            groups: self.groups.values().cloned().collect(),
            logos: self.logos.values().cloned().collect(),
            providers: self.providers.values().cloned().collect(),
            extra_profiles: Vec::new(),
            last_refresh: self.last_refresh.clone(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut idx = Indexes {
            channels: snapshot.channels.into_iter().map(|c| (c.id, c)).collect(),
            streams_by_url: HashMap::new(),
            streams: snapshot.streams.into_iter().map(|s| (s.id, s)).collect(),
            groups: snapshot.groups.into_iter().map(|g| (g.id, g)).collect(),
            logos: snapshot.logos.into_iter().map(|l| (l.id, l)).collect(),
            providers: snapshot.providers.into_iter().map(|p| (p.id, p)).collect(),
            profiles_by_id: HashMap::new(),
            last_refresh: snapshot.last_refresh,
        };
        idx.streams_by_url = idx.streams.values().map(|s| (s.url.clone(), s.id)).collect();
        idx.rebuild_profiles();
        idx
    }
}

pub struct Udi {
    client: AggregatorClient,
    indexes: RwLock<Indexes>,
    proxy_cache: ProxyStatusCache,
    snapshot_path: PathBuf,
}

impl Udi {
    pub async fn new(client: AggregatorClient, snapshot_path: PathBuf) -> Self {
        let snapshot: Snapshot = atomic::read_json_or_default(&snapshot_path).await;
        Self {
            client,
            indexes: RwLock::new(Indexes::from_snapshot(snapshot)),
            proxy_cache: ProxyStatusCache::new(),
            snapshot_path,
        }
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.indexes.read().to_snapshot();
        atomic::write_json_atomic(&self.snapshot_path, &snapshot).await?;
        Ok(())
    }

    fn mark_refreshed(&self, entity: &str) {
        self.indexes
            .write()
            .last_refresh
            .insert(entity.to_string(), Utc::now());
    }

    // --- refresh ------------------------------------------------------------

    pub async fn refresh_channels(&self) -> Result<()> {
        let channels = self.client.get_channels().await?;
        {
            let mut idx = self.indexes.write();
            idx.channels = channels.into_iter().map(|c| (c.id, c)).collect();
        }
        self.mark_refreshed("channels");
        self.persist().await
    }

    pub async fn refresh_channel_by_id(&self, id: ChannelId) -> Result<()> {
        let channel = self.client.get_channel(id).await?;
        self.indexes.write().channels.insert(channel.id, channel);
        self.mark_refreshed("channels");
        self.persist().await
    }

    pub async fn refresh_streams(&self) -> Result<()> {
        let streams = self.client.get_streams().await?;
        {
            let mut idx = self.indexes.write();
            idx.streams_by_url = streams.iter().map(|s| (s.url.clone(), s.id)).collect();
            idx.streams = streams.into_iter().map(|s| (s.id, s)).collect();
        }
        self.mark_refreshed("streams");
        self.persist().await
    }

    pub async fn refresh_groups(&self) -> Result<()> {
        let groups = self.client.get_groups().await?;
        {
            let mut idx = self.indexes.write();
            idx.groups = groups.into_iter().map(|g| (g.id, g)).collect();
        }
        self.mark_refreshed("groups");
        self.persist().await
    }

    pub async fn refresh_logos(&self) -> Result<()> {
        let logos = self.client.get_logos().await?;
        {
            let mut idx = self.indexes.write();
            idx.logos = logos.into_iter().map(|l| (l.id, l)).collect();
        }
        self.mark_refreshed("logos");
        self.persist().await
    }

    pub async fn refresh_providers(&self) -> Result<()> {
        let providers = self.client.get_providers().await?;
        {
            let mut idx = self.indexes.write();
            idx.providers = providers.into_iter().map(|p| (p.id, p)).collect();
            idx.rebuild_profiles();
        }
        self.mark_refreshed("providers");
        self.persist().await
    }

    /// Profiles are normally embedded on their provider; this pulls the
    /// flat profile listing and keeps the standalone `profiles_by_id`
    /// index current without requiring a full provider refresh.
    pub async fn refresh_channel_profiles(&self) -> Result<()> {
        let profiles = self.client.get_channel_profiles().await?;
        {
            let mut idx = self.indexes.write();
            for profile in profiles {
                idx.profiles_by_id.insert(profile.id, profile);
            }
        }
        self.mark_refreshed("channel_profiles");
        self.persist().await
    }

    pub async fn refresh_all(&self) -> Result<()> {
        self.refresh_channels().await?;
        self.refresh_streams().await?;
        self.refresh_groups().await?;
        self.refresh_logos().await?;
        self.refresh_providers().await?;
        self.refresh_channel_profiles().await?;
        Ok(())
    }

    // --- write-through --------------------------------------------------------

    /// Caller has already issued the aggregator PATCH for `record`; mirror
    /// it into the in-memory index and on-disk snapshot.
    pub async fn update_channel(&self, record: Channel) -> Result<()> {
        self.indexes.write().channels.insert(record.id, record);
        self.persist().await
    }

    pub async fn update_stream(&self, record: Stream) -> Result<()> {
        {
            let mut idx = self.indexes.write();
            idx.streams_by_url.insert(record.url.clone(), record.id);
            idx.streams.insert(record.id, record);
        }
        self.persist().await
    }

    // --- reads -----------------------------------------------------------------

    pub fn get_channels(&self) -> Vec<Channel> {
        self.indexes.read().channels.values().cloned().collect()
    }

    pub fn get_channel_by_id(&self, id: ChannelId) -> Option<Channel> {
        self.indexes.read().channels.get(&id).cloned()
    }

    pub fn get_streams(&self) -> Vec<Stream> {
        self.indexes.read().streams.values().cloned().collect()
    }

    pub fn get_stream_by_id(&self, id: StreamId) -> Option<Stream> {
        self.indexes.read().streams.get(&id).cloned()
    }

    pub fn get_stream_by_url(&self, url: &str) -> Option<Stream> {
        let idx = self.indexes.read();
        idx.streams_by_url.get(url).and_then(|id| idx.streams.get(id)).cloned()
    }

    pub fn get_groups(&self) -> Vec<ChannelGroup> {
        self.indexes.read().groups.values().cloned().collect()
    }

    pub fn get_logos(&self) -> Vec<Logo> {
        self.indexes.read().logos.values().cloned().collect()
    }

    pub fn get_providers(&self) -> Vec<Provider> {
        self.indexes.read().providers.values().cloned().collect()
    }

    pub fn get_provider_by_id(&self, id: ProviderId) -> Option<Provider> {
        self.indexes.read().providers.get(&id).cloned()
    }

    pub fn get_channel_profiles(&self) -> Vec<Profile> {
        self.indexes.read().profiles_by_id.values().cloned().collect()
    }

    /// Stream records in the channel's configured play order.
    pub fn get_channel_streams(&self, channel_id: ChannelId) -> Result<Vec<Stream>> {
        let idx = self.indexes.read();
        let channel = idx
            .channels
            .get(&channel_id)
            .ok_or(UdiError::ChannelNotFound(channel_id.0))?;
        Ok(channel
            .streams
            .iter()
            .filter_map(|id| idx.streams.get(id).cloned())
            .collect())
    }

    pub fn get_valid_stream_ids(&self) -> HashSet<StreamId> {
        self.indexes.read().streams.keys().copied().collect()
    }

    pub fn has_custom_streams(&self) -> bool {
        self.indexes.read().streams.values().any(|s| s.is_custom)
    }

    // --- profile/live ------------------------------------------------------------

    pub fn apply_profile_url_transformation(&self, stream: &Stream, profile: Option<&Profile>) -> String {
        match profile {
            Some(profile) => apply_url_transformation(
                &stream.url,
                profile.search_pattern.as_deref().unwrap_or(""),
                profile.replace_pattern.as_deref().unwrap_or(""),
            ),
            None => stream.url.clone(),
        }
    }

    /// First active profile of `stream`'s provider with room for another
    /// viewer, judged purely on live active-viewer counts (the checking-
    /// in-flight arithmetic used during acquisition is the limiter's job).
    pub async fn find_available_profile_for_stream(&self, stream: &Stream) -> Result<Option<Profile>> {
        let Some(provider_id) = stream.provider_id else {
            return Ok(None);
        };
        let Some(provider) = self.get_provider_by_id(provider_id) else {
            return Ok(None);
        };
        for profile in provider.profiles.iter().filter(|p| p.is_active) {
            if profile.max_streams == 0 {
                return Ok(Some(profile.clone()));
            }
            let active = self.get_active_streams_for_profile(provider_id, profile.id).await?;
            if active < profile.max_streams {
                return Ok(Some(profile.clone()));
            }
        }
        Ok(None)
    }

    /// Active iff proxy-status marks the channel's state as active AND its
    /// `m3u_profile_id` equals `profile_id` (provider is only used to scope
    /// the query in the same shape as `get_active_streams_for_provider`).
    pub async fn get_active_streams_for_profile(&self, _provider_id: ProviderId, profile_id: ProfileId) -> Result<i64> {
        let status = self.proxy_cache.get(&self.client).await?;
        Ok(status
            .values()
            .filter(|entry| entry.is_active() && entry.m3u_profile_id == Some(profile_id.0))
            .count() as i64)
    }

    pub async fn get_active_streams_for_provider(&self, provider_id: ProviderId) -> Result<i64> {
        let Some(provider) = self.get_provider_by_id(provider_id) else {
            return Ok(0);
        };
        let status = self.proxy_cache.get(&self.client).await?;
        let profile_ids: HashSet<i64> = provider.profiles.iter().map(|p| p.id.0).collect();
        Ok(status
            .values()
            .filter(|entry| {
                entry.is_active()
                    && entry
                        .m3u_profile_id
                        .is_some_and(|id| profile_ids.is_empty() || profile_ids.contains(&id))
            })
            .count() as i64)
    }

    pub async fn is_channel_active(&self, channel_id: ChannelId) -> Result<bool> {
        let status = self.proxy_cache.get(&self.client).await?;
        Ok(status
            .get(&channel_id.0.to_string())
            .is_some_and(|entry| entry.is_active()))
    }

    pub async fn invalidate_live_status(&self) {
        self.proxy_cache.invalidate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqm_aggregator::AggregatorClientConfig;
    use sqm_common::model::PriorityMode;
    use std::time::Duration;

    fn test_client() -> AggregatorClient {
        AggregatorClient::new(AggregatorClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            username: None,
            password: None,
            initial_token: Some("t".to_string()),
            request_timeout: Duration::from_millis(50),
        })
    }

    async fn empty_udi() -> Udi {
        let dir = tempfile::tempdir().unwrap();
        Udi::new(test_client(), dir.path().join("udi.json")).await
    }

    fn provider(id: i64, max_streams: i64, profiles: Vec<Profile>) -> Provider {
        Provider {
            id: ProviderId(id),
            name: format!("provider-{id}"),
            is_active: true,
            max_streams,
            profiles,
            priority: 0,
            priority_mode: PriorityMode::Disabled,
        }
    }

    fn profile(id: i64, max_streams: i64) -> Profile {
        Profile {
            id: ProfileId(id),
            name: format!("profile-{id}"),
            is_active: true,
            max_streams,
            search_pattern: None,
            replace_pattern: None,
        }
    }

    #[tokio::test]
    async fn write_through_update_channel_is_readable_immediately() {
        let udi = empty_udi().await;
        let channel = Channel {
            id: ChannelId(1),
            name: "News".to_string(),
            number: Some(1.0),
            group_id: None,
            tvg_id: None,
            epg_id: None,
            logo_id: None,
            streams: vec![],
            uuid: None,
            stream_preference: None,
        };
        udi.update_channel(channel.clone()).await.unwrap();
        assert_eq!(udi.get_channel_by_id(ChannelId(1)).unwrap().name, "News");
    }

    #[tokio::test]
    async fn get_channel_streams_preserves_play_order() {
        let udi = empty_udi().await;
        for (i, url) in ["a", "b", "c"].iter().enumerate() {
            let stream = Stream {
                id: StreamId(i as i64 + 1),
                name: url.to_string(),
                url: url.to_string(),
                provider_id: None,
                is_custom: false,
                stream_stats: None,
                current_viewers: 0,
            };
            udi.update_stream(stream).await.unwrap();
        }
        let channel = Channel {
            id: ChannelId(1),
            name: "Ch".to_string(),
            number: None,
            group_id: None,
            tvg_id: None,
            epg_id: None,
            logo_id: None,
            streams: vec![StreamId(3), StreamId(1), StreamId(2)],
            uuid: None,
            stream_preference: None,
        };
        udi.update_channel(channel).await.unwrap();

        let streams = udi.get_channel_streams(ChannelId(1)).unwrap();
        let names: Vec<_> = streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("udi.json");
        {
            let udi = Udi::new(test_client(), path.clone()).await;
            {
                let mut idx = udi.indexes.write();
                idx.providers.insert(ProviderId(1), provider(1, 0, vec![profile(1, 2)]));
                idx.rebuild_profiles();
            }
            udi.persist().await.unwrap();
        }
        let reloaded = Udi::new(test_client(), path).await;
        assert_eq!(reloaded.get_providers().len(), 1);
        assert_eq!(reloaded.get_channel_profiles().len(), 1);
    }
}
