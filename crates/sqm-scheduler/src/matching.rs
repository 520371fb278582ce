//! Stream-to-channel regex matching shared by the playlist cycle and the
//! global action: dropping streams that no longer match their channel's
//! rules, and assigning newly-discovered streams to the channels whose
//! rules now match them.

use std::collections::{HashMap, HashSet};

use sqm_aggregator::AggregatorClient;
use sqm_common::{ChannelId, StreamId};
use sqm_deadstream::DeadStreamTracker;
use sqm_matcher::RegexMatcher;
use tracing::{info, warn};

use crate::error::Result;

/// For every channel carrying enabled regex rules, compare its current
/// stream set against what the matcher would assign it today and PATCH out
/// any stream that no longer matches. Returns the number of streams
/// removed.
pub async fn remove_non_matching_streams(client: &AggregatorClient, udi: &sqm_udi::Udi, matcher: &RegexMatcher) -> Result<usize> {
    let mut removed_total = 0usize;

    for channel_id in matcher.enabled_channel_ids() {
        let Ok(streams) = udi.get_channel_streams(channel_id) else { continue };
        if streams.is_empty() {
            continue;
        }

        let keep: Vec<StreamId> = streams
            .iter()
            .filter(|stream| matcher.match_stream(&stream.name, stream.provider_id).contains(&channel_id))
            .map(|stream| stream.id)
            .collect();

        if keep.len() == streams.len() {
            continue;
        }

        let removed = streams.len() - keep.len();
        let raw_ids: Vec<i64> = keep.iter().map(|id| id.0).collect();
        match client.patch_channel_streams(channel_id, &raw_ids).await {
            Ok(_) => {
                info!(channel_id = channel_id.0, removed, "dropped non-matching streams from channel");
                removed_total += removed;
            }
            Err(err) => warn!(channel_id = channel_id.0, error = %err, "failed to PATCH channel after dropping non-matching streams"),
        }
    }

    Ok(removed_total)
}

/// Run every stream from an enabled provider (plus custom streams) through
/// the matcher, assign any newly-matched stream to its channel, and return
/// the ids of channels that received at least one new stream.
pub async fn discover_and_assign_streams(
    client: &AggregatorClient,
    udi: &sqm_udi::Udi,
    matcher: &RegexMatcher,
    dead_tracker: &DeadStreamTracker,
    dead_stream_removal_enabled: bool,
) -> Result<Vec<ChannelId>> {
    let active_provider_ids: HashSet<_> = udi
        .get_providers()
        .into_iter()
        .filter(|p| p.is_active && p.name.to_lowercase() != "custom")
        .map(|p| p.id)
        .collect();

    let streams = udi.get_streams();
    let channels = udi.get_channels();

    let mut current_streams: HashMap<ChannelId, HashSet<StreamId>> = HashMap::new();
    for channel in &channels {
        current_streams.insert(channel.id, channel.streams.iter().copied().collect());
    }

    let mut new_assignments: HashMap<ChannelId, Vec<StreamId>> = HashMap::new();

    for stream in &streams {
        let from_enabled_provider = stream.is_custom || stream.provider_id.is_some_and(|id| active_provider_ids.contains(&id));
        if !from_enabled_provider {
            continue;
        }
        if dead_stream_removal_enabled && dead_tracker.is_dead(&stream.url) {
            continue;
        }

        for channel_id in matcher.match_stream(&stream.name, stream.provider_id) {
            let Some(existing) = current_streams.get(&channel_id) else { continue };
            if !existing.contains(&stream.id) {
                new_assignments.entry(channel_id).or_default().push(stream.id);
            }
        }
    }

    let mut touched = Vec::with_capacity(new_assignments.len());
    for (channel_id, new_ids) in new_assignments {
        let mut final_ids: Vec<StreamId> = current_streams.get(&channel_id).into_iter().flatten().copied().collect();
        final_ids.extend(new_ids.iter().copied());
        let raw_ids: Vec<i64> = final_ids.iter().map(|id| id.0).collect();

        match client.patch_channel_streams(channel_id, &raw_ids).await {
            Ok(_) => {
                info!(channel_id = channel_id.0, added = new_ids.len(), "assigned newly-matched streams to channel");
                touched.push(channel_id);
            }
            Err(err) => warn!(channel_id = channel_id.0, error = %err, "failed to PATCH channel with newly-matched streams"),
        }
    }

    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqm_aggregator::AggregatorClientConfig;
    use sqm_common::model::{Channel, ChannelGroup, Logo, Profile, Provider, Stream};
    use sqm_common::{atomic, ProviderId};
    use sqm_matcher::config::{ChannelRules, MatcherConfig};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stream(id: i64, name: &str, provider_id: Option<i64>, is_custom: bool) -> Stream {
        Stream {
            id: StreamId(id),
            name: name.to_string(),
            url: format!("http://stream/{id}"),
            provider_id: provider_id.map(ProviderId),
            is_custom,
            stream_stats: None,
            current_viewers: 0,
        }
    }

    fn provider(id: i64, name: &str, is_active: bool) -> Provider {
        Provider {
            id: ProviderId(id),
            name: name.to_string(),
            is_active,
            max_streams: 0,
            profiles: vec![],
            priority: 0,
            priority_mode: sqm_common::model::PriorityMode::Disabled,
        }
    }

    async fn test_client(server: &MockServer) -> AggregatorClient {
        AggregatorClient::new(AggregatorClientConfig {
            base_url: server.uri(),
            username: None,
            password: None,
            initial_token: Some("t".to_string()),
            request_timeout: Duration::from_secs(5),
        })
    }

    async fn test_udi(
        server: &MockServer,
        channels: Vec<Channel>,
        streams: Vec<Stream>,
        providers: Vec<Provider>,
    ) -> (sqm_udi::Udi, tempfile::TempDir) {
        Mock::given(method("GET"))
            .and(path("/api/channels/channels/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": channels, "next": null })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/channels/streams/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": streams, "next": null })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/m3u/accounts/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": providers, "next": null })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/channels/groups/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": Vec::<ChannelGroup>::new(), "next": null })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/channels/logos/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": Vec::<Logo>::new(), "next": null })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/m3u/profiles/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": Vec::<Profile>::new(), "next": null })))
            .mount(server)
            .await;

        let client = test_client(server).await;
        let dir = tempfile::tempdir().unwrap();
        let udi = sqm_udi::Udi::new(client, dir.path().join("udi.json")).await;
        udi.refresh_all().await.unwrap();
        (udi, dir)
    }

    async fn test_matcher(channels: Vec<ChannelRules>) -> (RegexMatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matcher.json");
        let config = MatcherConfig { case_insensitive: true, channels };
        atomic::write_json_atomic(&path, &config).await.unwrap();
        let matcher = RegexMatcher::load(path).await.unwrap();
        (matcher, dir)
    }

    fn rule(id: i64, patterns: Vec<&str>) -> ChannelRules {
        ChannelRules {
            channel_id: ChannelId(id),
            channel_name: format!("Channel {id}"),
            enabled: true,
            patterns: patterns
                .into_iter()
                .map(|p| sqm_matcher::config::PatternRule { pattern: p.to_string(), provider_filter: vec![] })
                .collect(),
        }
    }

    #[tokio::test]
    async fn remove_non_matching_streams_patches_out_streams_that_no_longer_match() {
        let server = MockServer::start().await;
        let channel = Channel {
            id: ChannelId(1),
            name: "News".to_string(),
            number: None,
            group_id: None,
            tvg_id: None,
            epg_id: None,
            logo_id: None,
            streams: vec![StreamId(1), StreamId(2)],
            uuid: None,
            stream_preference: None,
        };
        let streams = vec![stream(1, "News HD", Some(1), false), stream(2, "Sports HD", Some(1), false)];
        let (udi, _dir) = test_udi(&server, vec![channel], streams, vec![provider(1, "Acme", true)]).await;
        let (matcher, _matcher_dir) = test_matcher(vec![rule(1, vec!["(?i)news"])]).await;

        Mock::given(method("PATCH"))
            .and(path("/api/channels/channels/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"streams": [1]})))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let removed = remove_non_matching_streams(&client, &udi, &matcher).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn remove_non_matching_streams_skips_channels_with_no_enabled_rule() {
        let server = MockServer::start().await;
        let channel = Channel {
            id: ChannelId(1),
            name: "News".to_string(),
            number: None,
            group_id: None,
            tvg_id: None,
            epg_id: None,
            logo_id: None,
            streams: vec![StreamId(1)],
            uuid: None,
            stream_preference: None,
        };
        let (udi, _dir) = test_udi(&server, vec![channel], vec![stream(1, "Anything", Some(1), false)], vec![provider(1, "Acme", true)]).await;
        let (matcher, _matcher_dir) = test_matcher(vec![]).await;

        let client = test_client(&server).await;
        let removed = remove_non_matching_streams(&client, &udi, &matcher).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn discover_and_assign_streams_assigns_new_match_and_skips_dead_and_custom_provider() {
        let server = MockServer::start().await;
        let channel = Channel {
            id: ChannelId(1),
            name: "News".to_string(),
            number: None,
            group_id: None,
            tvg_id: None,
            epg_id: None,
            logo_id: None,
            streams: vec![],
            uuid: None,
            stream_preference: None,
        };
        let streams = vec![
            stream(1, "News HD", Some(1), false),
            stream(2, "News Dead", Some(1), false),
            stream(3, "News Custom Provider", Some(2), false),
        ];
        let providers = vec![provider(1, "Acme", true), provider(2, "Custom", true)];
        let (udi, _dir) = test_udi(&server, vec![channel], streams, providers).await;
        let (matcher, _matcher_dir) = test_matcher(vec![rule(1, vec!["(?i)news"])]).await;

        let dead_tracker_dir = tempfile::tempdir().unwrap();
        let dead_tracker = DeadStreamTracker::load(dead_tracker_dir.path().join("dead.json")).await;
        dead_tracker
            .mark_dead(&stream(2, "News Dead", Some(1), false).url, StreamId(2), "News Dead", ChannelId(1))
            .await
            .unwrap();

        Mock::given(method("PATCH"))
            .and(path("/api/channels/channels/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"streams": [1]})))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let touched = discover_and_assign_streams(&client, &udi, &matcher, &dead_tracker, true).await.unwrap();
        assert_eq!(touched, vec![ChannelId(1)]);
    }
}
