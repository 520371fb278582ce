//! The regex matcher: loads a per-channel rule config, auto-cleans
//! uncompilable channels on load, and matches stream names to channel ids.

use dashmap::DashMap;
use parking_lot::RwLock;
use sqm_common::{atomic, ChannelId, ProviderId};
use std::path::PathBuf;
use tracing::warn;

use crate::config::{ChannelRules, MatcherConfig};
use crate::error::Result;
use crate::pattern::{compile_pattern, CompiledPattern};

/// A compiled pattern paired with the provider scoping it was declared
/// with, so `match_stream` can apply the filter per pattern rather than
/// per channel.
struct CompiledRule {
    provider_filter: Vec<ProviderId>,
    pattern: CompiledPattern,
}

pub struct RegexMatcher {
    config_path: PathBuf,
    config: RwLock<MatcherConfig>,
    compiled: DashMap<ChannelId, Vec<CompiledRule>>,
}

impl RegexMatcher {
    /// Load the config, dropping (and persisting the drop of) any channel
    /// whose rule list contains a pattern that fails to compile.
    pub async fn load(config_path: PathBuf) -> Result<Self> {
        let mut config: MatcherConfig = atomic::read_json_or_default(&config_path).await;
        let compiled = DashMap::new();
        let case_insensitive = config.case_insensitive;

        let original_len = config.channels.len();
        let mut kept = Vec::with_capacity(original_len);
        for rule in config.channels.drain(..) {
            match compile_all_strict(&rule, case_insensitive) {
                Ok(patterns) => {
                    compiled.insert(rule.channel_id, patterns);
                    kept.push(rule);
                }
                Err(bad_pattern) => {
                    warn!(
                        channel_id = %rule.channel_id,
                        pattern = %bad_pattern,
                        "dropping channel with uncompilable regex pattern"
                    );
                }
            }
        }
        let dropped = kept.len() != original_len;
        config.channels = kept;

        let matcher = Self {
            config_path,
            config: RwLock::new(config),
            compiled,
        };
        if dropped {
            matcher.persist().await?;
        }
        Ok(matcher)
    }

    async fn persist(&self) -> Result<()> {
        let config = self.config.read().clone();
        atomic::write_json_atomic(&self.config_path, &config).await?;
        Ok(())
    }

    /// Insert or replace a channel's rules. Unlike `load`, an individual
    /// bad pattern is logged and skipped rather than dropping the whole
    /// channel — a single rejected edit shouldn't take an already-working
    /// channel's other patterns down with it.
    pub async fn upsert_channel(&self, rule: ChannelRules) -> Result<()> {
        let case_insensitive = self.config.read().case_insensitive;
        let patterns = compile_all_lenient(&rule, case_insensitive);

        {
            let mut config = self.config.write();
            config.channels.retain(|r| r.channel_id != rule.channel_id);
            config.channels.push(rule.clone());
        }
        self.compiled.insert(rule.channel_id, patterns);
        self.persist().await
    }

    /// Validate a proposed pattern list without registering it.
    pub fn validate_patterns(&self, patterns: &[String], channel_name: &str) -> (bool, Option<String>) {
        let case_insensitive = self.config.read().case_insensitive;
        for pattern in patterns {
            if let Err(err) = compile_pattern(pattern, channel_name, case_insensitive) {
                return (false, Some(format!("{pattern}: {err}")));
            }
        }
        (true, None)
    }

    /// Channel ids whose rule list matches `stream_name`, in config
    /// insertion order. Each pattern's own `provider_filter` (nil/empty =
    /// "all providers") is checked against `stream_provider_id` before the
    /// pattern is tried.
    pub fn match_stream(&self, stream_name: &str, stream_provider_id: Option<ProviderId>) -> Vec<ChannelId> {
        let config = self.config.read();
        let mut matched = Vec::new();

        for rule in config.channels.iter() {
            if !rule.enabled {
                continue;
            }
            let Some(patterns) = self.compiled.get(&rule.channel_id) else {
                continue;
            };

            for compiled in patterns.iter() {
                if !compiled.provider_filter.is_empty() {
                    let provider_ok = stream_provider_id.is_some_and(|pid| compiled.provider_filter.contains(&pid));
                    if !provider_ok {
                        continue;
                    }
                }
                if compiled.pattern.regex.is_match(stream_name) {
                    matched.push(rule.channel_id);
                    break;
                }
            }
        }

        matched
    }

    /// Ids of channels carrying at least one enabled rule, in config
    /// insertion order. Used by the playlist cycle to scope its
    /// drop-non-matching-streams pass to channels actually under matcher
    /// control.
    pub fn enabled_channel_ids(&self) -> Vec<ChannelId> {
        self.config.read().channels.iter().filter(|r| r.enabled).map(|r| r.channel_id).collect()
    }
}

fn compile_all_strict(rule: &ChannelRules, case_insensitive: bool) -> std::result::Result<Vec<CompiledRule>, String> {
    let mut out = Vec::with_capacity(rule.patterns.len());
    for entry in &rule.patterns {
        match compile_pattern(&entry.pattern, &rule.channel_name, case_insensitive) {
            Ok(compiled) => out.push(CompiledRule { provider_filter: entry.provider_filter.clone(), pattern: compiled }),
            Err(_) => return Err(entry.pattern.clone()),
        }
    }
    Ok(out)
}

fn compile_all_lenient(rule: &ChannelRules, case_insensitive: bool) -> Vec<CompiledRule> {
    rule.patterns
        .iter()
        .filter_map(|entry| match compile_pattern(&entry.pattern, &rule.channel_name, case_insensitive) {
            Ok(compiled) => Some(CompiledRule { provider_filter: entry.provider_filter.clone(), pattern: compiled }),
            Err(err) => {
                warn!(channel_id = %rule.channel_id, pattern = %entry.pattern, %err, "skipping uncompilable pattern");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64, name: &str, patterns: Vec<&str>) -> ChannelRules {
        ChannelRules {
            channel_id: ChannelId(id),
            channel_name: name.to_string(),
            enabled: true,
            patterns: patterns
                .into_iter()
                .map(|p| crate::config::PatternRule { pattern: p.to_string(), provider_filter: vec![] })
                .collect(),
        }
    }

    async fn matcher_with(channels: Vec<ChannelRules>) -> (RegexMatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matcher.json");
        let config = MatcherConfig {
            case_insensitive: true,
            channels,
        };
        sqm_common::atomic::write_json_atomic(&path, &config).await.unwrap();
        (RegexMatcher::load(path).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn load_drops_channel_with_invalid_pattern_and_persists_cleanup() {
        let (matcher, dir) = matcher_with(vec![
            rule(1, "Good", vec!["^good$"]),
            rule(2, "Bad", vec!["(unclosed"]),
        ])
        .await;

        assert!(matcher.match_stream("good", None).contains(&ChannelId(1)));

        let reloaded = RegexMatcher::load(dir.path().join("matcher.json")).await.unwrap();
        assert_eq!(reloaded.config.read().channels.len(), 1);
        assert_eq!(reloaded.config.read().channels[0].channel_id, ChannelId(1));
    }

    #[tokio::test]
    async fn channel_name_substitution_matches_real_stream_names() {
        let (matcher, _dir) = matcher_with(vec![rule(1, "ESPN HD", vec!["^CHANNEL_NAME$"])]).await;
        assert_eq!(matcher.match_stream("espn hd", None), vec![ChannelId(1)]);
    }

    #[tokio::test]
    async fn disabled_channel_is_skipped() {
        let mut disabled = rule(1, "X", vec!["^x$"]);
        disabled.enabled = false;
        let (matcher, _dir) = matcher_with(vec![disabled]).await;
        assert!(matcher.match_stream("x", None).is_empty());
    }

    #[tokio::test]
    async fn provider_filter_excludes_non_matching_provider() {
        let mut filtered = rule(1, "X", vec!["^x$"]);
        filtered.patterns[0].provider_filter = vec![sqm_common::ProviderId(7)];
        let (matcher, _dir) = matcher_with(vec![filtered]).await;

        assert!(matcher.match_stream("x", Some(sqm_common::ProviderId(1))).is_empty());
        assert_eq!(
            matcher.match_stream("x", Some(sqm_common::ProviderId(7))),
            vec![ChannelId(1)]
        );
    }

    #[tokio::test]
    async fn provider_filter_is_scoped_per_pattern_not_per_channel() {
        // Pattern 0 is scoped to provider 7; pattern 1 is unscoped. A
        // channel-level filter couldn't express this combination.
        let mut mixed = rule(1, "X", vec!["^only-seven$", "^any-provider$"]);
        mixed.patterns[0].provider_filter = vec![sqm_common::ProviderId(7)];
        let (matcher, _dir) = matcher_with(vec![mixed]).await;

        assert!(matcher.match_stream("only-seven", Some(sqm_common::ProviderId(9))).is_empty());
        assert_eq!(
            matcher.match_stream("only-seven", Some(sqm_common::ProviderId(7))),
            vec![ChannelId(1)]
        );
        assert_eq!(
            matcher.match_stream("any-provider", Some(sqm_common::ProviderId(9))),
            vec![ChannelId(1)]
        );
        assert_eq!(matcher.match_stream("any-provider", None), vec![ChannelId(1)]);
    }

    #[tokio::test]
    async fn upsert_skips_only_the_bad_pattern() {
        let (matcher, _dir) = matcher_with(vec![]).await;
        let rule = rule(1, "Mixed", vec!["^good$", "(bad"]);
        matcher.upsert_channel(rule).await.unwrap();
        assert_eq!(matcher.match_stream("good", None), vec![ChannelId(1)]);
    }

    #[tokio::test]
    async fn validate_patterns_reports_first_failure() {
        let (matcher, _dir) = matcher_with(vec![]).await;
        let (ok, msg) = matcher.validate_patterns(&["(bad".to_string()], "X");
        assert!(!ok);
        assert!(msg.is_some());
    }

    #[tokio::test]
    async fn enabled_channel_ids_excludes_disabled_rules() {
        let mut disabled = rule(2, "Y", vec!["^y$"]);
        disabled.enabled = false;
        let (matcher, _dir) = matcher_with(vec![rule(1, "X", vec!["^x$"]), disabled]).await;
        assert_eq!(matcher.enabled_channel_ids(), vec![ChannelId(1)]);
    }
}
