//! Step 10: account-level stream limits, applied after scoring/ordering.
//! Keeps the top N streams per provider (by the order already established),
//! dropping the rest. `0` means unlimited for both the global and
//! per-provider limits.

use sqm_common::ProviderId;
use sqm_config::AccountStreamLimitsConfig;
use std::collections::HashMap;

pub trait AccountLimited {
    fn provider_id(&self) -> Option<ProviderId>;
}

pub fn apply_account_limits<T: AccountLimited>(items: Vec<T>, config: &AccountStreamLimitsConfig) -> Vec<T> {
    if !config.enabled {
        return items;
    }

    let mut kept_per_provider: HashMap<ProviderId, i64> = HashMap::new();
    items
        .into_iter()
        .filter(|item| {
            let Some(provider_id) = item.provider_id() else {
                return true;
            };
            let limit = config
                .account_limits
                .get(&provider_id.0)
                .copied()
                .unwrap_or(config.global_limit);
            if limit <= 0 {
                return true;
            }
            let kept = kept_per_provider.entry(provider_id).or_insert(0);
            if *kept < limit {
                *kept += 1;
                true
            } else {
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: &'static str,
        provider: Option<i64>,
    }

    impl AccountLimited for Item {
        fn provider_id(&self) -> Option<ProviderId> {
            self.provider.map(ProviderId)
        }
    }

    #[test]
    fn keeps_top_n_per_provider_in_existing_order() {
        let config = AccountStreamLimitsConfig {
            enabled: true,
            global_limit: 0,
            account_limits: [(1, 2)].into_iter().collect(),
        };
        let items = vec![
            Item { id: "a", provider: Some(1) },
            Item { id: "b", provider: Some(1) },
            Item { id: "c", provider: Some(1) },
        ];
        let kept: Vec<&str> = apply_account_limits(items, &config).iter().map(|i| i.id).collect();
        assert_eq!(kept, vec!["a", "b"]);
    }

    #[test]
    fn global_limit_applies_to_providers_without_an_override() {
        let config = AccountStreamLimitsConfig {
            enabled: true,
            global_limit: 1,
            account_limits: HashMap::new(),
        };
        let items = vec![
            Item { id: "a", provider: Some(2) },
            Item { id: "b", provider: Some(2) },
        ];
        let kept: Vec<&str> = apply_account_limits(items, &config).iter().map(|i| i.id).collect();
        assert_eq!(kept, vec!["a"]);
    }

    #[test]
    fn disabled_feature_keeps_everything() {
        let config = AccountStreamLimitsConfig { enabled: false, global_limit: 1, account_limits: HashMap::new() };
        let items = vec![Item { id: "a", provider: Some(1) }, Item { id: "b", provider: Some(1) }];
        assert_eq!(apply_account_limits(items, &config).len(), 2);
    }

    #[test]
    fn providerless_streams_are_never_limited() {
        let config = AccountStreamLimitsConfig { enabled: true, global_limit: 1, account_limits: HashMap::new() };
        let items = vec![Item { id: "a", provider: None }, Item { id: "b", provider: None }];
        assert_eq!(apply_account_limits(items, &config).len(), 2);
    }
}
