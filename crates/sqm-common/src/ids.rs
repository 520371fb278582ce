//! Newtype ids for every aggregator-issued entity.
//!
//! Kept as distinct types (rather than bare `i64`) so a channel id can never
//! be passed where a stream id is expected by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }

        impl From<$name> for i64 {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

entity_id!(ChannelId);
entity_id!(StreamId);
entity_id!(ProviderId);
entity_id!(ProfileId);
entity_id!(GroupId);
entity_id!(LogoId);
