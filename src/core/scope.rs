//! Purpose: Channel identity of a call and the exclusion set for global results.
//! Exports: `ChannelScope`, `ExcludeSet`, `exclude_set`.
//! Role: Shared by the multiplexer, the result filter, and launch URIs.
//! Invariants: The exclusion set holds each channel scope in a batch once; global adds nothing.

use std::collections::BTreeSet;
use std::fmt;

/// Channel identity attached to an inbound call by the object it was sent to.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ChannelScope {
    Global,
    Channel(String),
}

impl ChannelScope {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self::Channel(channel_id.into())
    }

    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Channel(channel_id) => Some(channel_id),
        }
    }
}

impl fmt::Display for ChannelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Channel(channel_id) => write!(f, "channel {channel_id}"),
        }
    }
}

/// Channels whose results are hidden from the global provider for one batch.
pub type ExcludeSet = BTreeSet<String>;

/// Collects the concrete channels among the scopes attached to one batch.
pub fn exclude_set<'a>(scopes: impl IntoIterator<Item = &'a ChannelScope>) -> ExcludeSet {
    scopes
        .into_iter()
        .filter_map(ChannelScope::channel_id)
        .map(str::to_string)
        .collect()
}
