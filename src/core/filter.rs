//! Purpose: Narrow a raw catalog result list to what one provider object may show.
//! Exports: `filter`.
//! Role: Applied per subscriber after a multiplexer broadcast.
//! Invariants: Output preserves input order and never adds ids.
//! Invariants: Channel-scoped results never include that channel's root node.
//! Invariants: Global results drop ids from excluded channels, root nodes included.

use super::item_id::{self, DecodedItem};
use super::scope::{ChannelScope, ExcludeSet};

pub fn filter(item_ids: &[String], scope: &ChannelScope, exclude: &ExcludeSet) -> Vec<String> {
    match scope {
        ChannelScope::Channel(channel_id) => item_ids
            .iter()
            .filter(|item_id| {
                decoded(item_id).is_some_and(|item| {
                    item.origin_channel == *channel_id && !item.is_root_node()
                })
            })
            .cloned()
            .collect(),
        ChannelScope::Global if exclude.is_empty() => item_ids.to_vec(),
        ChannelScope::Global => item_ids
            .iter()
            .filter(|item_id| {
                decoded(item_id).is_none_or(|item| !exclude.contains(&item.origin_channel))
            })
            .cloned()
            .collect(),
    }
}

fn decoded(item_id: &str) -> Option<DecodedItem> {
    item_id::decode(Some(item_id)).ok().flatten()
}
