//! Purpose: Encode and decode composite search result identifiers.
//! Exports: `encode`, `decode`, `decode_path`, `is_root_node`, `DecodedItem`, `NodePath`.
//! Role: Leaf codec shared by the result filter and the launch dispatcher.
//! Invariants: Item ids look like `{kind}/{node_id}?{origin_channel}`.
//! Invariants: `decode(encode(k, i, c))` yields `(k/i, c)` when no part contains `/` or `?`.

use super::error::{Error, ErrorKind};

const CHANNEL_SEPARATOR: char = '?';
const PATH_SEPARATOR: char = '/';

pub const TOPIC_KIND: &str = "t";
pub const CONTENT_KIND: &str = "c";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedItem {
    pub node_path: String,
    pub origin_channel: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodePath<'a> {
    pub kind: &'a str,
    pub node_id: &'a str,
}

pub fn encode(node_kind: &str, node_id: &str, origin_channel: &str) -> String {
    format!("{node_kind}{PATH_SEPARATOR}{node_id}{CHANNEL_SEPARATOR}{origin_channel}")
}

/// Decodes an item id. `None` or an empty id means no specific item is targeted.
pub fn decode(item_id: Option<&str>) -> Result<Option<DecodedItem>, Error> {
    let Some(item_id) = item_id.filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    let mut parts = item_id.split(CHANNEL_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(node_path), Some(origin_channel), None) => Ok(Some(DecodedItem {
            node_path: node_path.to_string(),
            origin_channel: origin_channel.to_string(),
        })),
        _ => Err(Error::new(ErrorKind::InvalidItemId)
            .with_message(format!("{item_id} is not a valid item id"))
            .with_item_id(item_id)),
    }
}

pub fn decode_path(node_path: &str) -> Result<NodePath<'_>, Error> {
    let mut parts = node_path.split(PATH_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(node_id), None) => Ok(NodePath { kind, node_id }),
        _ => Err(Error::new(ErrorKind::InvalidNodePath)
            .with_message(format!("{node_path} is not a valid node path"))),
    }
}

impl DecodedItem {
    /// True when the item names a channel itself rather than something inside it.
    pub fn is_root_node(&self) -> bool {
        decode_path(&self.node_path).is_ok_and(|path| path.node_id == self.origin_channel)
    }
}

/// Root-node check on a raw id; undecodable ids are never root nodes.
pub fn is_root_node(item_id: &str) -> bool {
    decode(Some(item_id))
        .ok()
        .flatten()
        .is_some_and(|item| item.is_root_node())
}
