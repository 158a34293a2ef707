//! Purpose: Resolve inbound object paths to channel scopes without a registry.
//! Exports: `ObjectRouter`, `CHANNEL_NODE_PREFIX`, `DEFAULT_BASE_PATH`.
//! Role: Pure pattern matching used by the bus dispatcher on every call.
//! Invariants: The base path resolves to the global scope.
//! Invariants: `base/channel_<id>` resolves to that channel for any well-formed id.
//! Invariants: Enumeration is always empty; resolution does not depend on it.
//! Invariants: A root base (`/`) joins children without doubling the separator.

use crate::core::scope::ChannelScope;

pub const DEFAULT_BASE_PATH: &str = "/org/channelsearch/SearchProvider";
pub const CHANNEL_NODE_PREFIX: &str = "channel_";

#[derive(Clone, Debug)]
pub struct ObjectRouter {
    base_path: String,
}

impl Default for ObjectRouter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PATH)
    }
}

impl ObjectRouter {
    pub fn new(base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        while base_path.len() > 1 && base_path.ends_with('/') {
            base_path.pop();
        }
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn channel_path(&self, channel_id: &str) -> String {
        format!("{}/{CHANNEL_NODE_PREFIX}{channel_id}", self.parent_prefix())
    }

    pub fn resolve(&self, object_path: &str) -> Option<ChannelScope> {
        if object_path == self.base_path {
            return Some(ChannelScope::Global);
        }
        let node = object_path
            .strip_prefix(self.parent_prefix())?
            .strip_prefix('/')?;
        let channel_id = node.strip_prefix(CHANNEL_NODE_PREFIX)?;
        is_valid_channel_id(channel_id).then(|| ChannelScope::channel(channel_id))
    }

    /// Child nodes advertised under `object_path`. Channel nodes are never listed.
    pub fn enumerate(&self, _object_path: &str) -> Vec<String> {
        Vec::new()
    }

    /// Interfaces exported at `object_path`.
    pub fn introspect(&self, object_path: &str, interface: &'static str) -> Vec<&'static str> {
        match self.resolve(object_path) {
            Some(_) => vec![interface],
            None => Vec::new(),
        }
    }

    // Empty for the root base so children are `/channel_<id>`.
    fn parent_prefix(&self) -> &str {
        self.base_path.strip_suffix('/').unwrap_or(&self.base_path)
    }
}

fn is_valid_channel_id(channel_id: &str) -> bool {
    !channel_id.is_empty()
        && channel_id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFACE: &str = "org.gnome.Shell.SearchProvider2";

    #[test]
    fn base_path_is_global() {
        let router = ObjectRouter::default();
        assert_eq!(router.resolve(DEFAULT_BASE_PATH), Some(ChannelScope::Global));
    }

    #[test]
    fn channel_child_resolves_to_channel_scope() {
        let router = ObjectRouter::new("/org/example/Search");
        assert_eq!(
            router.resolve("/org/example/Search/channel_abc123"),
            Some(ChannelScope::channel("abc123"))
        );
        assert_eq!(
            router.resolve(&router.channel_path("f9d3_x")),
            Some(ChannelScope::channel("f9d3_x"))
        );
    }

    #[test]
    fn unrelated_paths_do_not_resolve() {
        let router = ObjectRouter::new("/org/example/Search");
        for path in [
            "/org/example",
            "/org/example/SearchProvider",
            "/org/example/Search/",
            "/org/example/Search/other",
            "/org/example/Search/channel_",
            "/org/example/Search/channel_a/b",
            "/org/example/Search/channel_a-b",
            "/org/example/Searchchannel_a",
        ] {
            assert_eq!(router.resolve(path), None, "{path}");
        }
    }

    #[test]
    fn enumeration_is_empty_even_when_resolution_succeeds() {
        let router = ObjectRouter::default();
        let child = router.channel_path("sci");
        assert!(router.enumerate(router.base_path()).is_empty());
        assert!(router.resolve(&child).is_some());
        assert_eq!(router.introspect(&child, IFACE), vec![IFACE]);
        assert!(router.introspect("/elsewhere", IFACE).is_empty());
    }

    #[test]
    fn trailing_slash_in_base_is_ignored() {
        let router = ObjectRouter::new("/org/example/Search/");
        assert_eq!(router.base_path(), "/org/example/Search");
        assert_eq!(
            router.resolve("/org/example/Search/channel_x"),
            Some(ChannelScope::channel("x"))
        );
    }

    #[test]
    fn root_base_resolves_single_slash_children() {
        let router = ObjectRouter::new("/");
        assert_eq!(router.channel_path("x"), "/channel_x");
        assert_eq!(router.resolve("/"), Some(ChannelScope::Global));
        assert_eq!(router.resolve("/channel_x"), Some(ChannelScope::channel("x")));
        assert_eq!(router.resolve("//channel_x"), None);
        assert_eq!(router.resolve("/other"), None);
    }
}
