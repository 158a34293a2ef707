//! Purpose: Define the public Rust API boundary for channel-search.
//! Exports: Error types, scopes, item id codec, and the provider/server entry points.
//! Role: Single import path for the CLI and integration tests.
//! Invariants: Additive-only; internal helpers stay behind their modules.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::bus::{
    BusCall, BusDispatcher, BusError, BusReply, INTROSPECTABLE_INTERFACE,
    SEARCH_PROVIDER_INTERFACE,
};
pub use crate::catalog::{Catalog, RemoteCatalog, ResultMeta};
pub use crate::core::error::{Error, ErrorKind, bus_error_name};
pub use crate::core::filter::filter;
pub use crate::core::item_id::{self, DecodedItem, NodePath};
pub use crate::core::multiplexer::{Completion, Multiplexer, Pending};
pub use crate::core::scope::{ChannelScope, ExcludeSet, exclude_set};
pub use crate::idle::{DEFAULT_INACTIVITY_TIMEOUT, IdleTimer};
pub use crate::launch::{
    CommandLauncher, DEFAULT_LAUNCHER, DEFAULT_SCHEME, LaunchDispatcher, Launcher,
    build_dispatch_uri,
};
pub use crate::provider::SearchProvider;
pub use crate::router::{CHANNEL_NODE_PREFIX, DEFAULT_BASE_PATH, ObjectRouter};
pub use crate::search::{SearchCoordinator, normalize_query};
pub use crate::serve::{
    DEFAULT_BIND, DEFAULT_MAX_BODY_BYTES, ServeConfig, build_dispatcher, serve,
    serve_with_listener,
};
