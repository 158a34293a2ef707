//! Purpose: Library crate behind the `channel-search` binary and tests.
//! Exports: `api` (stable surface), plus the provider building blocks.
//! Role: Channel-scoped search provider: routing, multiplexing, filtering, launching.
//! Invariants: Channel scope comes only from the object path a call arrives on.
//! Invariants: One upstream catalog search runs per distinct in-flight query.
pub mod api;
pub mod bus;
pub mod catalog;
pub mod core;
pub mod idle;
pub mod launch;
pub mod provider;
pub mod router;
pub mod search;
pub mod serve;
