// Core modules: error model, item id codec, scoping, filtering, and fan-out.
pub mod error;
pub mod filter;
pub mod item_id;
pub mod multiplexer;
pub mod scope;
