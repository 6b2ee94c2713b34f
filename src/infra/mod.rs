//! Infrastructure - configuration, logging, storage and host utilities
//!
//! - `config` - Application configuration (TOML loading, validation)
//! - `logging` - Tracing subscriber setup
//! - `reachability` - Shared central reachability flag
//! - `store` - Storage collaborator for status/transaction rows
//! - `host` - Timestamps, local IP discovery, snapshot encoding

pub mod config;
pub mod host;
pub mod logging;
pub mod reachability;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use reachability::CentralReachability;
pub use store::{LotStore, MemoryStore};
