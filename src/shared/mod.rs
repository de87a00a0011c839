//! Shared Module
//!
//! Platform-agnostic types and pure functions: the trackable model, the
//! connection splicer and aggregate math. Nothing here performs I/O, so every
//! function can be called from any point of the engine without locking.

/// Cursor-paginated connections and splicing
pub mod connection;

/// Trackables, statuses and activities
pub mod trackable;

/// Aggregate progress derivation
pub mod aggregate;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use aggregate::{AggregateTrackable, ChildRemoval, Progress};
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use connection::{Connection, Edge, Node, PageInfo, Placement};
pub use error::SharedError;
pub use trackable::{
    Activity, ActivityKind, PrimitiveTrackable, TrackableKind, TrackableNode, TrackableStatus,
};
