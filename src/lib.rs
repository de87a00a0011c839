//! Progress Sync - Main Library
//!
//! The offline-first synchronization engine of a goal and counter tracking
//! client. Mutations keep working while the server is unreachable, the
//! local cache stays consistent after every local or replayed change, and
//! time-driven state changes run against the same cache.
//!
//! # Overview
//!
//! - Connectivity tracking with a ping loop while offline
//! - Deferral of mutations into a persisted FIFO queue, replayed on reconnect
//! - Exponential backoff, drop rules and auth-expiry handling for replays
//! - Cursor-paginated connections kept sorted by splicing
//! - Aggregate progress derived from child trackables
//! - Hourly deadline expiry of active goals
//!
//! # Module Structure
//!
//! - **`shared`** - Pure types and functions
//!   - Connections and the splicer
//!   - Trackables, activities and aggregates
//!   - Configuration and shared errors
//!
//! - **`client`** - The engine
//!   - Local SQLite cache
//!   - Transport and reachability probe
//!   - Offline mutation queue
//!   - Connectivity tracker, deadline scanner and `SyncEngine`
//!
//! # Usage
//!
//! ```rust,no_run
//! use progress_sync::client::offline::MutationRequest;
//! use progress_sync::client::session::{session_channel, SessionState};
//! use progress_sync::client::sync::SyncEngine;
//! use progress_sync::client::transport::OperationRequest;
//! use progress_sync::shared::config::AppConfig;
//! use serde_json::json;
//!
//! # async fn example() -> progress_sync::client::error::Result<()> {
//! let config = AppConfig::builder()
//!     .server_url("https://api.example.com")
//!     .build()?;
//! let (_session, session_rx) = session_channel(SessionState::authenticated("u1", "token"));
//!
//! let engine = SyncEngine::connect(config, session_rx).await?;
//! engine.start().await?;
//!
//! let operation = OperationRequest::new("ArchiveTrackable", "mutation ArchiveTrackable($id: ID!) { ... }")
//!     .variable("id", json!("t1"));
//! engine
//!     .request(MutationRequest::new(operation).with_optimistic(json!({"id": "t1"})))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The local cache serializes every read-modify-write on a single SQLite
//! connection. Connectivity and session state are shared through `watch`
//! channels; engine events go out on a `broadcast` channel.
//!
//! # Error Handling
//!
//! - `shared::error::SharedError` for validation of domain values
//! - `shared::config::ConfigError` for configuration
//! - `client::transport::TransportError` for classified transport failures
//! - `client::error::SyncError` wrapping all of the above plus store errors

/// Shared types and pure functions
pub mod shared;

/// Sync engine
pub mod client;
