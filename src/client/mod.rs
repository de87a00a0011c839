//! Sync Client Module
//!
//! The offline-first sync engine and everything it talks to.
//!
//! # Architecture
//!
//! - **`config`** - Configuration read from the environment
//! - **`error`** - `SyncError` and the crate `Result`
//! - **`session`** - Session state published by the host
//! - **`transport`** - GraphQL transport, reachability probe, failure classes
//! - **`local_db`** - SQLite-backed local cache
//! - **`offline`** - Deferral, persisted queue and replay
//! - **`sync`** - Connectivity tracking, deadline sweeps and the engine
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs        - Module exports and documentation
//! ├── main.rs       - Command-line entry point (binary)
//! ├── config.rs     - Environment configuration
//! ├── error.rs      - Error types
//! ├── session.rs    - Session state
//! ├── transport.rs  - HTTP transport and probe
//! ├── local_db/     - Local cache
//! ├── offline/      - Offline mutation queue
//! └── sync/         - Engine, network monitor, deadline scanner
//! ```

pub mod config;
pub mod error;
pub mod local_db;
pub mod offline;
pub mod session;
pub mod sync;
pub mod transport;

pub use error::{Result, SyncError};
pub use sync::{SyncEngine, SyncEvent};

use std::sync::atomic::{AtomicBool, Ordering};

/// Clears a re-entrancy flag when dropped
pub(crate) struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    /// Wrap a flag the caller has already set
    pub(crate) fn new(flag: &'a AtomicBool) -> Self {
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
