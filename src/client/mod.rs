//! Sync Client
//!
//! Client side of the synchronization layer. Holds local copies of the
//! entities the user can see, folds server events into them, tracks unread
//! messages and drives both channels.
//!
//! # Module Structure
//!
//! - **`engine`** - reconciliation of events and scoped snapshots
//! - **`collection`** - keyed collections backing every cache
//! - **`unread`** / **`store`** - unread counts and their SQLite persistence
//! - **`optimistic`** - optimistic task status changes and rollback
//! - **`api`** - REST client
//! - **`transport`** - websocket with reconnect and backoff
//! - **`sync_client`** - the orchestrator used by applications
//!
//! # Usage
//!
//! ```rust,no_run
//! use teamsync::client::{ClientConfig, SyncClient};
//!
//! # async fn example() -> Result<(), teamsync::client::ClientError> {
//! let config = ClientConfig::from_env()?.with_token("<jwt>");
//! let (mut client, mut events) = SyncClient::connect(config).await?;
//! client.run(&mut events).await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod notice;
pub mod optimistic;
pub mod store;
pub mod sync_client;
pub mod transport;
pub mod unread;

pub use api::{HttpApi, SyncApi};
pub use collection::{Keyed, KeyedCollection};
pub use config::{ClientConfig, ReconnectPolicy};
pub use engine::{Effect, FetchTicket, ReconciliationEngine, Scope, View};
pub use error::{ClientError, ClientResult};
pub use notice::{Notice, NoticeLevel, Notices};
pub use optimistic::{OptimisticController, PendingStatusChange};
pub use store::{MemoryUnreadStore, SqliteUnreadStore, UnreadCounts, UnreadStore};
pub use sync_client::{FrameSink, SyncClient};
pub use transport::{Transport, TransportEvent};
pub use unread::UnreadTracker;
