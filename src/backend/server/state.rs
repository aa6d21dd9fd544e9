/**
 * Application State Management
 *
 * `AppState` is the central state container handed to the router. Every
 * field is cheap to clone and safe to share across handlers.
 *
 * # Fields
 *
 * - `config` - loaded `ServerConfig`
 * - `directory` - persistence collaborator (`Directory` trait object),
 *   SQLite when `database_path` is set and in-memory otherwise
 * - `topology` - live sessions and room memberships
 * - `dispatcher` - fans persisted mutations out to rooms; wraps `topology`
 * - `tokens` - JWT issuer/verifier
 *
 * # State Extraction
 *
 * The `FromRef` implementations let handlers extract a single part, e.g.
 * `State(directory): State<Arc<dyn Directory>>`.
 */

use axum::extract::FromRef;
use std::sync::Arc;

use crate::backend::auth::TokenIssuer;
use crate::backend::realtime::{Dispatcher, RoomTopology};
use crate::backend::server::config::ServerConfig;
use crate::backend::store::{Directory, MemoryDirectory, SqliteDirectory, StoreResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub directory: Arc<dyn Directory>,
    pub topology: Arc<RoomTopology>,
    pub dispatcher: Dispatcher,
    pub tokens: TokenIssuer,
}

impl AppState {
    /// State backed by the directory the configuration names
    pub async fn open(config: ServerConfig) -> StoreResult<Self> {
        match config.database_path.clone() {
            Some(path) => {
                let directory = SqliteDirectory::open(&path).await?;
                Ok(Self::with_directory(config, Arc::new(directory)))
            }
            None => {
                tracing::warn!("[Server] No database path, data lives in memory only");
                Ok(Self::new(config))
            }
        }
    }

    /// State backed by a fresh in-memory directory
    pub fn new(config: ServerConfig) -> Self {
        Self::with_directory(config, Arc::new(MemoryDirectory::new()))
    }

    pub fn with_directory<D>(config: ServerConfig, directory: Arc<D>) -> Self
    where
        D: Directory + 'static,
    {
        let topology = Arc::new(RoomTopology::new(directory.clone()));
        let dispatcher = Dispatcher::new(topology.clone());
        let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl_secs);

        Self {
            config: Arc::new(config),
            directory,
            topology,
            dispatcher,
            tokens,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Directory> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for Dispatcher {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.dispatcher.clone()
    }
}

impl FromRef<AppState> for Arc<RoomTopology> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.topology.clone()
    }
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.tokens.clone()
    }
}
