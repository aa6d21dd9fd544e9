/**
 * Server Initialization
 *
 * 1. Open the directory and build `AppState` from the loaded configuration
 * 2. Start the periodic sweep of sessions whose socket task is gone
 * 3. Create the router
 */

use axum::Router;
use std::time::Duration;

use crate::backend::routes::router::create_router;
use crate::backend::server::config::ServerConfig;
use crate::backend::server::state::AppState;
use crate::backend::store::StoreResult;

pub async fn create_app(config: ServerConfig) -> StoreResult<Router<()>> {
    tracing::info!("[Server] Initializing teamsync backend");

    let state = AppState::open(config).await?;
    spawn_session_sweep(&state);

    Ok(create_router(state))
}

fn spawn_session_sweep(state: &AppState) {
    let topology = state.topology.clone();
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let swept = topology.sweep_closed().await;
            if swept > 0 {
                tracing::debug!("[Rooms] Swept {} closed session(s)", swept);
            }
        }
    });
}
