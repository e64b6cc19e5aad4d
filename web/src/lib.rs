use google_auth::controller::AuthController;
use google_auth::oauth::DEFAULT_STATE_TTL_SECS;
use log::*;
use service::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

mod controller;
mod error;
mod router;
mod session_registry;

pub use error::{Error, Result};
pub use session_registry::SessionRegistry;

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth_controller: Arc<AuthController>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config, auth_controller: AuthController) -> Self {
        let state_ttl = i64::try_from(config.oauth_state_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_STATE_TTL_SECS));
        let idle_timeout = Duration::from_secs(config.session_expiry_seconds);

        Self {
            config,
            auth_controller: Arc::new(auth_controller),
            sessions: Arc::new(SessionRegistry::new(state_ttl, idle_timeout)),
        }
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let listen_addr = format!("{}:{}", interface, app_state.config.port);

    info!(
        "Server starting... listening for connections on http://{} ({} environment)",
        listen_addr,
        app_state.config.runtime_env()
    );

    let listener = TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, router::define_routes(app_state)).await
}
