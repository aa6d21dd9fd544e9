//! Server fixture
//!
//! Boots the full router on `127.0.0.1:0` with a cheap bcrypt cost and hands
//! out registered users.

use std::time::Duration;

use teamsync::backend::{create_app, ServerConfig};
use teamsync::client::{ClientConfig, HttpApi, ReconnectPolicy};
use teamsync::shared::config::AppConfig;
use teamsync::shared::requests::Registration;
use teamsync::shared::UserSummary;
use uuid::Uuid;

pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
}

/// A registered user plus a REST client holding its token
pub struct TestUser {
    pub user: UserSummary,
    pub token: String,
    pub api: HttpApi,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let config = ServerConfig {
            bcrypt_cost: 4,
            keepalive_secs: 5,
            database_path: None,
            ..ServerConfig::default()
        };
        let app = create_app(config).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            ws_url: format!("ws://{}/ws", addr),
        }
    }

    /// Client config for this server, with fast reconnects
    pub fn client_config(&self) -> ClientConfig {
        let app = AppConfig::builder().server_url(&self.base_url).build().unwrap();
        ClientConfig::new(app).with_reconnect(ReconnectPolicy {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            degraded_after: 5,
        })
    }

    /// Register a user with a unique email derived from `name`
    pub async fn register(&self, name: &str) -> TestUser {
        let mut api = HttpApi::new(self.client_config());
        let registration = Registration {
            name: name.to_string(),
            email: format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4()),
            password: "password123".to_string(),
        };
        let auth = api.register(&registration).await.unwrap();
        TestUser {
            user: auth.user,
            token: auth.token,
            api,
        }
    }
}
