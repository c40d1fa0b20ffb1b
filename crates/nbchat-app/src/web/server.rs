use std::net::SocketAddr;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};

use crate::bridge::{BridgeHandle, ServerMessage};
use crate::web::routes;

/// Pushes buffered per client before it is considered lagging
const EVENT_BUFFER: usize = 256;

/// Web server configuration
pub struct WebServerConfig {
    pub bind_addr: SocketAddr,
}

/// Web server instance
pub struct WebServer {
    config: WebServerConfig,
    bridge: BridgeHandle,
    events: mpsc::UnboundedReceiver<ServerMessage>,
}

impl WebServer {
    pub fn new(
        config: WebServerConfig,
        bridge: BridgeHandle,
        events: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> Self {
        Self {
            config,
            bridge,
            events,
        }
    }

    /// Start the web server
    pub async fn start(self) -> Result<()> {
        let (fanout, _) = broadcast::channel(EVENT_BUFFER);

        let forward = fanout.clone();
        let mut events = self.events;
        tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                // No subscribers just means no browser is connected
                let _ = forward.send(message);
            }
        });

        let app_state = routes::AppState {
            bridge: self.bridge,
            events: fanout,
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        let app = routes::create_router(app_state).layer(cors);

        println!("🌐 Web server starting on http://{}", self.config.bind_addr);
        println!("   WebSocket endpoint: ws://{}/ws", self.config.bind_addr);
        println!(
            "{}",
            format!("   Health check: http://{}/api/health", self.config.bind_addr).bright_black()
        );

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind_addr))?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
