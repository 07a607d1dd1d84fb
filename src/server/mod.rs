pub mod api;
pub mod tls;
pub mod websocket;

use crate::agent::ChatAgent;
use crate::cli::Args;
use log::info;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    agent: Arc<ChatAgent>,
    args: Args,
}

impl Server {
    pub fn new(agent: Arc<ChatAgent>, args: Args) -> Self {
        Self { agent, args }
    }

    /// Starts the HTTP API in the background (when configured) and serves WebSocket
    /// connections until the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.args.enable_tls {
            if self.args.tls_paths().is_none() {
                return Err("--enable-tls requires both --tls-cert-path and --tls-key-path".into());
            }
            tls::install_crypto_provider();
        } else {
            info!("TLS not enabled.");
        }

        if let Some(http_port) = self.args.http_port {
            api::start_http_server(http_port, self.agent.clone(), self.args.clone()).await?;
        }

        websocket::start_ws_server(&self.args.server_addr, self.agent.clone(), &self.args).await
    }
}
