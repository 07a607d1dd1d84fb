use crate::agent::ChatAgent;
use crate::cli::Args;
use crate::history::clamp_limit;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::Session;
use super::tls::load_tls_config;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{ Sink, SinkExt, StreamExt };
use log::{ info, warn, error };
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::{ self, protocol::Message };

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<ChatAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = match args.tls_paths() {
        Some((cert_path, key_path)) => {
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            Some(TlsAcceptor::from(load_tls_config(cert_path, key_path)?))
        }
        None => None,
    };
    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, addr);

    let default_limit = args.search_default_limit;
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = match tls_acceptor_clone {
                Some(acceptor) =>
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            info!("TLS handshake successful for {}", peer);
                            process_connection(peer, tls_stream, agent_clone, default_limit).await
                        }
                        Err(e) => Err(Box::new(e) as Box<dyn Error + Send + Sync>),
                    }
                None => process_connection(peer, stream, agent_clone, default_limit).await,
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

pub async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<ChatAgent>,
    default_limit: usize
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let websocket = accept_async(stream).await.map_err(|e| {
        error!("Handshake failed for {}: {}", peer, e);
        e
    })?;
    handle_connection(peer, websocket, agent, default_limit).await;
    Ok(())
}

async fn send_message<T>(tx: &mut T, msg: &ServerMessage) -> Result<(), tungstenite::Error>
    where T: Sink<Message, Error = tungstenite::Error> + Unpin
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    tx.send(Message::Text(json)).await
}

/// Serves one client. The connection owns a single session, so sends on it are sequential.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<ChatAgent>,
    default_limit: usize
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);
    let (mut tx, mut rx) = websocket.split();
    let mut session = Session::new();

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::Protocol(_)) => {
                info!("WebSocket connection closed or protocol error for {}", peer);
                break;
            }
            Err(e) => {
                error!("Error receiving message from {}: {}", peer, e);
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!("Message from {} exceeds size limit ({} > {})", peer, message.len(), MAX_MESSAGE_SIZE);
            let error_msg = ServerMessage::Error { message: "Message too large".to_string() };
            if send_message(&mut tx, &error_msg).await.is_err() {
                error!("Failed to send size limit error to {}", peer);
            }
            break;
        }

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(data) => {
                if tx.send(Message::Pong(data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
                continue;
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
                continue;
            }
            Message::Pong(_) | Message::Frame(_) => {
                continue;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Start) => {
                let conversation_id = agent.start_new_conversation(&mut session).await;
                ServerMessage::Started { conversation_id }
            }
            Ok(ClientMessage::Chat { content }) => {
                if let Err(e) = send_message(&mut tx, &ServerMessage::Processing).await {
                    error!("Error sending processing status to {}: {}", peer, e);
                    break;
                }
                let reply = agent.send(&mut session, &content).await;
                ServerMessage::Response {
                    degraded: reply.is_degraded(),
                    conversation_id: reply.conversation_id,
                    content: reply.content,
                    timestamp: reply.timestamp,
                }
            }
            Ok(ClientMessage::History { conversation_id }) => {
                let messages = agent.history(&session, conversation_id.as_ref()).await;
                ServerMessage::History {
                    conversation_id: conversation_id.or_else(|| session.conversation_id().cloned()),
                    messages,
                }
            }
            Ok(ClientMessage::Search { query, limit }) => {
                let results = agent.search(&query, clamp_limit(limit, default_limit)).await;
                ServerMessage::SearchResults { results }
            }
            Err(e) => {
                warn!("Failed to parse message from {}: {}", peer, e);
                ServerMessage::Error { message: format!("Failed to parse message: {}", e) }
            }
        };

        if let Err(e) = send_message(&mut tx, &reply).await {
            error!("Error sending message to {}: {}", peer, e);
            break;
        }
    }

    match session.conversation_id() {
        Some(id) => info!("WebSocket connection closed for {} (Conv ID: {})", peer, id),
        None => info!("WebSocket connection closed for {}", peer),
    }
}
