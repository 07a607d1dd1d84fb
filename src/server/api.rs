use crate::agent::ChatAgent;
use crate::cli::Args;
use crate::history::clamp_limit;
use crate::models::chat::ConversationId;
use crate::session::Session;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Json,
    Router,
    extract::{ Path, Query, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub content: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Serialize)]
struct ConversationCreated {
    conversation_id: ConversationId,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
    default_limit: usize,
}

pub fn router(agent: Arc<ChatAgent>, default_limit: usize) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/conversations", post(start_conversation_handler))
        .route("/api/conversations/{id}/messages", get(history_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/search", get(search_handler))
        .layer(cors)
        .with_state(AppState { agent, default_limit })
}

pub async fn start_http_server(
    http_port: u16,
    agent: Arc<ChatAgent>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(agent, args.search_default_limit);

    if let Some((cert_path, key_path)) = args.tls_paths() {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config).serve(
                app.into_make_service()
            ).await;
            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });
        info!("HTTPS API server started on: https://{}", addr);
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
        })?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });
        info!("HTTP API server started on: http://{}", addr);
    }

    Ok(())
}

async fn start_conversation_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = Session::new();
    let conversation_id = state.agent.start_new_conversation(&mut session).await;
    (StatusCode::CREATED, Json(ConversationCreated { conversation_id }))
}

async fn chat_handler(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let mut session = match req.conversation_id {
        Some(id) =>
            match state.agent.resume_conversation(&id).await {
                Some(session) => session,
                None => {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(ErrorBody { error: format!("Unknown conversation '{}'", id) }),
                    ).into_response();
                }
            }
        None => Session::new(),
    };

    let reply = state.agent.send(&mut session, &req.content).await;
    (StatusCode::OK, Json(reply)).into_response()
}

async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> impl IntoResponse {
    let conversation_id = ConversationId::from(id);
    let messages = state.agent.history(&Session::new(), Some(&conversation_id)).await;
    Json(messages)
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>
) -> impl IntoResponse {
    let limit = clamp_limit(params.limit, state.default_limit);
    Json(state.agent.search(&params.q, limit).await)
}
