//! Proxy server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use super::routes;
use crate::adapters::ReqwestHttpClient;
use crate::config::ChatConfig;
use crate::error::AdkResult;
use crate::traits::HttpClient;

/// Shared state for the route handlers.
#[derive(Clone)]
pub struct ProxyState {
    /// Transport used to reach the backend
    pub http: Arc<dyn HttpClient>,
    /// Backend base URL, without a trailing slash
    pub target: String,
}

impl std::fmt::Debug for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyState")
            .field("target", &self.target)
            .finish()
    }
}

impl ProxyState {
    pub fn new(target: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let target = target.into().trim_end_matches('/').to_string();
        Self { http, target }
    }

    /// State backed by reqwest, forwarding to the configured server.
    pub fn from_config(config: &ChatConfig) -> AdkResult<Self> {
        let http = ReqwestHttpClient::with_connect_timeout(config.connect_timeout())?;
        Ok(Self::new(config.base_url(), Arc::new(http)))
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.target, path)
    }
}

/// Build the proxy router with permissive CORS.
pub fn router(state: ProxyState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health))
        .route("/list-apps", get(routes::list_apps))
        .route(
            "/apps/:app/users/:user/sessions/:session",
            get(routes::get_session)
                .post(routes::create_session)
                .delete(routes::delete_session),
        )
        .route("/debug/trace/session/:session_id", get(routes::trace))
        .route("/run_sse", post(routes::run_sse))
        .layer(cors)
        .with_state(state)
}

/// Start the proxy on a specific address.
///
/// Binding port 0 picks a free port; the bound address is returned along
/// with the server task.
pub async fn start_proxy_server_on(
    addr: SocketAddr,
    state: ProxyState,
) -> color_eyre::Result<(JoinHandle<()>, SocketAddr)> {
    let target = state.target.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Proxy listening on http://{} -> {}", actual_addr, target);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Proxy server error: {}", e);
        }
    });

    Ok((handle, actual_addr))
}
