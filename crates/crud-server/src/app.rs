//! Application state and router assembly

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use crud_common::constants::{versioned_path, HEALTH_ROUTE};
use serde_json::{json, Value};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, sync::oneshot};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;

use crate::auth::{require_service_key, ApiKeyAuth};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::crypto::CryptoClient;
use crate::health::HealthService;
use crate::middleware;
use crate::store::DataSource;
use crate::template;

/// Cache key holding the key material fetched from the crypto service
pub const CRYPTO_KEYS_CACHE_KEY: &str = "crypto-keys";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub data_source: DataSource,
    pub health: HealthService,
    pub cache: TtlCache<String, Value>,
    pub crypto: CryptoClient,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, data_source: DataSource) -> Self {
        let http = reqwest::Client::new();
        Self {
            health: HealthService::from_config(&config.health, http.clone()),
            cache: TtlCache::from_config(&config.cache),
            crypto: CryptoClient::new(http, &config.crypto_service, &config.encryption),
            data_source,
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }

    pub fn with_health(mut self, health: HealthService) -> Self {
        self.health = health;
        self
    }

    /// Fetches key material when encryption is enabled and caches it.
    ///
    /// A failure is logged and leaves the cache empty; the service still starts.
    pub async fn prime_crypto_keys(&self) {
        if !self.crypto.is_enabled() {
            return;
        }

        match self.crypto.request_keys().await {
            Ok(keys) => {
                tracing::info!(uuid = %keys.uuid, "Fetched keys from crypto service");
                self.cache
                    .insert(CRYPTO_KEYS_CACHE_KEY.to_string(), Value::Object(keys.body));
            },
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.crypto.endpoint(),
                    error = %e,
                    "Could not fetch keys from crypto service"
                );
            },
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut api = Router::new().nest(
        &versioned_path(template::API_VERSION, template::CONTROLLER_PATH),
        template::routes(&state.data_source, config.app.enable_error_stack),
    );

    if config.auth.api_keys.is_empty() {
        tracing::warn!("SERVICE_API_KEYS is empty; API routes are not authenticated");
    } else {
        let auth = ApiKeyAuth::new(config.auth.api_keys.clone());
        api = api.layer(from_fn_with_state(auth, require_service_key));
    }

    let router = Router::new()
        .route("/", get(root))
        .route(&format!("/{HEALTH_ROUTE}"), get(health_check))
        .with_state(state)
        .merge(api)
        // The request id is set before tracing and handlers see the request.
        .layer(
            ServiceBuilder::new()
                .layer(middleware::set_request_id_layer())
                .layer(middleware::tracing_layer())
                .layer(middleware::propagate_request_id_layer())
                .layer(CompressionLayer::new()),
        );

    match middleware::cors_layer(&config.cors) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Serves `router` until `signal` resolves, then drains in-flight requests.
///
/// New connections stop being accepted as soon as the signal fires. Requests
/// still running after `drain_timeout` are dropped.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    signal: F,
    drain_timeout: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (draining_tx, draining_rx) = oneshot::channel::<()>();

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = draining_tx.send(());
        })
        .into_future();

    let deadline = async move {
        match draining_rx.await {
            Ok(()) => tokio::time::sleep(drain_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => result,
        _ = deadline => {
            tracing::warn!(
                timeout_secs = drain_timeout.as_secs(),
                "Shutdown timeout elapsed, dropping open connections"
            );
            Ok(())
        },
    }
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": state.config.app.name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "startedAt": state.started_at.to_rfc3339()
    }))
}

/// Aggregate health; 503 when any check fails
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.health.check().await;
    let status = if result.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(result))
}
