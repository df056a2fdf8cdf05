//! Mock scrape API over HTTP.
//!
//! Axum routes in front of a [`JobStore`], with an artificial response
//! latency that emulates a remote backend.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use scrape_logging::{scrape_debug, scrape_error, scrape_info, scrape_warn};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::store::{JobStore, StoreError, StoreSettings, URL_REQUIRED};
use crate::wire::{ErrorBody, SubmitRequest, SubmitResponse, SUBMIT_MESSAGE};

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub listen_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Delay added to every response.
    pub response_delay: Duration,
    pub cors_enabled: bool,
    pub store: StoreSettings,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8081)),
            db_path: PathBuf::from("db.json"),
            response_delay: Duration::from_millis(500),
            cors_enabled: true,
            store: StoreSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("http server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Clone)]
struct ApiState {
    store: Arc<JobStore>,
}

/// Builds the API router. Routes:
///
/// - `GET /scrapes`: all jobs, newest first
/// - `GET /scrapes/:id`: one job or 404
/// - `POST /scrape`: submit `{url}`
pub fn create_router(store: Arc<JobStore>, settings: &ServerSettings) -> Router {
    let mut app = Router::new()
        .route("/scrapes", get(list_scrapes))
        .route("/scrapes/:id", get(get_scrape))
        .route("/scrape", post(submit_scrape))
        .with_state(ApiState { store })
        .layer(middleware::from_fn_with_state(
            settings.response_delay,
            simulate_latency,
        ));

    if settings.cors_enabled {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);
        app = app.layer(cors);
    }

    app
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        scrape_info!("Mock API listening on http://{}", addr);
        scrape_info!("  GET  /scrapes");
        scrape_info!("  GET  /scrapes/:id");
        scrape_info!("  POST /scrape");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    scrape_info!("Mock API shut down");
    Ok(())
}

/// Binds `settings.listen_addr` and serves until `shutdown` resolves.
pub async fn run(
    store: Arc<JobStore>,
    settings: &ServerSettings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(settings.listen_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: settings.listen_addr,
            source,
        })?;
    serve(listener, create_router(store, settings), shutdown).await
}

async fn simulate_latency(State(delay): State<Duration>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    response
}

/// Runs a store call on the blocking pool; the repository does file I/O.
async fn with_store<T, F>(state: &ApiState, call: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&JobStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || call(&store))
        .await
        .unwrap_or_else(|err| Err(StoreError::Interrupted(err.to_string())))
}

async fn list_scrapes(State(state): State<ApiState>) -> Response {
    match with_store(&state, |store| store.list()).await {
        Ok(jobs) => {
            scrape_debug!("GET /scrapes -> {} jobs", jobs.len());
            Json(jobs).into_response()
        }
        Err(err) => store_error_response(err),
    }
}

async fn get_scrape(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match with_store(&state, move |store| store.get(&id)).await {
        Ok(job) => Json(job).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn submit_scrape(
    State(state): State<ApiState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            scrape_warn!("Rejected scrape submission: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, URL_REQUIRED);
        }
    };
    let url = request.url.unwrap_or_default();

    match with_store(&state, move |store| store.create(&url)).await {
        Ok(ack) => (
            StatusCode::OK,
            Json(SubmitResponse {
                success: ack.acknowledged,
                id: ack.id,
                message: SUBMIT_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::InvalidInput(message) => error_response(StatusCode::BAD_REQUEST, message),
        StoreError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("Scrape {id} not found"))
        }
        StoreError::Internal(err) => {
            scrape_error!("Job database failure: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        StoreError::Interrupted(reason) => {
            scrape_error!("Store call did not finish: {}", reason);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}
