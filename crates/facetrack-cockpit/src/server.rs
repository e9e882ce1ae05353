//! [`CockpitServer`] and the [`router`] behind it.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use facetrack_runtime::ControllerHandle;
use facetrack_types::{FaceTrackError, PoseSequence, RawFacePosition, TargetPosition};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Default TCP port of the controller's HTTP interface.
pub const DEFAULT_PORT: u16 = 3333;

const DRIVE_ACCEPTED: &str = "JSON data processed successfully";
const DRIVE_REJECTED: &str = "Invalid JSON data";

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Serves [`router`] on `0.0.0.0:<port>`.
pub struct CockpitServer {
    handle: ControllerHandle,
    port: u16,
}

impl CockpitServer {
    pub fn new(handle: ControllerHandle) -> Self {
        Self {
            handle,
            port: DEFAULT_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Bind the configured port and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Server`] if the port cannot be bound or the
    /// server fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), FaceTrackError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FaceTrackError::Server(format!("bind error on {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Server`] if the server fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), FaceTrackError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|e| FaceTrackError::Server(e.to_string()))?;
        info!(%local, "cockpit listening");
        axum::serve(listener, router(self.handle))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| FaceTrackError::Server(e.to_string()))?;
        info!("cockpit stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(handle: ControllerHandle) -> Router {
    Router::new()
        .route("/drive", post(drive))
        .route("/drive/", post(drive))
        .route("/face", get(face_from_query))
        .route("/face/{x}/{y}", get(face_from_path))
        .route("/state", get(state))
        .layer(middleware::from_fn(log_request))
        .with_state(handle)
}

/// The body is taken as raw bytes so a missing or odd `Content-Type` is not
/// a rejection; only the JSON itself decides.
async fn drive(State(handle): State<ControllerHandle>, body: Bytes) -> Response {
    match PoseSequence::from_json(&body) {
        Ok(sequence) => {
            let steps = sequence.len();
            let run = handle.dispatch(sequence);
            info!(run_id = %run.id(), steps, "sequence accepted");
            (StatusCode::OK, Json(json!({ "message": DRIVE_ACCEPTED }))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "drive request rejected");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": DRIVE_REJECTED }))).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FaceQuery {
    x: Option<String>,
    y: Option<String>,
}

async fn face_from_query(
    State(handle): State<ControllerHandle>,
    Query(q): Query<FaceQuery>,
) -> Result<Json<TargetPosition>, ApiError> {
    let x = q.x.as_deref().ok_or_else(|| missing("x"))?;
    let y = q.y.as_deref().ok_or_else(|| missing("y"))?;
    report_face(&handle, x, y)
}

async fn face_from_path(
    State(handle): State<ControllerHandle>,
    Path((x, y)): Path<(String, String)>,
) -> Result<Json<TargetPosition>, ApiError> {
    report_face(&handle, &x, &y)
}

fn report_face(handle: &ControllerHandle, x: &str, y: &str) -> Result<Json<TargetPosition>, ApiError> {
    let raw = RawFacePosition::new(coordinate("x", x)?, coordinate("y", y)?)?;
    Ok(Json(handle.report_face(raw)))
}

fn coordinate(name: &str, value: &str) -> Result<f64, FaceTrackError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| FaceTrackError::InvalidPosition(format!("{name} is not a number: {value:?}")))
}

fn missing(name: &str) -> ApiError {
    ApiError::from(FaceTrackError::InvalidPosition(format!("missing query parameter {name}")))
}

#[derive(Debug, Serialize)]
struct StateResponse {
    tracking_enabled: bool,
    nod_enabled: bool,
    target: TargetPosition,
}

async fn state(State(handle): State<ControllerHandle>) -> Json<StateResponse> {
    let flags = handle.flags();
    Json(StateResponse {
        tracking_enabled: flags.tracking_enabled,
        nod_enabled: flags.nod_enabled,
        target: handle.target(),
    })
}

// ---------------------------------------------------------------------------
// Errors and request logging
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl From<FaceTrackError> for ApiError {
    fn from(e: FaceTrackError) -> Self {
        let status = match e {
            FaceTrackError::InvalidPosition(_) | FaceTrackError::InvalidSequence(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or_default().to_owned();
    let started = Instant::now();

    let res = next.run(req).await;

    info!(
        status = res.status().as_u16(),
        %method,
        %path,
        %query,
        elapsed_us = started.elapsed().as_micros() as u64,
        "request"
    );
    res
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
