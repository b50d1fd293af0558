//! HTTP and WebSocket handlers for the Huddle server.
//!
//! The control-plane routes read the hub's directory directly; the join route
//! validates its inputs, upgrades, and hands the socket to a [`ClientActor`].

use crate::config::Config;
use crate::error::ApiError;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use huddle_core::{ClientActor, ClientConfig, ClientInfo, Hub, HubHandle};
use huddle_protocol::{validate_room_id, ClientSummary, CreateRoomRequest, JoinParams, RoomSummary};
use huddle_transport::websocket;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Handle to the running hub.
    pub hub: HubHandle,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state, spawning the hub on the current runtime.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            hub: Hub::spawn(config.hub_config()),
            config,
        }
    }
}

/// Build the application router with its middleware stack.
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header value.
pub fn app(state: Arc<AppState>) -> Result<Router> {
    let cors = cors_layer(&state.config)?;

    Ok(Router::new()
        .route("/ws/create-room", post(create_room))
        .route("/ws/rooms", get(list_rooms))
        .route("/ws/clients/:room_id", get(list_clients))
        .route("/ws/join/:room_id", get(join_room))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let origins = &config.cors.allowed_origins;
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(AllowOrigin::any()));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

/// Run the HTTP/WebSocket server until interrupted.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = app(state)?;

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Huddle server listening on {}", addr);
    info!("Join endpoint: ws://{}/ws/join/{{roomId}}?userId=..&username=..", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Huddle server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received");
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.rooms,
        "clients": stats.clients,
    }))
}

async fn create_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<RoomSummary>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    validate_room_id(&request.id).map_err(|reason| ApiError::BadRequest(reason.to_string()))?;

    let room = state.hub.create_room(request.id, request.name);
    metrics::set_active_rooms(state.hub.stats().rooms);

    debug!(room = %room.id(), "Room created");
    Ok(Json(room.summary()))
}

async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    Json(state.hub.rooms())
}

async fn list_clients(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Json<Vec<ClientSummary>> {
    Json(state.hub.clients(&room_id))
}

/// WebSocket join handler. Rejects before upgrading when the identity is
/// incomplete or the room is unknown.
async fn join_room(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(params): Query<JoinParams>,
) -> Result<Response, ApiError> {
    let Some((user_id, username)) = params.identity() else {
        metrics::record_join_rejected("missing_identity");
        return Err(ApiError::BadRequest(
            "userId and username query parameters are required".to_string(),
        ));
    };

    if !state.hub.room_exists(&room_id) {
        metrics::record_join_rejected("room_not_found");
        warn!(room = %room_id, client = %user_id, "Join refused, room does not exist");
        return Err(ApiError::RoomNotFound(room_id));
    }

    let info = ClientInfo::new(user_id, username, room_id);
    let client_config = state.config.client_config();
    let hub = state.hub.clone();

    debug!(
        room = %info.room_id,
        client = %info.id,
        connection = %info.connection,
        "Upgrading join request"
    );

    Ok(ws
        .max_message_size(client_config.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, hub, info, client_config)))
}

/// Drive one upgraded connection to completion.
async fn handle_websocket(
    socket: WebSocket,
    hub: HubHandle,
    info: ClientInfo,
    client_config: ClientConfig,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (sink, source) = websocket::split(socket);
    let actor = ClientActor::new(info, client_config);
    let departure = actor.run(hub, sink, source).await;

    if departure.is_rejected() {
        metrics::record_join_rejected(departure.as_str());
    }
    metrics::record_departure(departure.as_str());
}
