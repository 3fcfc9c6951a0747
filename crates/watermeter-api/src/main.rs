//! Water meter converter API server

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watermeter_core::{
    parse_ieee_address, CommandValue, ConverterBridge, ConverterError, LoopbackTransport,
    OtaCapability, ProfileRegistry, RawAttributeReport, StateUpdate, TransportError,
};

mod websocket;

/// How long a set / get waits for the transport
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Configure steps touch every endpoint, give them longer
const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_OTA_INDEX: &str = "https://raw.githubusercontent.com/Koenkk/zigbee-OTA/master/index.json";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bridge: ConverterBridge,
}

/// API response wrapper using serde_json::Value for flexibility
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

/// HTTP status for a converter error
fn error_status(error: &ConverterError) -> StatusCode {
    match error {
        ConverterError::InvalidValue { .. }
        | ConverterError::UnboundField(_)
        | ConverterError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        ConverterError::ProfileNotFound(_) | ConverterError::DeviceNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ConverterError::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        ConverterError::Transport(_) | ConverterError::Codec(_) => StatusCode::BAD_GATEWAY,
    }
}

fn reply<T: Serialize>(result: Result<T, ConverterError>) -> ApiResult {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => {
            tracing::debug!("Request failed: {}", e);
            (error_status(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// Bind request body
#[derive(Deserialize)]
struct BindDeviceRequest {
    model_id: String,
    #[serde(default)]
    friendly_name: Option<String>,
}

/// Result of a set request
#[derive(Serialize)]
struct SetResponse {
    state: StateUpdate,
    ignored: Vec<String>,
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List all device profiles
async fn list_profiles(State(state): State<AppState>) -> impl IntoResponse {
    let profiles: Vec<_> = state
        .bridge
        .registry()
        .profiles()
        .iter()
        .map(|profile| profile.as_ref().clone())
        .collect();
    Json(ApiResponse::success(profiles))
}

/// Get the profile for a model identifier
async fn get_profile(State(state): State<AppState>, Path(model): Path<String>) -> impl IntoResponse {
    reply(
        state
            .bridge
            .registry()
            .lookup(&model)
            .map(|profile| profile.as_ref().clone())
            .ok_or(ConverterError::ProfileNotFound(model)),
    )
}

/// List bound devices
async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.bridge.devices()))
}

/// Get a specific device
async fn get_device(State(state): State<AppState>, Path(ieee): Path<String>) -> impl IntoResponse {
    reply(parse_ieee_address(&ieee).and_then(|ieee_bytes| {
        state
            .bridge
            .device(ieee_bytes)
            .ok_or(ConverterError::DeviceNotFound(ieee))
    }))
}

/// Bind a device to a profile
async fn bind_device(
    State(state): State<AppState>,
    Path(ieee): Path<String>,
    Json(req): Json<BindDeviceRequest>,
) -> impl IntoResponse {
    reply(parse_ieee_address(&ieee).and_then(|ieee_bytes| {
        state
            .bridge
            .bind_device(ieee_bytes, &req.model_id, req.friendly_name)
    }))
}

/// Forget a device
async fn unbind_device(
    State(state): State<AppState>,
    Path(ieee): Path<String>,
) -> impl IntoResponse {
    reply(parse_ieee_address(&ieee).and_then(|ieee_bytes| state.bridge.unbind_device(ieee_bytes)))
}

/// Inject a raw report, as received from the Zigbee stack
async fn post_report(
    State(state): State<AppState>,
    Path(ieee): Path<String>,
    Json(report): Json<RawAttributeReport>,
) -> impl IntoResponse {
    reply(parse_ieee_address(&ieee).and_then(|ieee_bytes| {
        state.bridge.handle_report(ieee_bytes, &report)
    }))
}

/// Apply `{key: value}` set commands, in key order
///
/// Nothing is written unless every value in the batch is valid.
async fn set_fields(
    State(state): State<AppState>,
    Path(ieee): Path<String>,
    Json(fields): Json<BTreeMap<String, serde_json::Value>>,
) -> impl IntoResponse {
    reply(set_all(&state.bridge, &ieee, &fields).await)
}

async fn set_all(
    bridge: &ConverterBridge,
    ieee: &str,
    fields: &BTreeMap<String, serde_json::Value>,
) -> Result<SetResponse, ConverterError> {
    let ieee_bytes = parse_ieee_address(ieee)?;
    let commands: Vec<(String, CommandValue)> = fields
        .iter()
        .map(|(key, value)| (key.clone(), CommandValue::from_json(value)))
        .collect();

    let batch = bridge.set_many(ieee_bytes, &commands)?;
    batch.pending.with_timeout(COMMAND_TIMEOUT).await?;

    Ok(SetResponse {
        state: batch.state,
        ignored: batch.ignored,
    })
}

/// Request a field's value; the answer is published over the WebSocket
async fn get_field(
    State(state): State<AppState>,
    Path((ieee, key)): Path<(String, String)>,
) -> impl IntoResponse {
    let result = async {
        let ieee_bytes = parse_ieee_address(&ieee)?;
        state
            .bridge
            .get(ieee_bytes, &key)?
            .with_timeout(COMMAND_TIMEOUT)
            .await?;
        Ok::<_, ConverterError>(serde_json::json!({ "status": "read_requested", "key": key }))
    }
    .await;
    reply(result)
}

/// Run the profile's configure steps
async fn configure_device(
    State(state): State<AppState>,
    Path(ieee): Path<String>,
) -> impl IntoResponse {
    let result = async {
        let ieee_bytes = parse_ieee_address(&ieee)?;
        state
            .bridge
            .configure(ieee_bytes)?
            .with_timeout(CONFIGURE_TIMEOUT)
            .await?;
        Ok::<_, ConverterError>(serde_json::json!({ "status": "configured", "ieee": ieee }))
    }
    .await;
    reply(result)
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/profiles", get(list_profiles))
        .route("/api/v1/profiles/:model", get(get_profile))
        .route("/api/v1/devices", get(list_devices))
        .route(
            "/api/v1/devices/:ieee",
            get(get_device).post(bind_device).delete(unbind_device),
        )
        .route("/api/v1/devices/:ieee/reports", post(post_report))
        .route("/api/v1/devices/:ieee/set", post(set_fields))
        .route("/api/v1/devices/:ieee/get/:key", post(get_field))
        .route("/api/v1/devices/:ieee/configure", post(configure_device))
        // WebSocket
        .route("/ws", get(ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "watermeter_api=debug,watermeter_core=debug,zcl_codec=debug,info".into()
            }),
        )
        .init();

    tracing::info!("Starting water meter converter API server");

    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
    let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    let ota_index =
        std::env::var("OTA_INDEX_URL").unwrap_or_else(|_| DEFAULT_OTA_INDEX.to_string());

    // Handed to profiles that support firmware updates, never read here
    tracing::debug!("OTA index: {}", ota_index);
    let registry = ProfileRegistry::builtin(Some(OtaCapability::new(ota_index)))?;
    for profile in registry.profiles() {
        tracing::info!(
            "Profile {} ({}) for {:?}",
            profile.model(),
            profile.vendor(),
            profile.zigbee_models()
        );
    }

    // The Zigbee stack is external; serve against the simulated device
    let transport = Arc::new(LoopbackTransport::new());
    let frames = transport.subscribe();
    let bridge = ConverterBridge::new(Arc::new(registry), transport, &data_dir).await;
    bridge.spawn_frame_listener(frames);

    let app = router(AppState { bridge });

    tracing::info!("Listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use watermeter_core::cluster::id::METERING;
    use watermeter_core::cluster::metering_attrs::{COLD_WATER_PRESET, HOT_WATER_PRESET};

    fn bridge() -> (ConverterBridge, Arc<LoopbackTransport>) {
        let registry = Arc::new(ProfileRegistry::builtin(None).unwrap());
        let transport = Arc::new(LoopbackTransport::new());
        let bridge = ConverterBridge::in_memory(registry, transport.clone());
        (bridge, transport)
    }

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(&ConverterError::InvalidValue {
                field: "hot_water_preset".to_string(),
                value: "abc".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&ConverterError::DeviceNotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&ConverterError::Transport(TransportError::Timeout(
                COMMAND_TIMEOUT
            ))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_set_all() {
        let (bridge, transport) = bridge();
        let ieee = "00:12:4b:00:25:1c:6d:3e";
        bridge
            .bind_device(
                parse_ieee_address(ieee).unwrap(),
                "Watermeter_TLSR8258_Preset",
                None,
            )
            .unwrap();

        let fields: BTreeMap<String, serde_json::Value> = serde_json::from_value(serde_json::json!({
            "hot_water_preset": "ON",
            "step_water_preset": 75,
            "volume_1": 10
        }))
        .unwrap();
        let response = set_all(&bridge, ieee, &fields).await.unwrap();
        assert_eq!(response.ignored, vec!["volume_1".to_string()]);
        assert_eq!(response.state.len(), 2);
        assert!(transport
            .attribute(parse_ieee_address(ieee).unwrap(), 3, METERING, HOT_WATER_PRESET)
            .is_some());
    }

    #[tokio::test]
    async fn test_set_all_rejects_bad_value() {
        let (bridge, transport) = bridge();
        let ieee = "00:12:4b:00:25:1c:6d:3e";
        let ieee_bytes = parse_ieee_address(ieee).unwrap();
        bridge
            .bind_device(ieee_bytes, "Watermeter_TLSR8258_Preset", None)
            .unwrap();

        // The valid key sorts first; it must not reach the device either
        let fields = BTreeMap::from([
            ("cold_water_preset".to_string(), serde_json::json!("5")),
            ("hot_water_preset".to_string(), serde_json::json!("abc")),
        ]);
        let result = set_all(&bridge, ieee, &fields).await;
        assert!(matches!(result, Err(ConverterError::InvalidValue { .. })));
        assert!(transport
            .attribute(ieee_bytes, 3, METERING, COLD_WATER_PRESET)
            .is_none());
        assert!(transport
            .attribute(ieee_bytes, 3, METERING, HOT_WATER_PRESET)
            .is_none());
    }
}
