//! The HTTP surface: webhook, subscribe and unsubscribe endpoints.
//!
//! Every endpoint answers HTTP 200 with a `{status, message}` body, including
//! for malformed requests. Bodies are parsed as JSON regardless of the
//! request's content type, since webhook senders often post `text/plain`.

use crate::core::{AlertPayload, SubscribeOutcome, UnsubscribeOutcome};
use crate::errors::RequestError;
use crate::relay::{AlertRelay, RelayReport};
use crate::store::SubscriberStore;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared handles injected into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SubscriberStore>,
    pub relay: Arc<AlertRelay>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    Success,
    NoSubscribers,
    Error,
}

/// The body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Success,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn no_subscribers() -> Self {
        Self {
            status: ApiStatus::NoSubscribers,
            message: None,
        }
    }
}

impl From<RequestError> for ApiResponse {
    fn from(e: RequestError) -> Self {
        Self::error(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct UserRequest {
    #[serde(default)]
    user_id: Option<Value>,
}

impl UserRequest {
    /// Chat ids arrive as strings or bare numbers; both are accepted.
    fn user_id(self) -> Result<String, RequestError> {
        match self.user_id {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(RequestError::MissingUserId),
        }
    }
}

/// Builds the application router.
///
/// `/metrics` is only mounted when a Prometheus handle is supplied.
pub fn router(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let router = Router::new()
        .route("/tradingview", post(tradingview_alert))
        .route("/subscribe", post(subscribe_user))
        .route("/unsubscribe", post(unsubscribe_user))
        .with_state(state);

    match prometheus {
        Some(handle) => router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        ),
        None => router,
    }
}

/// Parses a request body that must be a JSON object.
///
/// Derived struct deserializers also accept sequences, so the shape is checked
/// on the `Value` before mapping it onto `T`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, RequestError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RequestError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(RequestError::InvalidJson("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| RequestError::InvalidJson(e.to_string()))
}

async fn tradingview_alert(State(state): State<AppState>, body: Bytes) -> Json<ApiResponse> {
    let payload: AlertPayload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Error in TradingView webhook.");
            return Json(e.into());
        }
    };

    match state.relay.handle_alert(&payload).await {
        RelayReport::NoSubscribers => Json(ApiResponse::no_subscribers()),
        RelayReport::Dispatched(_) => Json(ApiResponse::success("Signal sent to subscribers")),
    }
}

async fn subscribe_user(State(state): State<AppState>, body: Bytes) -> Json<ApiResponse> {
    let user_id = match parse_body::<UserRequest>(&body).and_then(UserRequest::user_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Rejected subscribe request.");
            return Json(e.into());
        }
    };

    match state.store.subscribe(&user_id).await {
        Ok(SubscribeOutcome::Subscribed) => {
            info!(user_id = %user_id, "User subscribed.");
            Json(ApiResponse::success(format!("User {} subscribed", user_id)))
        }
        Ok(SubscribeOutcome::AlreadySubscribed) => {
            Json(ApiResponse::error("User already subscribed"))
        }
        Err(e) => {
            error!(error = %e, "Error subscribing user.");
            Json(ApiResponse::error(e.to_string()))
        }
    }
}

async fn unsubscribe_user(State(state): State<AppState>, body: Bytes) -> Json<ApiResponse> {
    let user_id = match parse_body::<UserRequest>(&body).and_then(UserRequest::user_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Rejected unsubscribe request.");
            return Json(e.into());
        }
    };

    match state.store.unsubscribe(&user_id).await {
        Ok(UnsubscribeOutcome::Unsubscribed) => {
            info!(user_id = %user_id, "User unsubscribed.");
            Json(ApiResponse::success(format!("User {} unsubscribed", user_id)))
        }
        Ok(UnsubscribeOutcome::NotFound) => {
            Json(ApiResponse::error("User not found in subscription list"))
        }
        Err(e) => {
            error!(error = %e, "Error unsubscribing user.");
            Json(ApiResponse::error(e.to_string()))
        }
    }
}
