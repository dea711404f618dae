//! HTTP surface: `GET /health` and `POST /hotmart`.

// std
use std::error::Error as _;
// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde_json::json;
use time::{format_description::BorrowedFormatItem, macros::format_description};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	auth::{Secret, TokenCache},
	config::{Config, RuntimeMode},
	error::{ConfigError, NON_JSON_MESSAGE, UpstreamError, ValidationError},
	forward::{ForwardRequest, ForwardResponse, Forwarder},
	http::ReqwestHttpClient,
};

/// Header carrying the caller API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
	forwarder: Forwarder,
	api_key: Option<Secret>,
	mode: RuntimeMode,
}
impl AppState {
	/// Wires the token cache and forwarder around `http_client`.
	pub fn new(config: &Config, http_client: ReqwestHttpClient) -> Self {
		let tokens = TokenCache::new(
			http_client.clone(),
			config.endpoints.token.clone(),
			config.client_id.clone(),
			config.client_secret.clone(),
		);
		let forwarder = Forwarder::new(http_client, config.endpoints.clone(), tokens);

		Self { forwarder, api_key: config.api_key.clone(), mode: config.mode }
	}

	/// Builds the state with the proxy's own HTTP client.
	pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
		Ok(Self::new(config, ReqwestHttpClient::build()?))
	}

	/// Forwarder handling `POST /hotmart`.
	pub fn forwarder(&self) -> &Forwarder {
		&self.forwarder
	}

	/// Checks the API key, parses the body, and forwards the call.
	pub async fn proxy(&self, headers: &HeaderMap, body: &[u8]) -> Result<ForwardResponse> {
		self.authorize(headers)?;

		let request = parse_forward_request(body)?;

		self.forwarder.forward(request).await
	}

	fn authorize(&self, headers: &HeaderMap) -> Result<(), ValidationError> {
		let Some(expected) = &self.api_key else {
			return Ok(());
		};
		let presented = headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok());

		if presented.is_some_and(|value| expected.matches(value)) {
			Ok(())
		} else {
			Err(ValidationError::InvalidApiKey)
		}
	}

	fn error_response(&self, err: Error) -> Response {
		match err {
			Error::Validation(e) => {
				tracing::warn!(error = %e, "Rejected proxy request.");

				(status_code(e.status()), Json(json!({ "error": e.to_string() }))).into_response()
			},
			Error::Upstream(UpstreamError::NonJson { status, body }) => (
				status_code(status),
				Json(json!({ "error": NON_JSON_MESSAGE, "status": status, "body": body })),
			)
				.into_response(),
			other => {
				tracing::error!(error = %other, "Proxy request failed.");

				let mut payload = json!({ "error": other.to_string() });

				if self.mode.is_development() {
					payload["stack"] = Value::String(error_chain(&other));
				}

				(StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
			},
		}
	}
}

/// Liveness report; reflects only whether credentials are configured.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
	/// Always `"ok"`.
	pub status: &'static str,
	/// Whether a client identifier is configured.
	pub has_client_id: bool,
	/// Whether a client secret is configured.
	pub has_client_secret: bool,
	/// Current UTC time, ISO-8601 with milliseconds.
	pub timestamp: String,
}
impl HealthReport {
	fn at(state: &AppState, now: OffsetDateTime) -> Self {
		let tokens = state.forwarder.tokens();

		Self {
			status: "ok",
			has_client_id: tokens.has_client_id(),
			has_client_secret: tokens.has_client_secret(),
			timestamp: format_timestamp(now),
		}
	}
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/hotmart", post(proxy))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.with_state(state)
}

/// Binds `config.listen` and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: Config) -> color_eyre::Result<()> {
	let state = Arc::new(AppState::from_config(&config)?);
	let listener = TcpListener::bind(config.listen).await?;

	tracing::info!(addr = %listener.local_addr()?, "Hotmart OAuth proxy running.");
	tracing::info!(
		client_id = config.client_id.is_some(),
		client_secret = config.client_secret.is_some(),
		api_key_gate = config.api_key.is_some(),
		mode = ?config.mode,
		"Credentials configured."
	);

	axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;

	tracing::info!("Server stopped.");

	Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
	Json(HealthReport::at(&state, OffsetDateTime::now_utc()))
}

async fn proxy(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
	match state.proxy(&headers, &body).await {
		Ok(ForwardResponse { status, body }) => (status_code(status), Json(body)).into_response(),
		Err(e) => state.error_response(e),
	}
}

/// Parses a `POST /hotmart` body; an empty body reads as `{}`.
fn parse_forward_request(body: &[u8]) -> Result<ForwardRequest, ValidationError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(ForwardRequest::default());
	}

	let value = serde_json::from_slice::<Value>(body)
		.map_err(|source| ValidationError::InvalidJson { source })?;

	if !value.is_object() {
		return Err(ValidationError::NotAnObject);
	}

	serde_path_to_error::deserialize(value)
		.map_err(|source| ValidationError::MalformedBody { source })
}

fn status_code(status: u16) -> StatusCode {
	StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

fn format_timestamp(instant: OffsetDateTime) -> String {
	instant.to_offset(time::UtcOffset::UTC).format(TIMESTAMP_FORMAT).unwrap_or_default()
}

fn error_chain(err: &Error) -> String {
	let mut rendered = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		rendered.push_str("\n    caused by: ");
		rendered.push_str(&cause.to_string());

		source = cause.source();
	}

	rendered
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to listen for SIGTERM.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown signal received.");
}
