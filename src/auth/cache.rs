//! Process-wide credential cache with on-demand client-credentials refresh.
//!
//! [`TokenCache::ensure_token`] hands out the cached access token while it is valid and calls
//! the token endpoint otherwise. The cache lock only guards reads and writes of the stored
//! value and is never held across the token request, so two callers that find the cache empty
//! at the same time both fetch a token and the last response to arrive wins.

// crates.io
use reqwest::header::ACCEPT;
// self
use crate::{
	_prelude::*,
	auth::{CachedCredential, Secret},
	error::{AuthError, TransportError},
	http::{ReqwestHttpClient, truncate_chars},
	obs::{self, CacheLookup, FlowKind, FlowOutcome, FlowSpan},
};

const GRANT_TYPE: &str = "client_credentials";
const PARSE_ERROR_BODY_LIMIT: usize = 500;

/// Holds at most one access token and refreshes it through the client-credentials grant.
pub struct TokenCache {
	http_client: ReqwestHttpClient,
	token_endpoint: Url,
	client_id: Option<String>,
	client_secret: Option<Secret>,
	cached: Mutex<Option<CachedCredential>>,
}
impl TokenCache {
	/// Creates an empty cache for the given token endpoint and client credentials.
	///
	/// Missing credentials are accepted here so the proxy can start and report them through
	/// its health check; every fetch then fails with [`AuthError::MissingCredentials`].
	pub fn new(
		http_client: ReqwestHttpClient,
		token_endpoint: Url,
		client_id: Option<String>,
		client_secret: Option<Secret>,
	) -> Self {
		Self { http_client, token_endpoint, client_id, client_secret, cached: Mutex::new(None) }
	}

	/// Whether a client identifier is configured.
	pub fn has_client_id(&self) -> bool {
		self.client_id.is_some()
	}

	/// Whether a client secret is configured.
	pub fn has_client_secret(&self) -> bool {
		self.client_secret.is_some()
	}

	/// Returns a valid access token, fetching a new one when the cache is empty or expired.
	pub async fn ensure_token(&self) -> Result<Secret> {
		self.ensure_token_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`ensure_token`](Self::ensure_token) with an explicit clock reading.
	///
	/// A fetched credential expires at `now + expires_in - 60s`.
	pub async fn ensure_token_at(&self, now: OffsetDateTime) -> Result<Secret> {
		if let Some(token) = self.cached_at(now) {
			tracing::debug!("Using cached token.");
			obs::record_cache_lookup(CacheLookup::Hit);

			return Ok(token);
		}

		obs::record_cache_lookup(CacheLookup::Miss);

		const KIND: FlowKind = FlowKind::TokenRefresh;

		let span = FlowSpan::new(KIND, "ensure_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.fetch(now)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				tracing::error!(error = %e, "Token request failed.");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		let credential = result?;
		let token = credential.token.clone();

		*self.cached.lock() = Some(credential);

		Ok(token)
	}

	fn cached_at(&self, now: OffsetDateTime) -> Option<Secret> {
		self.cached
			.lock()
			.as_ref()
			.filter(|credential| credential.is_valid_at(now))
			.map(|credential| credential.token.clone())
	}

	async fn fetch(&self, now: OffsetDateTime) -> Result<CachedCredential> {
		let (Some(client_id), Some(client_secret)) =
			(self.client_id.as_deref(), self.client_secret.as_ref())
		else {
			return Err(AuthError::MissingCredentials.into());
		};

		tracing::info!("Requesting new OAuth token.");

		let form = [
			("grant_type", GRANT_TYPE),
			("client_id", client_id),
			("client_secret", client_secret.expose()),
		];
		let request = self
			.http_client
			.post(self.token_endpoint.clone())
			.header(ACCEPT, "application/json")
			.form(&form);
		let response = self
			.http_client
			.send_text(request)
			.await
			.map_err(|e| TransportError::network("the token endpoint", e))?;

		if !response.is_success() {
			return Err(
				AuthError::TokenEndpoint { status: response.status, body: response.body }.into()
			);
		}

		let parsed = TokenResponse::parse(&response.body)?;
		let lifetime = parsed.lifetime();

		if parsed.expires_in.is_none() {
			tracing::warn!("Token response carries no usable expires_in; it will not be reused.");
		}

		let token = parsed
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(AuthError::MissingAccessToken)?;

		tracing::info!(expires_in = lifetime.whole_seconds(), "Token acquired.");

		Ok(CachedCredential::issue(Secret::new(token), lifetime, now))
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id_set", &self.client_id.is_some())
			.field("client_secret_set", &self.client_secret.is_some())
			.field("cached", &*self.cached.lock())
			.finish()
	}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default, deserialize_with = "deserialize_expires_in")]
	expires_in: Option<f64>,
}
impl TokenResponse {
	fn parse(body: &str) -> Result<Self, AuthError> {
		let value = serde_json::from_str::<Value>(body).map_err(|source| {
			AuthError::TokenResponseParse {
				source,
				body: truncate_chars(body, PARSE_ERROR_BODY_LIMIT),
			}
		})?;

		serde_path_to_error::deserialize(value)
			.map_err(|source| AuthError::TokenResponseShape { source })
	}

	fn lifetime(&self) -> Duration {
		self.expires_in.map(Duration::saturating_seconds_f64).unwrap_or(Duration::ZERO)
	}
}

/// Accepts `expires_in` as a JSON number or a numeric string; anything else counts as absent.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;

	Ok(match value {
		Some(Value::Number(n)) => n.as_f64(),
		Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
		_ => None,
	}
	.filter(|secs| secs.is_finite()))
}
