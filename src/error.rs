//! Proxy-level error types shared across the token cache, the forwarder, and the HTTP surface.

// self
use crate::_prelude::*;

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Marker message returned to callers when the upstream body is not JSON.
pub const NON_JSON_MESSAGE: &str = "Hotmart returned non-JSON response";

/// Canonical proxy error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token endpoint failure; the credential could not be obtained.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Caller supplied an unusable request.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Upstream API answered with something the proxy cannot relay as JSON.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Failures raised while obtaining an access token from the authorization endpoint.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Client identifier or secret is not configured.
	#[error("OAuth client credentials are not configured.")]
	MissingCredentials,
	/// Token endpoint answered with a non-success status.
	#[error("OAuth failed ({status}): {body}")]
	TokenEndpoint {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Raw response text, kept for diagnostics.
		body: String,
	},
	/// Token endpoint answered with a body that is not valid JSON.
	#[error("OAuth returned invalid JSON: {body}")]
	TokenResponseParse {
		/// JSON syntax failure.
		#[source]
		source: serde_json::Error,
		/// Leading part of the raw response text.
		body: String,
	},
	/// Token endpoint answered with JSON of an unexpected shape.
	#[error("OAuth response has an unexpected shape: {source}")]
	TokenResponseShape {
		/// Structured parsing failure, including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint response lacks `access_token`.
	#[error("OAuth response missing access_token")]
	MissingAccessToken,
}

/// Caller-side failures; surfaced with a client-error status.
#[derive(Debug, ThisError)]
pub enum ValidationError {
	/// `x-api-key` header is absent or does not match the configured key.
	#[error("Invalid API key")]
	InvalidApiKey,
	/// Request did not name an upstream path.
	#[error("path is required")]
	MissingPath,
	/// Upstream path cannot be appended to the API base.
	#[error("path must start with '/': {path}")]
	InvalidPath {
		/// Offending path.
		path: String,
	},
	/// Request body is not JSON.
	#[error("Invalid JSON body: {source}")]
	InvalidJson {
		/// JSON syntax failure.
		#[source]
		source: serde_json::Error,
	},
	/// Request body is JSON but not an object.
	#[error("Request body must be a JSON object")]
	NotAnObject,
	/// Request body is not a valid proxy request.
	#[error("Invalid request body: {source}")]
	MalformedBody {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ValidationError {
	/// HTTP status the validation failure is reported with.
	pub const fn status(&self) -> u16 {
		match self {
			Self::InvalidApiKey => 401,
			_ => 400,
		}
	}
}

/// Failures tied to the upstream API response.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Upstream body could not be parsed as JSON.
	#[error("Hotmart returned non-JSON response")]
	NonJson {
		/// Upstream status code, relayed to the caller.
		status: u16,
		/// Leading part of the raw upstream body.
		body: String,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}: {source}")]
	Network {
		/// Which remote endpoint was being called.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Configuration and validation failures raised while wiring the proxy.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint URL uses a scheme other than http(s).
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// API base carries a query or fragment that would corrupt forwarded URLs.
	#[error("The API base must be a bare origin or path prefix: {url}.")]
	ApiBaseNotBare {
		/// API base URL that failed validation.
		url: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
