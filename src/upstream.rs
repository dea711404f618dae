//! Upstream endpoint set: the OAuth token endpoint and the API origin calls are forwarded to.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, ValidationError},
};

/// Production Hotmart token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://developers.hotmart.com/oauth/token";
/// Production Hotmart API origin.
pub const DEFAULT_API_BASE: &str = "https://api.hotmart.com";

/// Validated endpoint pair consumed by the token cache and the forwarder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamEndpoints {
	/// Token endpoint used for the client-credentials grant.
	pub token: Url,
	/// Origin (optionally with a path prefix) that forwarded paths are appended to.
	pub api_base: Url,
}
impl UpstreamEndpoints {
	/// Parses and validates both endpoints.
	pub fn parse(token: &str, api_base: &str) -> Result<Self, ConfigError> {
		let token = parse_endpoint("token", token)?;
		let api_base = parse_endpoint("api base", api_base)?;

		if api_base.query().is_some() || api_base.fragment().is_some() {
			return Err(ConfigError::ApiBaseNotBare { url: api_base.to_string() });
		}

		Ok(Self { token, api_base })
	}

	/// Builds the forwarded URL: API base, then `path` verbatim, then the encoded query in
	/// insertion order.
	pub fn resource_url(
		&self,
		path: &str,
		query: &IndexMap<String, String>,
	) -> Result<Url, ValidationError> {
		if !path.starts_with('/') {
			return Err(ValidationError::InvalidPath { path: path.to_owned() });
		}

		let base = self.api_base.as_str().trim_end_matches('/');
		let mut url = Url::parse(&format!("{base}{path}"))
			.map_err(|_| ValidationError::InvalidPath { path: path.to_owned() })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}
}
impl Default for UpstreamEndpoints {
	fn default() -> Self {
		Self::parse(DEFAULT_TOKEN_URL, DEFAULT_API_BASE)
			.unwrap_or_else(|e| unreachable!("built-in endpoints are valid: {e}"))
	}
}

fn parse_endpoint(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { endpoint: name, source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedScheme { endpoint: name, url: url.to_string() }),
	}
}
