//! Generic request forwarding to the upstream API with bearer-token injection.
//!
//! The forwarder is schema-agnostic: request and response bodies are carried as
//! [`serde_json::Value`] and the upstream status is relayed verbatim, including upstream error
//! statuses. Only a body that is not JSON at all is turned into an [`UpstreamError`].

// std
use std::str::FromStr;
// crates.io
use reqwest::{
	Method,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde::de::Error as _;
// self
use crate::{
	_prelude::*,
	auth::TokenCache,
	error::{TransportError, UpstreamError, ValidationError},
	http::{ReqwestHttpClient, truncate_chars},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	upstream::UpstreamEndpoints,
};

const NON_JSON_BODY_LIMIT: usize = 1000;
const NON_JSON_LOG_LIMIT: usize = 500;

/// HTTP methods the proxy relays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ForwardMethod {
	/// `GET`, used when the caller names no method.
	#[default]
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `DELETE`.
	Delete,
}
impl ForwardMethod {
	/// Returns the canonical upper-case method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ForwardMethod::Get => "GET",
			ForwardMethod::Post => "POST",
			ForwardMethod::Put => "PUT",
			ForwardMethod::Patch => "PATCH",
			ForwardMethod::Delete => "DELETE",
		}
	}

	/// Whether a caller-supplied body is sent with this method.
	pub const fn carries_body(self) -> bool {
		matches!(self, ForwardMethod::Post | ForwardMethod::Put | ForwardMethod::Patch)
	}
}
impl Display for ForwardMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ForwardMethod {
	type Err = UnsupportedMethod;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"GET" => Ok(ForwardMethod::Get),
			"POST" => Ok(ForwardMethod::Post),
			"PUT" => Ok(ForwardMethod::Put),
			"PATCH" => Ok(ForwardMethod::Patch),
			"DELETE" => Ok(ForwardMethod::Delete),
			_ => Err(UnsupportedMethod(s.to_owned())),
		}
	}
}
impl<'de> Deserialize<'de> for ForwardMethod {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		match Option::<String>::deserialize(deserializer)? {
			Some(raw) => raw.parse().map_err(D::Error::custom),
			None => Ok(ForwardMethod::default()),
		}
	}
}
impl From<ForwardMethod> for Method {
	fn from(method: ForwardMethod) -> Self {
		match method {
			ForwardMethod::Get => Method::GET,
			ForwardMethod::Post => Method::POST,
			ForwardMethod::Put => Method::PUT,
			ForwardMethod::Patch => Method::PATCH,
			ForwardMethod::Delete => Method::DELETE,
		}
	}
}

/// Method name outside the set the proxy relays.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("unsupported method `{0}`")]
pub struct UnsupportedMethod(pub String);

/// Caller's description of one upstream call.
///
/// Deserializes from the `POST /hotmart` body: `{ path, params?, method?, body? }`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ForwardRequest {
	/// Upstream resource path, appended verbatim to the API base.
	#[serde(default)]
	pub path: Option<String>,
	/// HTTP method; `GET` when omitted.
	#[serde(default)]
	pub method: ForwardMethod,
	/// Query parameters in caller order, form-urlencoded onto the target URL.
	#[serde(default, rename = "params", deserialize_with = "deserialize_query_params")]
	pub query_params: IndexMap<String, String>,
	/// JSON body; sent only for `POST`, `PUT`, and `PATCH`.
	#[serde(default)]
	pub body: Option<Value>,
}
impl ForwardRequest {
	/// Creates a `GET` request for `path`.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: Some(path.into()), ..Default::default() }
	}

	/// Overrides the HTTP method.
	pub fn with_method(mut self, method: ForwardMethod) -> Self {
		self.method = method;

		self
	}

	/// Adds or replaces one query parameter.
	pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query_params.insert(key.into(), value.into());

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	fn outbound_body(&self) -> Option<&Value> {
		if !self.method.carries_body() {
			return None;
		}

		self.body.as_ref().filter(|body| is_truthy(body))
	}
}

/// Upstream status code and parsed JSON body, relayed without interpretation.
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardResponse {
	/// Upstream HTTP status code.
	pub status: u16,
	/// Upstream body.
	pub body: Value,
}

/// Relays caller requests to the upstream API using the cached bearer credential.
#[derive(Debug)]
pub struct Forwarder {
	http_client: ReqwestHttpClient,
	endpoints: UpstreamEndpoints,
	tokens: TokenCache,
}
impl Forwarder {
	/// Creates a forwarder that owns the process-wide token cache.
	pub fn new(
		http_client: ReqwestHttpClient,
		endpoints: UpstreamEndpoints,
		tokens: TokenCache,
	) -> Self {
		Self { http_client, endpoints, tokens }
	}

	/// Token cache consulted before every forwarded call.
	pub fn tokens(&self) -> &TokenCache {
		&self.tokens
	}

	/// Endpoints calls are forwarded to.
	pub fn endpoints(&self) -> &UpstreamEndpoints {
		&self.endpoints
	}

	/// Validates `request`, attaches the bearer token, and relays the upstream answer.
	pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse> {
		const KIND: FlowKind = FlowKind::Forward;

		let span = FlowSpan::new(KIND, "forward");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.forward_inner(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn forward_inner(&self, request: ForwardRequest) -> Result<ForwardResponse> {
		let path = request
			.path
			.as_deref()
			.filter(|path| !path.is_empty())
			.ok_or(ValidationError::MissingPath)?;
		let url = self.endpoints.resource_url(path, &request.query_params)?;
		let token = self.tokens.ensure_token().await?;

		tracing::info!(method = %request.method, %url, "Forwarding request.");

		let mut outbound = self
			.http_client
			.request(request.method.into(), url)
			.bearer_auth(token.expose())
			.header(ACCEPT, "application/json");

		if let Some(body) = request.outbound_body() {
			outbound = outbound.header(CONTENT_TYPE, "application/json").body(body.to_string());
		}

		let response = self
			.http_client
			.send_text(outbound)
			.await
			.map_err(|e| TransportError::network("the upstream API", e))?;
		let status = response.status;

		match serde_json::from_str::<Value>(&response.body) {
			Ok(body) => {
				let items = body.get("items").and_then(Value::as_array).map(Vec::len);

				tracing::info!(status, items = ?items, "Upstream responded.");

				Ok(ForwardResponse { status, body })
			},
			Err(_) => {
				tracing::error!(
					status,
					body = %truncate_chars(&response.body, NON_JSON_LOG_LIMIT),
					"Upstream returned a non-JSON response."
				);

				Err(UpstreamError::NonJson {
					status,
					body: truncate_chars(&response.body, NON_JSON_BODY_LIMIT),
				}
				.into())
			},
		}
	}
}

/// Reads `params` as an object whose values are coerced to strings; `null` means no params.
fn deserialize_query_params<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let Some(map) = Option::<serde_json::Map<String, Value>>::deserialize(deserializer)? else {
		return Ok(IndexMap::new());
	};

	Ok(map.into_iter().map(|(key, value)| (key, query_value(value))).collect())
}

/// `null`, `false`, `0`, and `""` count as no body.
fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

fn query_value(value: Value) -> String {
	match value {
		Value::String(s) => s,
		Value::Array(items) => items.into_iter().map(query_value).collect::<Vec<_>>().join(","),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn parse(value: Value) -> ForwardRequest {
		serde_json::from_value(value).expect("Forward request fixture should deserialize.")
	}

	#[test]
	fn request_defaults_to_get_without_params() {
		let request = parse(json!({ "path": "/x" }));

		assert_eq!(request, ForwardRequest::new("/x"));
		assert_eq!(request.method, ForwardMethod::Get);
		assert!(request.query_params.is_empty());
		assert!(request.body.is_none());
	}

	#[test]
	fn empty_object_has_no_path() {
		let request = parse(json!({}));

		assert!(request.path.is_none());
	}

	#[test]
	fn method_is_case_insensitive_and_null_means_default() {
		assert_eq!(parse(json!({ "method": "patch" })).method, ForwardMethod::Patch);
		assert_eq!(parse(json!({ "method": null })).method, ForwardMethod::Get);
		assert_eq!("Delete".parse::<ForwardMethod>(), Ok(ForwardMethod::Delete));
	}

	#[test]
	fn unsupported_method_is_rejected() {
		let err =
			serde_json::from_value::<ForwardRequest>(json!({ "path": "/x", "method": "TRACE" }))
				.expect_err("TRACE should not be relayed.");

		assert!(err.to_string().contains("unsupported method `TRACE`"));
	}

	#[test]
	fn params_are_coerced_to_strings() {
		let request = parse(json!({
			"path": "/x",
			"params": { "max_results": 50, "transaction": "HP1", "flag": true, "ids": [1, 2] }
		}));

		assert_eq!(request.query_params.get("max_results").map(String::as_str), Some("50"));
		assert_eq!(request.query_params.get("transaction").map(String::as_str), Some("HP1"));
		assert_eq!(request.query_params.get("flag").map(String::as_str), Some("true"));
		assert_eq!(request.query_params.get("ids").map(String::as_str), Some("1,2"));
		assert!(parse(json!({ "params": null })).query_params.is_empty());
	}

	#[test]
	fn body_only_travels_with_mutating_methods() {
		let body = json!({ "status": "ACTIVE" });
		let post =
			ForwardRequest::new("/x").with_method(ForwardMethod::Post).with_body(body.clone());
		let get = ForwardRequest::new("/x").with_body(body.clone());
		let delete = ForwardRequest::new("/x").with_method(ForwardMethod::Delete).with_body(body);
		let null = ForwardRequest::new("/x").with_method(ForwardMethod::Put).with_body(Value::Null);

		assert!(post.outbound_body().is_some());
		assert!(get.outbound_body().is_none());
		assert!(delete.outbound_body().is_none());
		assert!(null.outbound_body().is_none());
	}

	#[test]
	fn falsy_bodies_are_not_sent() {
		let with_body =
			|body: Value| ForwardRequest::new("/x").with_method(ForwardMethod::Post).with_body(body);

		for falsy in [json!(false), json!(0), json!(0.0), json!("")] {
			assert!(with_body(falsy).outbound_body().is_none());
		}
		for truthy in [json!(true), json!(1), json!("x"), json!([]), json!({})] {
			assert!(with_body(truthy).outbound_body().is_some());
		}
	}

	#[test]
	fn params_keep_caller_order() {
		let request = parse(json!({ "path": "/x", "params": { "z": 1, "a": 2, "m": 3 } }));
		let keys = request.query_params.keys().map(String::as_str).collect::<Vec<_>>();

		assert_eq!(keys, ["z", "a", "m"]);
	}
}
