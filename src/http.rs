//! Transport primitives shared by the token cache and the forwarder.
//!
//! Both outbound paths read the full response body as text before interpreting it, so the
//! status code and raw payload are always available for diagnostics even when the body turns
//! out not to be JSON.

// std
use std::ops::Deref;
// crates.io
use reqwest::{RequestBuilder, Response};
// self
use crate::{_prelude::*, error::ConfigError};

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// One client is shared by the token cache and the forwarder; reqwest pools connections per
/// host internally.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds the client used by the proxy binary.
	pub fn build() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self(client))
	}

	/// Sends `request` and returns the status with the whole body decoded as text.
	pub(crate) async fn send_text(
		&self,
		request: RequestBuilder,
	) -> Result<TextResponse, ReqwestError> {
		let response = request.send().await?;

		TextResponse::read(response).await
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}

/// Fully buffered response: status code plus the body as text.
#[derive(Clone, Debug)]
pub struct TextResponse {
	/// HTTP status code.
	pub status: u16,
	/// Whole body decoded using the response charset.
	pub body: String,
}
impl TextResponse {
	async fn read(response: Response) -> Result<Self, ReqwestError> {
		let status = response.status().as_u16();
		let body = response.text().await?;

		Ok(Self { status, body })
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Returns at most `max` leading characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
	match text.char_indices().nth(max) {
		Some((idx, _)) => text[..idx].to_owned(),
		None => text.to_owned(),
	}
}
