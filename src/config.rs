//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable named next to it.
//! Empty values are treated as unset, so `PROXY_API_KEY=` leaves the API key gate disabled.

// std
use std::{
	convert::Infallible,
	net::{IpAddr, Ipv4Addr, SocketAddr},
};
// crates.io
use clap::Parser;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ConfigError,
	upstream::{DEFAULT_API_BASE, DEFAULT_TOKEN_URL, UpstreamEndpoints},
};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Hotmart OAuth proxy - forwards API calls with a cached client-credentials token.
#[derive(Clone, Parser)]
#[command(name = "hotmart-proxy", version, about)]
pub struct Cli {
	/// OAuth client identifier.
	#[arg(long, env = "HOTMART_CLIENT_ID")]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[arg(long, env = "HOTMART_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: Option<String>,
	/// Key callers must present in `x-api-key`; the gate is off when unset.
	#[arg(long, env = "PROXY_API_KEY", hide_env_values = true)]
	pub api_key: Option<String>,
	/// Listen address.
	#[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
	pub host: IpAddr,
	/// Listen port.
	#[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
	pub port: u16,
	/// Runtime mode; `development` adds error chains to 500 responses, anything else means
	/// production.
	#[arg(
		long = "env",
		env = "PROXY_ENV",
		default_value = "production",
		value_parser = RuntimeMode::parse
	)]
	pub mode: RuntimeMode,
	/// OAuth token endpoint.
	#[arg(long, env = "HOTMART_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
	pub token_url: String,
	/// API origin forwarded paths are appended to.
	#[arg(long, env = "HOTMART_API_BASE", default_value = DEFAULT_API_BASE)]
	pub api_base: String,
}
impl Debug for Cli {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Cli")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("api_key_set", &self.api_key.is_some())
			.field("host", &self.host)
			.field("port", &self.port)
			.field("mode", &self.mode)
			.field("token_url", &self.token_url)
			.field("api_base", &self.api_base)
			.finish()
	}
}

/// Deployment mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RuntimeMode {
	/// Error responses carry the message only.
	#[default]
	Production,
	/// Error responses also carry the error chain.
	Development,
}
impl RuntimeMode {
	/// Reads a mode name; only `development` (any case) selects development mode.
	pub fn parse(raw: &str) -> Result<Self, Infallible> {
		Ok(if raw.trim().eq_ignore_ascii_case("development") {
			RuntimeMode::Development
		} else {
			RuntimeMode::Production
		})
	}

	/// Whether internal error details may be exposed to callers.
	pub const fn is_development(self) -> bool {
		matches!(self, RuntimeMode::Development)
	}
}

/// Validated proxy configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<Secret>,
	/// Caller API key.
	pub api_key: Option<Secret>,
	/// Socket the server binds.
	pub listen: SocketAddr,
	/// Runtime mode.
	pub mode: RuntimeMode,
	/// Token endpoint and API base.
	pub endpoints: UpstreamEndpoints,
}
impl Config {
	/// Configuration with production endpoints, no credentials, and the default port.
	pub fn new() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			api_key: None,
			listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
			mode: RuntimeMode::default(),
			endpoints: UpstreamEndpoints::default(),
		}
	}

	/// Sets the OAuth client identifier and secret.
	pub fn with_client_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.client_id = Some(client_id.into());
		self.client_secret = Some(Secret::new(client_secret));

		self
	}

	/// Enables the caller API key gate.
	pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
		self.api_key = Some(Secret::new(api_key));

		self
	}

	/// Overrides the upstream endpoints.
	pub fn with_endpoints(mut self, endpoints: UpstreamEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the runtime mode.
	pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
		self.mode = mode;

		self
	}
}
impl Default for Config {
	fn default() -> Self {
		Self::new()
	}
}
impl TryFrom<Cli> for Config {
	type Error = ConfigError;

	fn try_from(cli: Cli) -> Result<Self, Self::Error> {
		Ok(Self {
			client_id: cli.client_id.filter(|id| !id.is_empty()),
			client_secret: Secret::non_empty(cli.client_secret),
			api_key: Secret::non_empty(cli.api_key),
			listen: SocketAddr::new(cli.host, cli.port),
			mode: cli.mode,
			endpoints: UpstreamEndpoints::parse(&cli.token_url, &cli.api_base)?,
		})
	}
}
