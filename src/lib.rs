//! Credential-caching Hotmart API passthrough.
//!
//! Keeps the OAuth client secret on the server, caches client-credentials tokens, and forwards
//! arbitrary API calls with a bearer token.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod obs;
pub mod server;
pub mod upstream;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		sync::Arc,
	};

	pub use indexmap::IndexMap;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {http_body_util as _, httpmock as _, tower as _};
