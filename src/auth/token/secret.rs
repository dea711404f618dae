//! Redacting wrapper for access tokens, client secrets, and API keys.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Wraps `value` unless it is empty; an empty environment value counts as unset.
	pub fn non_empty(value: Option<String>) -> Option<Self> {
		value.filter(|v| !v.is_empty()).map(Self)
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Compares a caller-presented value against the secret without short-circuiting on the
	/// first differing byte.
	pub fn matches(&self, candidate: &str) -> bool {
		let expected = self.0.as_bytes();
		let candidate = candidate.as_bytes();

		if expected.len() != candidate.len() {
			return false;
		}

		expected.iter().zip(candidate).fold(0_u8, |acc, (a, b)| acc | (a ^ b)) == 0
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
