//! The single cached access token and its expiry bookkeeping.

// crates.io
use time::Date;
// self
use crate::{_prelude::*, auth::token::secret::Secret};

/// Credentials are retired this long before the provider-declared expiry so a token never
/// lapses while a forwarded call is in flight.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::seconds(60);

/// Access token plus the instant after which it must no longer be reused.
#[derive(Clone)]
pub struct CachedCredential {
	/// Access token secret; callers must avoid logging it.
	pub token: Secret,
	/// Instant the token endpoint answered.
	pub issued_at: OffsetDateTime,
	/// Instant at which the cache stops handing out this token.
	pub expires_at: OffsetDateTime,
}
impl CachedCredential {
	/// Builds a credential fetched at `now` with the provider-declared `lifetime`.
	///
	/// The stored expiry is `now + lifetime - 60s`, clamped to the representable range: an
	/// out-of-range lifetime yields a far-future expiry, a negative one an expiry of `now`.
	pub fn issue(token: Secret, lifetime: Duration, now: OffsetDateTime) -> Self {
		let remaining = lifetime.saturating_sub(EXPIRY_SAFETY_MARGIN);
		let expires_at = now.checked_add(remaining).unwrap_or(if remaining.is_negative() {
			now
		} else {
			Date::MAX.midnight().assume_utc()
		});

		Self { token, issued_at: now, expires_at }
	}

	/// Returns `true` while `instant` is strictly before the expiry.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}
impl Debug for CachedCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedCredential")
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn expiry_subtracts_safety_margin() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = CachedCredential::issue(Secret::new("t"), Duration::hours(1), now);

		assert_eq!(credential.issued_at, now);
		assert_eq!(credential.expires_at, macros::datetime!(2025-01-01 00:59 UTC));
	}

	#[test]
	fn validity_is_strictly_before_expiry() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = CachedCredential::issue(Secret::new("t"), Duration::seconds(120), now);

		assert!(credential.is_valid_at(now));
		assert!(credential.is_valid_at(now + Duration::seconds(59)));
		assert!(!credential.is_valid_at(now + Duration::seconds(60)));
		assert!(!credential.is_valid_at(now + Duration::seconds(61)));
	}

	#[test]
	fn zero_lifetime_is_never_reused() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = CachedCredential::issue(Secret::new("t"), Duration::ZERO, now);

		assert!(!credential.is_valid_at(now));
	}

	#[test]
	fn extreme_lifetimes_clamp_instead_of_overflowing() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let forever = CachedCredential::issue(Secret::new("t"), Duration::MAX, now);
		let expired = CachedCredential::issue(Secret::new("t"), Duration::MIN, now);

		assert!(forever.is_valid_at(now + Duration::days(365 * 100)));
		assert_eq!(expired.expires_at, now);
		assert!(!expired.is_valid_at(now));
	}

	#[test]
	fn debug_redacts_token() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = CachedCredential::issue(Secret::new("leak"), Duration::hours(1), now);

		assert!(!format!("{credential:?}").contains("leak"));
	}
}
