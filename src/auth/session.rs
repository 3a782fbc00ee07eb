//! Process-held session state shared between the token manager and the rest of the client.
//!
//! [`Session`] carries the application credentials (`api_key`, `redirect_uri`, ...) alongside
//! the current token pair and their expirations. [`SessionHandle`] shares one session between
//! every component of a client. Token operations take the lock only long enough to read
//! credentials and drop the stale access token; the lock is never held across a network await,
//! so two concurrent token calls race and the last [`Session::apply_grant`] wins.

// crates.io
use time::{
	Date, PrimitiveDateTime,
	format_description::well_known::{Iso8601, Rfc3339},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret},
};

/// Access type sent when the session does not configure one.
pub const DEFAULT_ACCESS_TYPE: &str = "offline";

/// Window used by [`Session::is_refresh_expiring_soon_at`].
pub const REFRESH_EXPIRY_WARNING: Duration = Duration::days(7);

/// Credentials and token state for one client.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Session {
	/// Registered application key, sent as `client_id`.
	pub api_key: Option<String>,
	/// Redirect URI registered for the application.
	pub redirect_uri: Option<String>,
	/// One-time authorization code used when none is passed per call.
	pub auth_code: Option<String>,
	/// Access type requested from the server; empty or absent means [`DEFAULT_ACCESS_TYPE`].
	pub access_type: Option<String>,
	/// Current access token.
	pub access_token: Option<TokenSecret>,
	/// Access token expiry as reported by the server.
	#[serde(with = "lenient_timestamp")]
	pub access_token_expires_at: Option<OffsetDateTime>,
	/// Current refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Refresh token expiry as reported by the server.
	#[serde(with = "lenient_timestamp")]
	pub refresh_token_expires_at: Option<OffsetDateTime>,
}
impl Session {
	/// Creates a session for the provided application key and redirect URI.
	pub fn new(api_key: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
		Self {
			api_key: Some(api_key.into()),
			redirect_uri: Some(redirect_uri.into()),
			..Default::default()
		}
	}

	/// Sets the stored authorization code.
	pub fn with_auth_code(mut self, code: impl Into<String>) -> Self {
		self.auth_code = Some(code.into());

		self
	}

	/// Sets the requested access type.
	pub fn with_access_type(mut self, access_type: impl Into<String>) -> Self {
		self.access_type = Some(access_type.into());

		self
	}

	/// Sets the stored refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Access type that will be sent, falling back to [`DEFAULT_ACCESS_TYPE`].
	pub fn effective_access_type(&self) -> &str {
		non_empty(self.access_type.as_deref()).unwrap_or(DEFAULT_ACCESS_TYPE)
	}

	/// Drops the current access token.
	pub fn clear_access_token(&mut self) -> Option<TokenSecret> {
		self.access_token.take()
	}

	/// Merges a token response into the session.
	///
	/// The refresh token and expirations are only overwritten when the response carries them.
	pub fn apply_grant(&mut self, grant: &TokenGrant) {
		self.access_token = Some(grant.access_token.clone());

		if let Some(expires_at) = grant.access_token_expires_at() {
			self.access_token_expires_at = Some(expires_at);
		}
		if let Some(refresh) = &grant.refresh_token {
			self.refresh_token = Some(refresh.clone());
		}
		if let Some(expires_at) = grant.refresh_token_expires_at() {
			self.refresh_token_expires_at = Some(expires_at);
		}
	}

	/// Returns `true` when the access token has no expiry or it is at or before `now`.
	pub fn is_access_expired_at(&self, now: OffsetDateTime) -> bool {
		expired_by(self.access_token_expires_at, now)
	}

	/// Returns `true` when the refresh token has no expiry or it is at or before `now`.
	pub fn is_refresh_expired_at(&self, now: OffsetDateTime) -> bool {
		expired_by(self.refresh_token_expires_at, now)
	}

	/// Returns `true` when the refresh token has no expiry or it falls within
	/// [`REFRESH_EXPIRY_WARNING`] of `now`.
	pub fn is_refresh_expiring_soon_at(&self, now: OffsetDateTime) -> bool {
		expired_by(self.refresh_token_expires_at, now + REFRESH_EXPIRY_WARNING)
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("api_key", &self.api_key)
			.field("redirect_uri", &self.redirect_uri)
			.field("auth_code", &self.auth_code.as_ref().map(|_| "<redacted>"))
			.field("access_type", &self.access_type)
			.field("access_token", &self.access_token)
			.field("access_token_expires_at", &self.access_token_expires_at)
			.field("refresh_token", &self.refresh_token)
			.field("refresh_token_expires_at", &self.refresh_token_expires_at)
			.finish()
	}
}

/// Shared, lockable handle to a [`Session`].
#[derive(Clone, Default)]
pub struct SessionHandle(Arc<Mutex<Session>>);
impl SessionHandle {
	/// Wraps a session for sharing.
	pub fn new(session: Session) -> Self {
		Self(Arc::new(Mutex::new(session)))
	}

	/// Locks the session. Do not hold the guard across an `.await`.
	pub fn lock(&self) -> MutexGuard<'_, Session> {
		self.0.lock()
	}

	/// Returns a copy of the current session.
	pub fn snapshot(&self) -> Session {
		self.0.lock().clone()
	}

	/// Runs `f` with exclusive access to the session.
	pub fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
		f(&mut self.0.lock())
	}

	/// Merges a token response into the shared session.
	pub fn apply_grant(&self, grant: &TokenGrant) {
		self.0.lock().apply_grant(grant);
	}
}
impl From<Session> for SessionHandle {
	fn from(session: Session) -> Self {
		Self::new(session)
	}
}
impl Debug for SessionHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SessionHandle").field(&*self.0.lock()).finish()
	}
}

/// Parses the timestamp formats accepted for session expirations.
///
/// RFC 3339 strings, Unix epochs, and other ISO 8601 forms are accepted. Epochs above `10^11`
/// are read as milliseconds, everything else as seconds. ISO 8601 values without an offset are
/// read as UTC, and a bare date means midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Some(instant);
	}
	if let Ok(value) = raw.parse::<i64>() {
		return from_epoch(value);
	}

	OffsetDateTime::parse(raw, &Iso8601::PARSING)
		.or_else(|_| PrimitiveDateTime::parse(raw, &Iso8601::PARSING).map(|dt| dt.assume_utc()))
		.or_else(|_| Date::parse(raw, &Iso8601::PARSING).map(|date| date.midnight().assume_utc()))
		.ok()
}

fn from_epoch(value: i64) -> Option<OffsetDateTime> {
	const MILLIS_THRESHOLD: i64 = 100_000_000_000;

	if value.unsigned_abs() > MILLIS_THRESHOLD.unsigned_abs() {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * 1_000_000).ok()
	} else {
		OffsetDateTime::from_unix_timestamp(value).ok()
	}
}

fn expired_by(expires_at: Option<OffsetDateTime>, instant: OffsetDateTime) -> bool {
	expires_at.is_none_or(|expires_at| expires_at <= instant)
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|value| !value.is_empty())
}

mod lenient_timestamp {
	// crates.io
	use serde::{Deserializer, Serializer, de::IgnoredAny};
	// self
	use super::*;

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Int(i64),
		Float(f64),
		Other(IgnoredAny),
	}

	pub(super) fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		time::serde::rfc3339::option::serialize(value, serializer)
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<Raw>::deserialize(deserializer)?;

		Ok(raw.and_then(|raw| match raw {
			Raw::Text(text) => parse_timestamp(&text),
			Raw::Int(value) => from_epoch(value),
			Raw::Float(value) if value.is_finite() => from_epoch(value as i64),
			Raw::Float(_) | Raw::Other(_) => None,
		}))
	}
}
