//! Grant identifiers and the typed token endpoint response.

// self
use crate::{_prelude::*, auth::TokenSecret, error::DecodeError};

/// OAuth 2.0 grant types sent to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Exchange a one-time authorization code for the initial token pair.
	AuthorizationCode,
	/// Trade a refresh token for a new access token (and optionally a new refresh token).
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token endpoint response decoded from a successful exchange.
///
/// Only `access_token` is mandatory. Every field the server sends that is not modeled here is
/// kept in [`TokenGrant::extra`] untouched.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Token type reported by the server (usually `Bearer`).
	#[serde(default)]
	pub token_type: Option<String>,
	/// Granted scope string, as sent by the server.
	#[serde(default)]
	pub scope: Option<String>,
	/// Access token lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<u64>,
	/// Refresh token, when the server issued or rotated one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Refresh token lifetime in seconds.
	#[serde(default)]
	pub refresh_token_expires_in: Option<u64>,
	/// Unmodeled response fields.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
	/// Instant the response was decoded.
	#[serde(skip, default = "OffsetDateTime::now_utc")]
	pub received_at: OffsetDateTime,
}
impl TokenGrant {
	/// Decodes a response body, stamping [`TokenGrant::received_at`] with `received_at`.
	pub fn from_slice(
		body: &[u8],
		status: Option<u16>,
		received_at: OffsetDateTime,
	) -> Result<Self, DecodeError> {
		#[derive(Deserialize)]
		struct Probe {
			#[serde(default)]
			access_token: Option<serde_json::Value>,
		}

		let mut de = serde_json::Deserializer::from_slice(body);
		let probe: Probe = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DecodeError::Malformed { source, status })?;

		if !matches!(probe.access_token, Some(serde_json::Value::String(ref value)) if !value.is_empty())
		{
			return Err(DecodeError::MissingAccessToken);
		}

		let mut de = serde_json::Deserializer::from_slice(body);
		let mut grant: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DecodeError::Malformed { source, status })?;

		grant.received_at = received_at;
		grant.validate()?;

		Ok(grant)
	}

	/// Access token lifetime as a [`Duration`].
	pub fn access_lifetime(&self) -> Result<Option<Duration>, DecodeError> {
		lifetime("expires_in", self.expires_in)
	}

	/// Refresh token lifetime as a [`Duration`].
	pub fn refresh_lifetime(&self) -> Result<Option<Duration>, DecodeError> {
		lifetime("refresh_token_expires_in", self.refresh_token_expires_in)
	}

	/// Absolute access token expiry derived from the server-supplied lifetime.
	pub fn access_token_expires_at(&self) -> Option<OffsetDateTime> {
		self.access_lifetime().ok().flatten().map(|ttl| self.received_at + ttl)
	}

	/// Absolute refresh token expiry derived from the server-supplied lifetime.
	pub fn refresh_token_expires_at(&self) -> Option<OffsetDateTime> {
		self.refresh_lifetime().ok().flatten().map(|ttl| self.received_at + ttl)
	}

	fn validate(&self) -> Result<(), DecodeError> {
		self.access_lifetime()?;
		self.refresh_lifetime()?;

		Ok(())
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token_expires_in", &self.refresh_token_expires_in)
			.field("extra", &self.extra.keys().collect::<Vec<_>>())
			.field("received_at", &self.received_at)
			.finish()
	}
}

// Lifetimes beyond ~100 years are rejected so `received_at + ttl` cannot overflow.
const MAX_LIFETIME_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn lifetime(field: &'static str, secs: Option<u64>) -> Result<Option<Duration>, DecodeError> {
	match secs {
		None => Ok(None),
		Some(secs) if secs > MAX_LIFETIME_SECS => Err(DecodeError::LifetimeOutOfRange { field }),
		Some(secs) => i64::try_from(secs)
			.map(|secs| Some(Duration::seconds(secs)))
			.map_err(|_| DecodeError::LifetimeOutOfRange { field }),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const NOW: OffsetDateTime = macros::datetime!(2025-03-01 12:00 UTC);

	#[test]
	fn decodes_full_response_and_keeps_extras() {
		let body = br#"{
			"access_token": "access-1",
			"refresh_token": "refresh-1",
			"scope": "PlaceTrades AccountAccess MoveMoney",
			"expires_in": 1800,
			"refresh_token_expires_in": 7776000,
			"token_type": "Bearer",
			"issuer": "brokerage"
		}"#;
		let grant = TokenGrant::from_slice(body, Some(200), NOW)
			.expect("Complete token response should decode.");

		assert_eq!(grant.access_token.expose(), "access-1");
		assert_eq!(grant.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
		assert_eq!(grant.token_type.as_deref(), Some("Bearer"));
		assert_eq!(grant.extra.get("issuer"), Some(&serde_json::json!("brokerage")));
		assert_eq!(grant.access_token_expires_at(), Some(macros::datetime!(2025-03-01 12:30 UTC)));
		assert_eq!(grant.refresh_token_expires_at(), Some(macros::datetime!(2025-05-30 12:00 UTC)));
	}

	#[test]
	fn missing_access_token_is_a_decode_error() {
		let err = TokenGrant::from_slice(br#"{"refresh_token":"r","expires_in":60}"#, None, NOW)
			.expect_err("Response without access_token should fail.");

		assert!(matches!(err, DecodeError::MissingAccessToken));

		let err = TokenGrant::from_slice(br#"{"access_token":""}"#, None, NOW)
			.expect_err("Empty access_token should fail.");

		assert!(matches!(err, DecodeError::MissingAccessToken));
	}

	#[test]
	fn malformed_json_reports_path_and_status() {
		let err = TokenGrant::from_slice(br#"{"access_token":"a","expires_in":"soon"}"#, Some(200), NOW)
			.expect_err("String lifetime should fail to decode.");

		match err {
			DecodeError::Malformed { source, status } => {
				assert_eq!(status, Some(200));
				assert_eq!(source.path().to_string(), "expires_in");
			},
			other => panic!("Unexpected decode error: {other:?}."),
		}

		assert!(matches!(
			TokenGrant::from_slice(b"<html>", Some(200), NOW),
			Err(DecodeError::Malformed { .. })
		));
	}

	#[test]
	fn absurd_lifetimes_are_rejected() {
		let err = TokenGrant::from_slice(
			br#"{"access_token":"a","expires_in":18446744073709551615}"#,
			None,
			NOW,
		)
		.expect_err("u64::MAX lifetime should be rejected.");

		assert!(matches!(err, DecodeError::LifetimeOutOfRange { field: "expires_in" }));
	}

	#[test]
	fn debug_redacts_tokens() {
		let grant = TokenGrant::from_slice(br#"{"access_token":"hidden","refresh_token":"also"}"#, None, NOW)
			.expect("Minimal token response should decode.");
		let rendered = format!("{grant:?}");

		assert!(!rendered.contains("hidden"));
		assert!(!rendered.contains("also"));
		assert_eq!(grant.access_token_expires_at(), None);
	}
}
