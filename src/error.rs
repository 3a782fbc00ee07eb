//! Error types surfaced by token operations, transports, and configuration.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Failures are never retried or reclassified; whatever the transport or token endpoint reported
/// reaches the caller with its original payload attached.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, I/O).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint response could not be decoded into a grant.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// Token endpoint answered with a non-success HTTP status.
	#[error("Token endpoint rejected the request with HTTP {status}.")]
	Rejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// OAuth `error` field, when the body carried one.
		error: Option<String>,
		/// OAuth `error_description` field, when the body carried one.
		error_description: Option<String>,
		/// Raw response body, lossily decoded as UTF-8.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl Error {
	/// Returns the HTTP status attached to a rejected request, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			Self::Decode(DecodeError::Malformed { status, .. }) => *status,
			_ => None,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be parsed.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An endpoint URL uses a scheme other than `http` or `https`.
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Token path is empty.
	#[error("Token path cannot be empty.")]
	EmptyTokenPath,
	/// Authorization URL requested without a configured authorization endpoint.
	#[error("No authorization endpoint is configured.")]
	MissingAuthorizationEndpoint,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint responses that cannot be turned into a [`TokenGrant`](crate::auth::TokenGrant).
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	Malformed {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned a success status without an access token.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
	/// A lifetime field exceeds the supported range.
	#[error("The {field} value exceeds the supported range.")]
	LifetimeOutOfRange {
		/// Offending field name.
		field: &'static str,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	///
	/// The transport's own error is kept as the source so callers can downcast it.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured error value.
	#[error("HTTP client error occurred while calling the token endpoint: {message}.")]
	Other {
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, ThisError)]
	#[error("Connection reset by peer.")]
	struct ResetError;

	#[test]
	fn network_errors_keep_original_source() {
		let err: Error = TransportError::network(ResetError).into();
		let source = StdError::source(&err)
			.expect("Network error should expose the transport error as its source.");

		assert!(source.downcast_ref::<ResetError>().is_some());
		assert_eq!(source.to_string(), "Connection reset by peer.");
	}

	#[test]
	fn rejected_errors_report_status() {
		let err = Error::Rejected {
			status: 400,
			error: Some("invalid_grant".into()),
			error_description: None,
			body: "{\"error\":\"invalid_grant\"}".into(),
			retry_after: None,
		};

		assert_eq!(err.status(), Some(400));
		assert_eq!(err.to_string(), "Token endpoint rejected the request with HTTP 400.");
		assert_eq!(Error::from(DecodeError::MissingAccessToken).status(), None);
	}
}
