//! Endpoint configuration for the brokerage API.
//!
//! [`ClientConfig`] names where token requests go. Token endpoints hang off the API base URL the
//! same way every other REST resource does, so the token path is appended to the base URL
//! verbatim instead of being resolved as a relative reference (a base of
//! `https://api.example.com/v1` and a path of `/oauth2/token` yield
//! `https://api.example.com/v1/oauth2/token`).

// self
use crate::{_prelude::*, error::ConfigError};

/// Default REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.tdameritrade.com/v1";
/// Default token path appended to the base URL.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth2/token";
/// Default user-facing authorization endpoint.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://auth.tdameritrade.com/auth";

/// Validated endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClientConfigBuilder", into = "ClientConfigBuilder")]
pub struct ClientConfig {
	base_url: Url,
	token_path: String,
	token_url: Url,
	authorization_endpoint: Option<Url>,
}
impl ClientConfig {
	/// Returns a builder seeded with the default endpoints.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Path appended to the base URL for token requests.
	pub fn token_path(&self) -> &str {
		&self.token_path
	}

	/// Fully resolved token endpoint.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// User-facing authorization endpoint, if configured.
	pub fn authorization_endpoint(&self) -> Option<&Url> {
		self.authorization_endpoint.as_ref()
	}

	/// Builds the URL the account holder visits to obtain an authorization code.
	///
	/// Empty values are omitted; the server decides whether the request is acceptable.
	pub fn authorization_url(
		&self,
		client_id: Option<&str>,
		redirect_uri: Option<&str>,
		state: Option<&str>,
	) -> Result<Url, ConfigError> {
		let mut url =
			self.authorization_endpoint.clone().ok_or(ConfigError::MissingAuthorizationEndpoint)?;

		{
			let mut query = url.query_pairs_mut();

			query.append_pair("response_type", "code");

			for (key, value) in
				[("redirect_uri", redirect_uri), ("client_id", client_id), ("state", state)]
			{
				if let Some(value) = value.filter(|value| !value.is_empty()) {
					query.append_pair(key, value);
				}
			}
		}

		Ok(url)
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfigBuilder {
	/// REST base URL.
	pub base_url: String,
	/// Token path appended to the base URL.
	pub token_path: String,
	/// Optional user-facing authorization endpoint.
	pub authorization_endpoint: Option<String>,
}
impl ClientConfigBuilder {
	/// Overrides the REST base URL.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into();

		self
	}

	/// Overrides the token path.
	pub fn token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	/// Overrides the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: impl Into<String>) -> Self {
		self.authorization_endpoint = Some(url.into());

		self
	}

	/// Removes the authorization endpoint.
	pub fn without_authorization_endpoint(mut self) -> Self {
		self.authorization_endpoint = None;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = parse_endpoint("base", &self.base_url)?;

		if self.token_path.trim().is_empty() {
			return Err(ConfigError::EmptyTokenPath);
		}

		let token_url = join_path(&base_url, &self.token_path)?;
		let authorization_endpoint = self
			.authorization_endpoint
			.as_deref()
			.map(|raw| parse_endpoint("authorization", raw))
			.transpose()?;

		Ok(ClientConfig { base_url, token_path: self.token_path, token_url, authorization_endpoint })
	}
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.into(),
			token_path: DEFAULT_TOKEN_PATH.into(),
			authorization_endpoint: Some(DEFAULT_AUTHORIZATION_ENDPOINT.into()),
		}
	}
}
impl TryFrom<ClientConfigBuilder> for ClientConfig {
	type Error = ConfigError;

	fn try_from(builder: ClientConfigBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
impl From<ClientConfig> for ClientConfigBuilder {
	fn from(config: ClientConfig) -> Self {
		Self {
			base_url: config.base_url.into(),
			token_path: config.token_path,
			authorization_endpoint: config.authorization_endpoint.map(Into::into),
		}
	}
}

fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { endpoint, source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedScheme { endpoint, url: url.into() }),
	}
}

fn join_path(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let joined =
		format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { endpoint: "token", source })
}
