//! Token manager: authorization-code exchange, access refresh, refresh rotation, and expiry
//! predicates over a shared [`SessionHandle`].
//!
//! Every token operation follows the same shape. The form is built from the call argument (or
//! the stored value when the argument is absent or empty), the current access token is dropped
//! from the session, and only then is the returned future handed back. The clearing therefore
//! happens when the method is called, not when the request settles, and a failed request leaves
//! the session without an access token. The grant is returned to the caller untouched; merging
//! it back is done with [`Session::apply_grant`] or [`SessionHandle::apply_grant`].

// self
use crate::{
	_prelude::*,
	auth::{GrantType, SessionHandle, TokenForm, TokenGrant, session},
	config::ClientConfig,
	endpoint::{TokenEndpoint, TransportErrorMapper},
	http::TokenHttpClient,
	obs::{self, TokenOperation, TokenOutcome, TokenSpan},
};
#[cfg(feature = "reqwest")]
use crate::{endpoint::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

/// Boxed future returned by the token operations.
pub type TokenFuture<'a, T = TokenGrant> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Issues token requests on behalf of one session.
///
/// The manager owns the transport and mapper references and shares the session with the rest of
/// the client. It performs no local validation: missing credentials are sent as empty values
/// and the server's answer is what the caller sees.
pub struct TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	config: ClientConfig,
	session: SessionHandle,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		session: impl Into<SessionHandle>,
		config: ClientConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config,
			session: session.into(),
		}
	}

	/// Shared session handle.
	pub fn session(&self) -> &SessionHandle {
		&self.session
	}

	/// Endpoint configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Exchanges an authorization code for the initial token pair.
	///
	/// `auth_code` falls back to the stored code when absent or empty. The access token is
	/// cleared before this method returns.
	pub fn acquire_token(&self, auth_code: Option<&str>) -> TokenFuture<'_> {
		const OPERATION: TokenOperation = TokenOperation::AcquireToken;

		let (form, stage) = self.session.update(|state| {
			let (code, stage) = credential(auth_code, state.auth_code.as_deref());
			let mut form = TokenForm::new();

			form.append("grant_type", GrantType::AuthorizationCode.as_str())
				.append("access_type", state.effective_access_type())
				.append("client_id", stored(&state.api_key))
				.append("redirect_uri", stored(&state.redirect_uri))
				.append("code", code);
			state.clear_access_token();

			(form, stage)
		});

		self.dispatch(OPERATION, stage, form)
	}

	/// Trades a refresh token for a new access token without asking for a new refresh token.
	///
	/// `refresh_token` falls back to the stored token when absent or empty. The access token is
	/// cleared before this method returns.
	pub fn refresh_access(&self, refresh_token: Option<&str>) -> TokenFuture<'_> {
		const OPERATION: TokenOperation = TokenOperation::RefreshAccess;

		let (form, stage) = self.refresh_form(OPERATION, refresh_token);

		self.dispatch(OPERATION, stage, form)
	}

	/// Trades a refresh token for a new access token and a rotated refresh token.
	///
	/// Identical to [`TokenManager::refresh_access`] except that `access_type` is sent, which
	/// asks the server to issue a new refresh token as well.
	pub fn refresh_refresh(&self, refresh_token: Option<&str>) -> TokenFuture<'_> {
		const OPERATION: TokenOperation = TokenOperation::RefreshRefresh;

		let (form, stage) = self.refresh_form(OPERATION, refresh_token);

		self.dispatch(OPERATION, stage, form)
	}

	/// Returns `true` when the access token expiry is missing or not in the future.
	pub fn is_access_expired(&self) -> bool {
		self.session.lock().is_access_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` when the refresh token expiry is missing or not in the future.
	pub fn is_refresh_expired(&self) -> bool {
		self.session.lock().is_refresh_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` when the refresh token expiry is missing or within seven days.
	pub fn is_refresh_expiring_soon(&self) -> bool {
		self.session.lock().is_refresh_expiring_soon_at(OffsetDateTime::now_utc())
	}

	/// Builds the authorization URL for the session's application key and redirect URI.
	pub fn authorization_url(&self, state: Option<&str>) -> Result<Url> {
		let session = self.session.lock();

		Ok(self.config.authorization_url(
			session.api_key.as_deref(),
			session.redirect_uri.as_deref(),
			state,
		)?)
	}

	fn refresh_form(
		&self,
		operation: TokenOperation,
		refresh_token: Option<&str>,
	) -> (TokenForm, &'static str) {
		self.session.update(|state| {
			let (token, stage) = credential(
				refresh_token,
				state.refresh_token.as_ref().map(|token| token.expose()),
			);
			let mut form = TokenForm::new();

			form.append("grant_type", GrantType::RefreshToken.as_str());

			if operation == TokenOperation::RefreshRefresh {
				form.append("access_type", state.effective_access_type());
			}

			form.append("client_id", stored(&state.api_key)).append("refresh_token", token);
			state.clear_access_token();

			(form, stage)
		})
	}

	fn dispatch(
		&self,
		operation: TokenOperation,
		stage: &'static str,
		form: TokenForm,
	) -> TokenFuture<'_> {
		let span = TokenSpan::new(operation, stage);

		obs::record_token_outcome(operation, TokenOutcome::Attempt);

		let fut = {
			let span = span.clone();

			async move {
				let endpoint = TokenEndpoint::new(
					self.http_client.as_ref(),
					self.transport_mapper.as_ref(),
					self.config.token_url(),
				);

				match endpoint.post_form(operation, &form).await {
					Ok(grant) => {
						obs::record_token_outcome(operation, TokenOutcome::Success);

						Ok(grant)
					},
					Err(e) => {
						span.warn(&e.to_string());
						obs::record_token_outcome(operation, TokenOutcome::Failure);

						Err(e)
					},
				}
			}
		};

		Box::pin(span.instrument(fut))
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager backed by a fresh reqwest transport.
	pub fn new(session: impl Into<SessionHandle>, config: ClientConfig) -> Result<Self> {
		Ok(Self::with_http_client(
			session,
			config,
			ReqwestHttpClient::new()?,
			ReqwestTransportErrorMapper,
		))
	}
}
impl<C, M> Clone for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			config: self.config.clone(),
			session: self.session.clone(),
		}
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("token_url", &self.config.token_url().as_str())
			.field("session", &self.session)
			.finish()
	}
}

// Span stage: whether the code or refresh token came from the call or from the session.
fn credential(argument: Option<&str>, stored: Option<&str>) -> (String, &'static str) {
	match session::non_empty(argument) {
		Some(value) => (value.to_owned(), "argument_credential"),
		None => (stored.unwrap_or_default().to_owned(), "stored_credential"),
	}
}

fn stored(value: &Option<String>) -> String {
	value.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode,
	};
	// self
	use super::*;
	use crate::{
		auth::{Session, TokenSecret},
		endpoint::DefaultTransportErrorMapper,
		error::TransportError,
		http::{ResponseMetadata, ResponseMetadataSlot},
	};

	#[derive(Debug, ThisError)]
	#[error("Connection reset by fake peer.")]
	struct ResetError;

	#[derive(Clone)]
	enum Reply {
		Status(u16, &'static str),
		Reset,
	}

	#[derive(Clone)]
	struct FakeHttpClient {
		reply: Reply,
		bodies: Arc<Mutex<Vec<String>>>,
	}
	impl FakeHttpClient {
		fn replying(status: u16, body: &'static str) -> Self {
			Self { reply: Reply::Status(status, body), bodies: Default::default() }
		}

		fn resetting() -> Self {
			Self { reply: Reply::Reset, bodies: Default::default() }
		}

		fn last_form(&self) -> Vec<(String, String)> {
			let body = self.bodies.lock().last().cloned().expect("A request should be recorded.");

			url::form_urlencoded::parse(body.as_bytes()).into_owned().collect()
		}
	}
	impl TokenHttpClient for FakeHttpClient {
		type Handle = FakeHttpHandle;
		type TransportError = ResetError;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			FakeHttpHandle { client: self.clone(), slot }
		}
	}

	struct FakeHttpHandle {
		client: FakeHttpClient,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for FakeHttpHandle {
		type Error = HttpClientError<ResetError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			Box::pin(async move {
				self.client.bodies.lock().push(String::from_utf8_lossy(request.body()).into_owned());

				match self.client.reply {
					Reply::Status(status, body) => {
						let mut response = HttpResponse::new(body.as_bytes().to_vec());

						*response.status_mut() = StatusCode::from_u16(status)
							.expect("Fixture status code should be valid.");
						self.slot.store(ResponseMetadata { status: Some(status), retry_after: None });

						Ok(response)
					},
					Reply::Reset => Err(HttpClientError::Reqwest(Box::new(ResetError))),
				}
			})
		}
	}

	type FakeManager = TokenManager<FakeHttpClient, DefaultTransportErrorMapper>;

	const GRANT: &str = r#"{"access_token":"access-new","refresh_token":"refresh-new","expires_in":1800,"refresh_token_expires_in":7776000}"#;

	fn manager(client: FakeHttpClient) -> FakeManager {
		let mut session = Session::new("APP@AMER.OAUTHAP", "https://127.0.0.1")
			.with_auth_code("stored-code")
			.with_refresh_token("stored-refresh");

		session.access_token = Some(TokenSecret::from("access-old"));

		let config = ClientConfig::builder().build().expect("Default endpoints should be valid.");

		TokenManager::with_http_client(session, config, client, DefaultTransportErrorMapper)
	}

	#[tokio::test]
	async fn acquire_token_clears_access_token_before_awaiting() {
		let client = FakeHttpClient::replying(200, GRANT);
		let manager = manager(client.clone());
		let pending = manager.acquire_token(Some("code123"));

		assert!(
			manager.session().snapshot().access_token.is_none(),
			"Access token must be cleared as soon as the operation is invoked."
		);
		assert!(client.bodies.lock().is_empty(), "No request is sent until the future is polled.");

		let grant = pending.await.expect("Authorization code exchange should succeed.");

		assert_eq!(grant.access_token.expose(), "access-new");
		assert!(
			manager.session().snapshot().access_token.is_none(),
			"The grant is returned, not merged."
		);
		assert_eq!(client.last_form(), [
			("grant_type".to_owned(), "authorization_code".to_owned()),
			("access_type".to_owned(), "offline".to_owned()),
			("client_id".to_owned(), "APP@AMER.OAUTHAP".to_owned()),
			("redirect_uri".to_owned(), "https://127.0.0.1".to_owned()),
			("code".to_owned(), "code123".to_owned()),
		]);
	}

	#[tokio::test]
	async fn refresh_operations_clear_access_token_before_awaiting() {
		for operation in [TokenOperation::RefreshAccess, TokenOperation::RefreshRefresh] {
			let client = FakeHttpClient::replying(200, GRANT);
			let manager = manager(client.clone());
			let pending = match operation {
				TokenOperation::RefreshAccess => manager.refresh_access(None),
				_ => manager.refresh_refresh(None),
			};

			assert!(
				manager.session().snapshot().access_token.is_none(),
				"{operation} must clear the access token as soon as it is invoked."
			);
			assert!(
				client.bodies.lock().is_empty(),
				"{operation} must not send a request until the future is polled."
			);

			pending.await.expect("Refresh should succeed.");

			assert_eq!(client.bodies.lock().len(), 1);
		}
	}

	#[test]
	fn credential_source_prefers_non_empty_argument() {
		assert_eq!(credential(Some("arg"), Some("kept")), ("arg".to_owned(), "argument_credential"));
		assert_eq!(credential(Some(""), Some("kept")), ("kept".to_owned(), "stored_credential"));
		assert_eq!(credential(None, None), (String::new(), "stored_credential"));
	}

	#[tokio::test]
	async fn acquire_token_falls_back_to_stored_code() {
		let client = FakeHttpClient::replying(200, GRANT);
		let manager = manager(client.clone());

		manager.acquire_token(None).await.expect("Exchange with stored code should succeed.");

		assert!(client.last_form().contains(&("code".to_owned(), "stored-code".to_owned())));

		manager.acquire_token(Some("")).await.expect("Empty code should fall back.");

		assert!(client.last_form().contains(&("code".to_owned(), "stored-code".to_owned())));
	}

	#[tokio::test]
	async fn refresh_access_omits_access_type() {
		let client = FakeHttpClient::replying(200, GRANT);
		let manager = manager(client.clone());

		manager.refresh_access(None).await.expect("Access refresh should succeed.");

		assert_eq!(client.last_form(), [
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("client_id".to_owned(), "APP@AMER.OAUTHAP".to_owned()),
			("refresh_token".to_owned(), "stored-refresh".to_owned()),
		]);
	}

	#[tokio::test]
	async fn refresh_refresh_requests_offline_access() {
		let client = FakeHttpClient::replying(200, GRANT);
		let manager = manager(client.clone());

		manager.session().update(|session| session.access_type = Some("online".into()));
		manager.refresh_refresh(Some("explicit-refresh")).await.expect("Rotation should succeed.");

		assert_eq!(client.last_form(), [
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("access_type".to_owned(), "online".to_owned()),
			("client_id".to_owned(), "APP@AMER.OAUTHAP".to_owned()),
			("refresh_token".to_owned(), "explicit-refresh".to_owned()),
		]);

		manager.session().update(|session| session.access_type = None);
		manager.refresh_refresh(None).await.expect("Rotation should succeed.");

		assert!(client.last_form().contains(&("access_type".to_owned(), "offline".to_owned())));
	}

	#[tokio::test]
	async fn missing_credentials_are_sent_empty() {
		let client = FakeHttpClient::replying(200, GRANT);
		let config = ClientConfig::builder().build().expect("Default endpoints should be valid.");
		let manager: FakeManager = TokenManager::with_http_client(
			Session::default(),
			config,
			client.clone(),
			DefaultTransportErrorMapper,
		);

		manager.refresh_access(None).await.expect("Server decides on empty values.");

		assert_eq!(client.last_form(), [
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("client_id".to_owned(), String::new()),
			("refresh_token".to_owned(), String::new()),
		]);
	}

	#[tokio::test]
	async fn rejections_propagate_and_still_clear_access_token() {
		let manager = manager(FakeHttpClient::replying(400, r#"{"error":"invalid_grant"}"#));
		let err = manager
			.refresh_access(None)
			.await
			.expect_err("HTTP 400 should propagate to the caller.");

		assert_eq!(err.status(), Some(400));
		assert!(matches!(err, Error::Rejected { ref error, .. } if error.as_deref() == Some("invalid_grant")));
		assert!(manager.session().snapshot().access_token.is_none());
		assert_eq!(
			manager.session().snapshot().refresh_token.as_ref().map(TokenSecret::expose),
			Some("stored-refresh"),
		);
	}

	#[tokio::test]
	async fn transport_errors_keep_original_source() {
		let manager = manager(FakeHttpClient::resetting());
		let err = manager
			.refresh_refresh(None)
			.await
			.expect_err("Transport failure should propagate to the caller.");
		let source = StdError::source(&err).expect("Transport error should expose its source.");

		assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
		assert!(source.downcast_ref::<ResetError>().is_some());
	}

	#[test]
	fn predicates_follow_session_expirations() {
		let manager = manager(FakeHttpClient::replying(200, GRANT));

		assert!(manager.is_access_expired());
		assert!(manager.is_refresh_expired());
		assert!(manager.is_refresh_expiring_soon());

		let now = OffsetDateTime::now_utc();

		manager.session().update(|session| {
			session.access_token_expires_at = Some(now + Duration::minutes(30));
			session.refresh_token_expires_at = Some(now + Duration::days(30));
		});

		assert!(!manager.is_access_expired());
		assert!(!manager.is_refresh_expired());
		assert!(!manager.is_refresh_expiring_soon());
	}

	#[test]
	fn authorization_url_uses_session_credentials() {
		let manager = manager(FakeHttpClient::replying(200, GRANT));
		let url = manager.authorization_url(Some("xyz")).expect("Authorization URL should build.");
		let query = url.query().expect("Authorization URL should carry a query.");

		assert!(query.contains("client_id=APP%40AMER.OAUTHAP"));
		assert!(query.contains("state=xyz"));
		assert!(!format!("{manager:?}").contains("stored-refresh"));
	}
}
