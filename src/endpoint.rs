//! Token endpoint dispatch: form in, [`TokenGrant`] out.
//!
//! [`TokenEndpoint::post_form`] is the single outbound call every token operation makes. It
//! encodes the form, POSTs it through the injected [`TokenHttpClient`], and turns the raw
//! response into either a decoded grant or an [`Error`] that still carries everything the
//! transport or server reported. Nothing is retried.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE, HeaderValue},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenForm, TokenGrant},
	error::{ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::TokenOperation,
};

/// Content type of every token request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Maps HTTP transport failures into crate [`Error`] values.
///
/// Mappers decide where a transport failure lands in the taxonomy; they should keep the original
/// error reachable through [`StdError::source`] rather than flattening it into a string.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		operation: TokenOperation,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Mapper that works for any transport error type.
///
/// Transport errors become [`TransportError::Network`] with the original value as the source.
#[derive(Clone, Debug, Default)]
pub struct DefaultTransportErrorMapper;
impl<E> TransportErrorMapper<E> for DefaultTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		operation: TokenOperation,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<E>,
	) -> Error {
		let _ = (operation, meta);

		match err {
			HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
			other => map_common_transport_error(other),
		}
	}
}

/// Mapper for the reqwest-backed transport.
///
/// Request-builder failures are configuration problems; every other reqwest error (timeouts
/// included) is a network failure.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		operation: TokenOperation,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		let _ = (operation, meta);

		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			other => map_common_transport_error(other),
		}
	}
}

/// Borrowed view of a transport, its error mapper, and the token URL.
pub struct TokenEndpoint<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: &'a C,
	mapper: &'a M,
	url: &'a Url,
}
impl<'a, C, M> TokenEndpoint<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a view over the provided transport and mapper.
	pub fn new(http_client: &'a C, mapper: &'a M, url: &'a Url) -> Self {
		Self { http_client, mapper, url }
	}

	/// POSTs `form` to the token URL and decodes the response.
	pub async fn post_form(&self, operation: TokenOperation, form: &TokenForm) -> Result<TokenGrant> {
		let request = build_request(self.url, form)?;
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());
		let response = handle.call(request).await.map_err(|err| {
			self.mapper.map_transport_error(operation, slot.take().as_ref(), err)
		})?;

		interpret_response(response, slot.take(), OffsetDateTime::now_utc())
	}
}
impl<C, M> Debug for TokenEndpoint<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint").field("url", &self.url.as_str()).finish()
	}
}

/// Builds the form-encoded POST request for `url`.
pub fn build_request(url: &Url, form: &TokenForm) -> Result<HttpRequest> {
	Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
		.header(ACCEPT, HeaderValue::from_static("application/json"))
		.body(form.encode().into_bytes())
		.map_err(|err| ConfigError::from(err).into())
}

/// Turns a raw token endpoint response into a grant or a [`Error::Rejected`].
pub fn interpret_response(
	response: HttpResponse,
	meta: Option<ResponseMetadata>,
	received_at: OffsetDateTime,
) -> Result<TokenGrant> {
	#[derive(Default, Deserialize)]
	struct OAuthErrorBody {
		#[serde(default)]
		error: Option<String>,
		#[serde(default)]
		error_description: Option<String>,
	}

	let status = response.status();

	if !status.is_success() {
		let body = response.body();
		let oauth = serde_json::from_slice::<OAuthErrorBody>(body).unwrap_or_default();

		return Err(Error::Rejected {
			status: status.as_u16(),
			error: oauth.error,
			error_description: oauth.error_description,
			body: String::from_utf8_lossy(body).into_owned(),
			retry_after: meta.and_then(|meta| meta.retry_after),
		});
	}

	Ok(TokenGrant::from_slice(response.body(), Some(status.as_u16()), received_at)?)
}

fn map_common_transport_error<E>(err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		other => TransportError::Other { message: other.to_string() }.into(),
	}
}
