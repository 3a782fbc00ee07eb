//! Demonstrates plugging a non-reqwest transport into the token manager.
//!
//! 1. Implement [`TokenHttpClient`] so the transport records [`ResponseMetadata`] via the provided
//!    [`ResponseMetadataSlot`].
//! 2. Pair it with a [`TransportErrorMapper`]; [`DefaultTransportErrorMapper`] works for any
//!    transport error type.
//! 3. Pass both to [`TokenManager::with_http_client`].

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
};
// crates.io
use color_eyre::Result;
// self
use brokerage_oauth::{
	auth::Session,
	config::ClientConfig,
	endpoint::{DefaultTransportErrorMapper, TransportErrorMapper},
	error::Error,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	manager::TokenManager,
	oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode},
};

#[derive(Debug)]
struct OfflineError {
	host: String,
}
impl Display for OfflineError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Host {} is offline.", self.host)
	}
}
impl StdError for OfflineError {}

/// Transport that answers every token request locally.
#[derive(Clone, Copy)]
enum CannedHttpClient {
	Grant,
	Offline,
}
impl TokenHttpClient for CannedHttpClient {
	type Handle = CannedHandle;
	type TransportError = OfflineError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		CannedHandle { mode: *self, slot }
	}
}

struct CannedHandle {
	mode: CannedHttpClient,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for CannedHandle {
	type Error = HttpClientError<OfflineError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let mode = self.mode;
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let host = request.uri().host().unwrap_or_default().to_owned();

			match mode {
				CannedHttpClient::Offline =>
					Err(HttpClientError::Reqwest(Box::new(OfflineError { host }))),
				CannedHttpClient::Grant => {
					let mut response = HttpResponse::new(
						br#"{"access_token":"canned-access","expires_in":1800}"#.to_vec(),
					);

					*response.status_mut() = StatusCode::OK;
					slot.store(ResponseMetadata { status: Some(200), retry_after: None });

					Ok(response)
				},
			}
		})
	}
}

fn manager<M>(client: CannedHttpClient, mapper: M) -> Result<TokenManager<CannedHttpClient, M>>
where
	M: TransportErrorMapper<OfflineError>,
{
	let session = Session::new("DEMO@AMER.OAUTHAP", "https://127.0.0.1")
		.with_refresh_token("demo-refresh");

	Ok(TokenManager::with_http_client(session, ClientConfig::builder().build()?, client, mapper))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let online = manager(CannedHttpClient::Grant, DefaultTransportErrorMapper)?;
	let grant = online.refresh_access(None).await?;

	println!("Access token issued by the canned transport: {}.", grant.access_token.expose());

	let offline = manager(CannedHttpClient::Offline, DefaultTransportErrorMapper)?;

	match offline.refresh_access(None).await {
		Err(Error::Transport(err)) => {
			let cause = StdError::source(&err)
				.and_then(|source| source.downcast_ref::<OfflineError>())
				.map(ToString::to_string)
				.unwrap_or_default();

			println!("Transport failure surfaced unchanged: {cause}");
		},
		other => println!("Unexpected outcome: {other:?}."),
	}

	Ok(())
}
