//! Walks a session through the authorization-code exchange and both refresh flavors against a
//! local mock token endpoint, using the default reqwest transport.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use brokerage_oauth::{auth::Session, config::ClientConfig, manager::TokenManager};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"token_type\":\"Bearer\",\"expires_in\":1800,\"refresh_token_expires_in\":7776000}",
			);
		})
		.await;
	let config = ClientConfig::builder().base_url(server.url("/v1")).build()?;
	let session = Session::new("DEMO@AMER.OAUTHAP", "https://127.0.0.1");
	let manager = TokenManager::new(session, config)?;

	println!("Visit {} to authorize the application.", manager.authorization_url(Some("demo"))?);

	let grant = manager.acquire_token(Some("demo-code")).await?;

	manager.session().apply_grant(&grant);

	println!(
		"Access expired: {}, refresh expiring soon: {}.",
		manager.is_access_expired(),
		manager.is_refresh_expiring_soon()
	);

	let refreshed = manager.refresh_access(None).await?;

	manager.session().apply_grant(&refreshed);

	let rotated = manager.refresh_refresh(None).await?;

	manager.session().apply_grant(&rotated);
	token_mock.assert_calls_async(3).await;

	println!("Session after rotation: {:?}.", manager.session());

	Ok(())
}
