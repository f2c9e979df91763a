//! Walks through an expired-token recovery against a mock marketplace backend: three concurrent
//! requests share one reissue, then a failed reissue ends the session and clears the token file.

// std
use std::{env, sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use authed_http::{
	auth::{BearerToken, SessionState},
	client::ApiClient,
	config::ClientDescriptor,
	request::ApiRequest,
	store::{FileStore, TokenStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _stale = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer demo-expired");
			then.status(401);
		})
		.await;
	let reissue = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/reissue");
			then.status(200)
				.header("authorization", "Bearer demo-fresh")
				.delay(Duration::from_millis(200));
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer demo-fresh");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let _logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/logout");
			then.status(204);
		})
		.await;
	let descriptor = ClientDescriptor::from_json_str(&format!(
		r#"{{"base_url":"{}","excluded":["POST /api/members","POST /api/auth/login"]}}"#,
		server.base_url()
	))?;
	let path = env::temp_dir().join("authed_http_demo_storage.json");
	let store = Arc::new(FileStore::open(&path, descriptor.token_storage_key.clone())?);

	store.set(&BearerToken::new("demo-expired"))?;

	let (client, session) = ApiClient::new(descriptor, store.clone())?;
	let (commissions, carts, tags) = tokio::join!(
		client.fetch_json::<Vec<serde_json::Value>>(ApiRequest::get("/api/commissions")),
		client.fetch_json::<Vec<serde_json::Value>>(ApiRequest::get("/api/carts")),
		client.fetch_json::<Vec<serde_json::Value>>(ApiRequest::get("/api/tags")),
	);

	println!(
		"Recovered {} + {} + {} items with {} reissue call(s).",
		commissions?.len(),
		carts?.len(),
		tags?.len(),
		client.refresh_metrics.attempts(),
	);

	reissue.assert_calls_async(1).await;

	reissue.delete_async().await;
	fresh.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/reissue");
			then.status(503);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/resumes");
			then.status(401);
		})
		.await;

	if let Err(err) = client.request(ApiRequest::get("/api/resumes")).await {
		println!("Session ended: {err}");
	}

	if let SessionState::LoggedOut { notified, .. } = session.state() {
		println!("Logged out (backend notified: {notified}).");
	}

	println!("Token left in {}: {:?}.", path.display(), store.get()?);

	std::fs::remove_file(&path)?;

	Ok(())
}
