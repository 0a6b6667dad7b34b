mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use kube_oidc_login::{
	app::{self, Dependencies},
	authentication::Input,
	clock::SystemClock,
	credential_plugin::GetTokenInput,
	error::{Error, ValidationError},
	flows::GrantOptionSet,
	oidc::{
		ClientCredentialsInput, DevicePoll, OidcClient, OidcConnector, Provider, ReqwestConnector,
	},
	store::{CacheConfig, Repository, Storage},
	tls::TlsClientConfig,
};

const BASIC_AUTH: &str = "Basic a3ViZXJuZXRlczpzM2NyZXQ=";

async fn mock_discovery(server: &MockServer) -> httpmock::Mock<'_> {
	let issuer = server.base_url();

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"issuer": issuer,
				"authorization_endpoint": server.url("/authorize"),
				"token_endpoint": server.url("/token"),
				"jwks_uri": server.url("/jwks"),
				"device_authorization_endpoint": server.url("/device"),
				"code_challenge_methods_supported": ["plain", "S256"],
			}));
		})
		.await
}

async fn mock_jwks(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks");
			then.status(200)
				.header("content-type", "application/json")
				.body(include_str!("fixtures/jwks.json"));
		})
		.await
}

fn confidential_provider(server: &MockServer) -> Provider {
	Provider { client_secret: Some("s3cret".into()), ..provider(&server.base_url()) }
}

async fn connect(provider: &Provider) -> Box<dyn OidcClient> {
	ReqwestConnector
		.connect(provider, &TlsClientConfig::default())
		.await
		.expect("Discovery should succeed.")
}

#[tokio::test]
async fn discovery_negotiates_s256() {
	let server = MockServer::start_async().await;
	let discovery = mock_discovery(&server).await;
	let client = connect(&provider(&server.base_url())).await;

	discovery.assert_calls_async(1).await;

	assert_eq!(client.metadata().token_endpoint.as_str(), server.url("/token"));
	assert_eq!(client.supported_pkce_method(), kube_oidc_login::pkce::Method::S256);
}

#[tokio::test]
async fn discovery_rejects_a_foreign_issuer() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"issuer": "https://elsewhere.example.com",
				"authorization_endpoint": "https://elsewhere.example.com/authorize",
				"token_endpoint": "https://elsewhere.example.com/token",
				"jwks_uri": "https://elsewhere.example.com/jwks",
			}));
		})
		.await;

	let err = ReqwestConnector
		.connect(&provider(&server.base_url()), &TlsClientConfig::default())
		.await
		.err()
		.expect("Issuer mismatch must fail.");

	assert!(matches!(err, Error::Discovery { .. }));
	assert!(err.to_string().contains("https://elsewhere.example.com"));
}

#[tokio::test]
async fn discovery_failure_is_reported_with_the_issuer() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(404).body("not here");
		})
		.await;

	let err = ReqwestConnector
		.connect(&provider(&server.base_url()), &TlsClientConfig::default())
		.await
		.err()
		.expect("Missing discovery document must fail.");

	assert!(matches!(err, Error::Discovery { ref issuer, .. } if *issuer == server.base_url()));
}

#[tokio::test]
async fn client_credentials_use_basic_auth_and_fall_back_to_the_access_token() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("authorization", BASIC_AUTH)
				.form_urlencoded_tuple("grant_type", "client_credentials")
				.form_urlencoded_tuple("audience", "api://cluster");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"machine-token\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let client = connect(&confidential_provider(&server)).await;
	let input = ClientCredentialsInput {
		scopes: Vec::new(),
		endpoint_params: vec![("audience".into(), "api://cluster".into())],
	};
	let token_set =
		client.exchange_client_credentials(&input).await.expect("Exchange should succeed.");

	token.assert_calls_async(1).await;

	assert_eq!(token_set.access_token.expose(), "machine-token");
	assert_eq!(token_set.id_token.expose(), "machine-token");
	assert!(token_set.refresh_token.is_none());
}

#[tokio::test]
async fn refresh_keeps_the_previous_refresh_token_when_not_rotated() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-old");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-new",
				"token_type": "bearer",
				"id_token": "id-new",
			}));
		})
		.await;
	let client = connect(&confidential_provider(&server)).await;
	let token_set = client.refresh("refresh-old").await.expect("Refresh should succeed.");

	token.assert_calls_async(1).await;

	assert_eq!(token_set.id_token.expose(), "id-new");
	assert_eq!(
		token_set.refresh_token.as_ref().map(|token| token.expose()),
		Some("refresh-old")
	);
}

#[tokio::test]
async fn rejected_password_maps_to_invalid_grant() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("grant_type", "password");
			then.status(400).header("content-type", "application/json").json_body(json!({
				"error": "invalid_grant",
				"error_description": "Invalid user credentials",
			}));
		})
		.await;

	let client = connect(&confidential_provider(&server)).await;
	let err = client.exchange_password("alice", "wrong").await.expect_err("Grant must fail.");

	assert!(matches!(
		err,
		Error::InvalidGrant { ref reason } if reason.contains("Invalid user credentials")
	));
}

#[tokio::test]
async fn password_response_without_id_token_is_rejected() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at\",\"token_type\":\"bearer\"}");
		})
		.await;

	let client = connect(&confidential_provider(&server)).await;
	let err = client.exchange_password("alice", "pw").await.expect_err("Missing ID token.");

	assert!(matches!(err, Error::Validation(ValidationError::MissingIdToken { grant: "password" })));
}

#[tokio::test]
async fn device_polling_maps_pending_and_slow_down() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;
	let device = server
		.mock_async(|when, then| {
			when.method(POST).path("/device").header("authorization", BASIC_AUTH);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"device_code": "device-code",
				"user_code": "ABCD-EFGH",
				"verification_uri": server.url("/activate"),
				"expires_in": 600,
				"interval": 2,
			}));
		})
		.await;

	let rejections = [("pending-code", "authorization_pending"), ("slow-code", "slow_down")];

	for (device_code, error) in rejections {
		server
			.mock_async(|when, then| {
				when.method(POST).path("/token").form_urlencoded_tuple("device_code", device_code);
				then.status(400)
					.header("content-type", "application/json")
					.json_body(json!({ "error": error }));
			})
			.await;
	}

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("device_code", "done-code");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "at",
				"token_type": "bearer",
				"id_token": "id",
			}));
		})
		.await;

	let client = connect(&confidential_provider(&server)).await;
	let authorization =
		client.request_device_authorization().await.expect("Device authorization should start.");

	device.assert_calls_async(1).await;

	assert_eq!(authorization.user_code, "ABCD-EFGH");
	assert_eq!(authorization.interval, Some(2));
	assert_eq!(
		client.poll_device_token("pending-code").await.expect("Pending poll."),
		DevicePoll::Pending
	);
	assert_eq!(
		client.poll_device_token("slow-code").await.expect("Slow down poll."),
		DevicePoll::SlowDown
	);
	assert!(matches!(
		client.poll_device_token("done-code").await.expect("Final poll."),
		DevicePoll::Complete(set) if set.id_token.expose() == "id"
	));
}

#[tokio::test]
async fn signing_keys_are_fetched_once_per_client() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;
	let jwks = mock_jwks(&server).await;
	let client = connect(&provider(&server.base_url())).await;
	let first = client.key_set().await.expect("JWKS should load.");
	let second = client.key_set().await.expect("JWKS should be reused.");

	jwks.assert_calls_async(1).await;

	assert_eq!(first.keys.len(), second.keys.len());
	assert!(first.find("test-key").is_some());
}

#[tokio::test]
async fn get_token_round_trips_through_the_disk_cache() {
	let server = MockServer::start_async().await;
	let issuer = server.base_url();
	let _discovery = mock_discovery(&server).await;
	let _jwks = mock_jwks(&server).await;
	let exp = OffsetDateTime::now_utc() + Duration::hours(1);
	let id_token = id_token(&issuer, CLIENT_ID, exp, None);
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "client_credentials");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "at",
				"token_type": "bearer",
				"id_token": id_token,
			}));
		})
		.await;
	let directory = tempfile::tempdir().expect("Temporary directory should be created.");
	let app = app::assemble(Dependencies {
		connector: Arc::new(ReqwestConnector),
		repository: Arc::new(Repository::default()),
		interaction: quiet_interaction(),
		clock: Arc::new(SystemClock),
	});
	let input = || GetTokenInput {
		authentication: Input {
			provider: confidential_provider(&server),
			grant_options: GrantOptionSet {
				client_credentials: Some(ClientCredentialsInput::default()),
				..Default::default()
			},
			cache: Some(CacheConfig {
				directory: directory.path().to_path_buf(),
				storage: Storage::Disk,
			}),
			..Default::default()
		},
		exec_info: None,
	};

	for _ in 0..2 {
		let mut out = Vec::new();

		app.get_token.run(&cancel(), input(), &mut out).await.expect("get-token should succeed.");

		let credential: serde_json::Value =
			serde_json::from_slice(&out).expect("Output should be JSON.");

		assert_eq!(credential["apiVersion"], "client.authentication.k8s.io/v1beta1");
		assert_eq!(credential["status"]["token"], id_token.as_str());
	}

	token.assert_calls_async(1).await;

	app.clean.run(directory.path()).await.expect("Clean should succeed.");

	assert!(!directory.path().exists());
}
