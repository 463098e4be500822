#![cfg(feature = "reqwest")]

// crates.io
use http::Method;
use httpmock::prelude::*;
use serde_json::json;
// self
use spapi_gateway::{
	_preludet::*,
	config::GatewayConfig,
	pipeline::{ApiPayload, Gateway},
};

const TOKEN_PATH: &str = "/auth/o2/token";
const TOKEN_BODY: &str =
	"{\"access_token\":\"Atza|token-pipe\",\"token_type\":\"bearer\",\"expires_in\":3600}";
const CALLER_IDENTITY_BODY: &str = "\
<GetCallerIdentityResponse>\
<GetCallerIdentityResult>\
<Arn>arn:aws:iam::123456789012:user/gateway</Arn>\
<UserId>AIDATESTUSER</UserId>\
<Account>123456789012</Account>\
</GetCallerIdentityResult>\
</GetCallerIdentityResponse>";

fn build_gateway(server: &MockServer) -> Gateway {
	let config = GatewayConfig::builder(
		"client-pipe",
		"secret-pipe",
		"Atzr|refresh-pipe",
		"AKIAPIPE",
		"aws-secret-pipe",
	)
	.base_url(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
	.token_endpoint(Url::parse(&server.url(TOKEN_PATH)).expect("Mock token endpoint should parse."))
	.sts_endpoint(Url::parse(&server.url("/sts")).expect("Mock STS endpoint should parse."))
	.build()
	.expect("Gateway configuration fixture should build successfully.");

	build_test_gateway(config)
}

async fn mock_token_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await
}

#[tokio::test]
async fn get_orders_parses_the_json_payload() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);

	mock_token_endpoint(&server).await;

	let orders = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/orders/v0/orders")
				.query_param("MarketplaceIds", "A1RKKUPIHCS9HS")
				.header("x-amz-access-token", "Atza|token-pipe")
				.header_exists("authorization")
				.header_exists("x-amz-date");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"payload\":{\"Orders\":[]}}");
		})
		.await;
	let request = gateway
		.describe(Method::GET, "orders", "/orders/v0/orders")
		.expect("Request description should build.")
		.param("MarketplaceIds", "A1RKKUPIHCS9HS");
	let payload = gateway.execute(request).await.expect("The orders request should succeed.");

	orders.assert_async().await;

	assert_eq!(payload.json(), Some(&json!({"payload": {"Orders": []}})));
}

#[tokio::test]
async fn no_content_responses_normalize_to_the_empty_marker() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);

	mock_token_endpoint(&server).await;
	server
		.mock_async(|when, then| {
			when.method(DELETE).path("/listings/2021-08-01/items/SELLER/SKU-1");
			then.status(204);
		})
		.await;

	let payload = gateway
		.delete("listings", "/listings/2021-08-01/items/SELLER/SKU-1")
		.await
		.expect("The delete request should succeed.");

	assert_eq!(payload, ApiPayload::NoContent);
}

#[tokio::test]
async fn non_json_bodies_pass_through_as_raw_text() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);

	mock_token_endpoint(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/reports/2021-06-30/documents/DOC-1");
			then.status(200)
				.header("content-type", "text/tab-separated-values")
				.body("sku\tquantity\nABC-1\t4");
		})
		.await;

	let payload = gateway
		.get("reports", "/reports/2021-06-30/documents/DOC-1")
		.await
		.expect("The report document request should succeed.");

	assert_eq!(payload, ApiPayload::Raw("sku\tquantity\nABC-1\t4".into()));
}

#[tokio::test]
async fn forbidden_responses_fail_after_a_single_attempt() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);

	mock_token_endpoint(&server).await;

	let forbidden = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders/v0/orders");
			then.status(403)
				.header("content-type", "application/json")
				.body("{\"errors\":[{\"code\":\"Unauthorized\",\"message\":\"Access denied\"}]}");
		})
		.await;
	let err = gateway
		.get("orders", "/orders/v0/orders")
		.await
		.expect_err("A 403 must surface as an API error.");

	forbidden.assert_calls_async(1).await;

	assert_eq!(err.status(), Some(403));
	assert_eq!(err.guidance(), "Access forbidden. Check your application permissions and roles.");
}

#[tokio::test]
async fn restricted_tokens_are_sent_verbatim_and_bypass_lwa() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);
	let token = mock_token_endpoint(&server).await;
	let pii = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/orders/v0/orders/902-3159896-1390916/address")
				.header("x-amz-access-token", "Atza|rdt-restricted");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"payload\":{\"ShippingAddress\":{\"Name\":\"Jane Doe\"}}}");
		})
		.await;
	let request = gateway
		.describe(Method::GET, "orders", "/orders/v0/orders/902-3159896-1390916/address")
		.expect("Request description should build.")
		.restricted_token("Atza|rdt-restricted");
	let payload = gateway.execute(request).await.expect("The restricted request should succeed.");

	pii.assert_async().await;
	token.assert_calls_async(0).await;

	assert!(payload.json().is_some());
}

#[tokio::test]
async fn validate_connection_aggregates_component_reports() {
	let server = MockServer::start_async().await;
	let gateway = build_gateway(&server);

	mock_token_endpoint(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/sts").query_param("Action", "GetCallerIdentity");
			then.status(200).body(CALLER_IDENTITY_BODY);
		})
		.await;

	let report = gateway.validate_connection().await;

	assert!(report.overall_valid);
	assert!(report.lwa.valid);
	assert_eq!(report.credentials.account_id.as_deref(), Some("123456789012"));

	let orders = report
		.rate_limits
		.iter()
		.find(|(group, _)| group.as_ref() == "orders")
		.map(|(_, status)| status)
		.expect("The default quota table should include the orders group.");

	assert_eq!(orders.max_tokens, 20.);
	assert_eq!(orders.current_tokens, 20.);
}
