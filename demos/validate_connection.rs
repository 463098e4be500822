//! Demonstrates building a gateway against mocked SP-API endpoints, validating
//! the configured credentials, and executing one throttled orders request.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use spapi_gateway::{config::GatewayConfig, pipeline::Gateway};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/o2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"Atza|demo-access\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/sts").query_param("Action", "GetCallerIdentity");
			then.status(200).body(
				"<GetCallerIdentityResponse><GetCallerIdentityResult>\
				<Arn>arn:aws:iam::123456789012:user/demo</Arn>\
				<UserId>AIDADEMO</UserId>\
				<Account>123456789012</Account>\
				</GetCallerIdentityResult></GetCallerIdentityResponse>",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/orders/v0/orders");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"payload\":{\"Orders\":[]}}");
		})
		.await;

	let config = GatewayConfig::builder(
		"demo-client",
		"demo-secret",
		"Atzr|demo-refresh",
		"AKIADEMO",
		"demo-aws-secret",
	)
	.base_url(Url::parse(&server.base_url())?)
	.token_endpoint(Url::parse(&server.url("/auth/o2/token"))?)
	.sts_endpoint(Url::parse(&server.url("/sts"))?)
	.build()?;
	let gateway = Gateway::new(config)?;
	let report = gateway.validate_connection().await;

	println!("Connection valid: {}.", report.overall_valid);
	println!("Caller account: {}.", report.credentials.account_id.as_deref().unwrap_or("-"));

	let payload = gateway
		.get("orders", "/orders/v0/orders")
		.await?;

	println!("Orders payload: {}.", serde_json::to_string(&payload)?);

	Ok(())
}
