//! Gateway configuration: credentials, endpoints, and per-group rate-limit quotas.

// std
use std::{env, time::Duration as StdDuration};
// self
use crate::{_prelude::*, error::ConfigError, limiter::EndpointGroup};

/// Default LWA token-issuing endpoint.
pub const LWA_TOKEN_ENDPOINT: &str = "https://api.amazon.com/auth/o2/token";

const DEFAULT_MARKETPLACE: &str = "A1RKKUPIHCS9HS";
const DEFAULT_RATE_LIMIT_BUFFER: StdDuration = StdDuration::from_millis(100);
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Requests-per-second rate and burst capacity for one endpoint group.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct RateLimitQuota {
	/// Refill rate in tokens per second.
	pub rate: f64,
	/// Burst capacity.
	pub burst: u32,
}

/// SP-API regional endpoint selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ApiRegion {
	/// North America (`sellingpartnerapi-na`).
	NorthAmerica,
	/// Europe (`sellingpartnerapi-eu`).
	#[default]
	Europe,
	/// Far East (`sellingpartnerapi-fe`).
	FarEast,
}
impl ApiRegion {
	/// Returns the lowercase endpoint infix (`na`, `eu`, `fe`).
	pub const fn as_str(self) -> &'static str {
		match self {
			ApiRegion::NorthAmerica => "na",
			ApiRegion::Europe => "eu",
			ApiRegion::FarEast => "fe",
		}
	}

	/// Production or sandbox base URL for the region.
	pub fn base_url(self, sandbox: bool) -> Url {
		let rendered = if sandbox {
			format!("https://sandbox.sellingpartnerapi-{}.amazon.com", self.as_str())
		} else {
			format!("https://sellingpartnerapi-{}.amazon.com", self.as_str())
		};

		Url::parse(&rendered).expect("Region base URL template must parse.")
	}
}
impl FromStr for ApiRegion {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"NA" => Ok(ApiRegion::NorthAmerica),
			"EU" => Ok(ApiRegion::Europe),
			"FE" => Ok(ApiRegion::FarEast),
			_ => Err(ConfigError::InvalidRegion { value: s.to_owned() }),
		}
	}
}
impl Display for ApiRegion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			ApiRegion::NorthAmerica => "NA",
			ApiRegion::Europe => "EU",
			ApiRegion::FarEast => "FE",
		})
	}
}

/// Published SP-API quotas for the endpoint groups the gateway fronts.
pub fn default_rate_limits() -> HashMap<EndpointGroup, RateLimitQuota> {
	[
		("orders", RateLimitQuota { rate: 0.0167, burst: 20 }),
		("inventory", RateLimitQuota { rate: 2., burst: 30 }),
		("reports", RateLimitQuota { rate: 0.0222, burst: 10 }),
		("feeds", RateLimitQuota { rate: 0.0222, burst: 10 }),
		("catalog", RateLimitQuota { rate: 5., burst: 15 }),
		("listings", RateLimitQuota { rate: 5., burst: 10 }),
		("finances", RateLimitQuota { rate: 0.5, burst: 30 }),
		("tokens", RateLimitQuota { rate: 0.0167, burst: 15 }),
	]
	.into_iter()
	.map(|(group, quota)| {
		(EndpointGroup::new(group).expect("Built-in group names must be valid."), quota)
	})
	.collect()
}

/// Validated gateway configuration, constructed via [`GatewayConfig::builder`] or
/// [`GatewayConfig::from_env`].
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// LWA client identifier.
	pub client_id: String,
	/// LWA client secret.
	pub client_secret: String,
	/// Long-lived LWA refresh token.
	pub refresh_token: String,
	/// AWS access key identifier.
	pub aws_access_key_id: String,
	/// AWS secret access key.
	pub aws_secret_access_key: String,
	/// Optional AWS session token for temporary long-lived credentials.
	pub aws_session_token: Option<String>,
	/// AWS region used for signing and STS calls.
	pub aws_region: String,
	/// Optional IAM role to assume before signing.
	pub aws_role_arn: Option<String>,
	/// SP-API regional endpoint selector.
	pub region: ApiRegion,
	/// Base URL all request paths are joined against.
	pub base_url: Url,
	/// LWA token-issuing endpoint.
	pub token_endpoint: Url,
	/// STS endpoint override; defaults to the regional STS endpoint when unset.
	pub sts_endpoint: Option<Url>,
	/// Marketplace identifiers forwarded by domain callers.
	pub marketplace_ids: Vec<String>,
	/// Whether requests target the sandbox environment.
	pub sandbox: bool,
	/// Per-group rate-limit quotas.
	pub rate_limits: HashMap<EndpointGroup, RateLimitQuota>,
	/// Extra wait added on top of the computed token deficit.
	pub rate_limit_buffer: StdDuration,
	/// Retry bound; total attempts are `retry_attempts + 1`.
	pub retry_attempts: u32,
	/// Fixed per-request socket timeout.
	pub timeout: StdDuration,
}
impl GatewayConfig {
	/// Starts a builder with the required credential fields.
	#[allow(clippy::too_many_arguments)]
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		refresh_token: impl Into<String>,
		aws_access_key_id: impl Into<String>,
		aws_secret_access_key: impl Into<String>,
	) -> GatewayConfigBuilder {
		GatewayConfigBuilder {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			refresh_token: refresh_token.into(),
			aws_access_key_id: aws_access_key_id.into(),
			aws_secret_access_key: aws_secret_access_key.into(),
			aws_session_token: None,
			aws_region: "eu-west-1".into(),
			aws_role_arn: None,
			region: ApiRegion::default(),
			base_url: None,
			token_endpoint: None,
			sts_endpoint: None,
			marketplace_ids: vec![DEFAULT_MARKETPLACE.into()],
			sandbox: false,
			rate_limits: default_rate_limits(),
			rate_limit_buffer: DEFAULT_RATE_LIMIT_BUFFER,
			retry_attempts: DEFAULT_RETRY_ATTEMPTS,
			timeout: DEFAULT_TIMEOUT,
		}
	}

	/// Loads configuration from the `AMAZON_SP_*` and `AWS_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Regional STS endpoint, honoring the configured override.
	pub fn sts_endpoint(&self) -> Url {
		self.sts_endpoint.clone().unwrap_or_else(|| {
			Url::parse(&format!("https://sts.{}.amazonaws.com", self.aws_region))
				.expect("Regional STS endpoint template must parse.")
		})
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut builder = Self::builder(
			lookup("AMAZON_SP_CLIENT_ID").unwrap_or_default(),
			lookup("AMAZON_SP_CLIENT_SECRET").unwrap_or_default(),
			lookup("AMAZON_SP_REFRESH_TOKEN").unwrap_or_default(),
			lookup("AWS_ACCESS_KEY_ID").unwrap_or_default(),
			lookup("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
		);

		if let Some(token) = lookup("AWS_SESSION_TOKEN") {
			builder = builder.aws_session_token(token);
		}
		if let Some(region) = lookup("AWS_REGION") {
			builder = builder.aws_region(region);
		}
		if let Some(role) = lookup("AWS_ROLE_ARN") {
			builder = builder.aws_role_arn(role);
		}
		if let Some(region) = lookup("AMAZON_SP_REGION") {
			builder = builder.region(region.parse()?);
		}
		if let Some(base_url) = lookup("AMAZON_SP_BASE_URL") {
			builder = builder.base_url(
				Url::parse(&base_url)
					.map_err(|source| ConfigError::InvalidUrl { field: "base_url", source })?,
			);
		}
		if let Some(ids) = lookup("AMAZON_SP_MARKETPLACE_IDS") {
			builder = builder.marketplace_ids(
				ids.split(',').map(str::trim).filter(|id| !id.is_empty()).map(String::from),
			);
		}
		if let Some(sandbox) = lookup("AMAZON_SP_SANDBOX") {
			builder = builder.sandbox(sandbox.eq_ignore_ascii_case("true"));
		}
		if let Some(buffer) = lookup("AMAZON_SP_RATE_LIMIT_BUFFER") {
			let secs = buffer
				.parse::<f64>()
				.map_err(|_| ConfigError::InvalidNumber { field: "rate_limit_buffer" })?;

			builder = builder.rate_limit_buffer(StdDuration::from_secs_f64(secs));
		}
		if let Some(attempts) = lookup("AMAZON_SP_RETRY_ATTEMPTS") {
			builder = builder.retry_attempts(
				attempts
					.parse()
					.map_err(|_| ConfigError::InvalidNumber { field: "retry_attempts" })?,
			);
		}
		if let Some(timeout) = lookup("AMAZON_SP_TIMEOUT") {
			let secs = timeout
				.parse::<u64>()
				.map_err(|_| ConfigError::InvalidNumber { field: "timeout" })?;

			builder = builder.timeout(StdDuration::from_secs(secs));
		}

		builder.build()
	}
}

/// Builder for [`GatewayConfig`]; validates required fields on [`build`](Self::build).
#[derive(Clone, Debug)]
pub struct GatewayConfigBuilder {
	client_id: String,
	client_secret: String,
	refresh_token: String,
	aws_access_key_id: String,
	aws_secret_access_key: String,
	aws_session_token: Option<String>,
	aws_region: String,
	aws_role_arn: Option<String>,
	region: ApiRegion,
	base_url: Option<Url>,
	token_endpoint: Option<Url>,
	sts_endpoint: Option<Url>,
	marketplace_ids: Vec<String>,
	sandbox: bool,
	rate_limits: HashMap<EndpointGroup, RateLimitQuota>,
	rate_limit_buffer: StdDuration,
	retry_attempts: u32,
	timeout: StdDuration,
}
impl GatewayConfigBuilder {
	/// Sets the AWS session token accompanying the long-lived credentials.
	pub fn aws_session_token(mut self, token: impl Into<String>) -> Self {
		self.aws_session_token = Some(token.into());

		self
	}

	/// Sets the AWS signing region.
	pub fn aws_region(mut self, region: impl Into<String>) -> Self {
		self.aws_region = region.into();

		self
	}

	/// Sets the IAM role to assume before signing.
	pub fn aws_role_arn(mut self, arn: impl Into<String>) -> Self {
		self.aws_role_arn = Some(arn.into());

		self
	}

	/// Sets the SP-API regional endpoint selector.
	pub fn region(mut self, region: ApiRegion) -> Self {
		self.region = region;

		self
	}

	/// Overrides the base URL derived from the region.
	pub fn base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Overrides the LWA token endpoint.
	pub fn token_endpoint(mut self, endpoint: Url) -> Self {
		self.token_endpoint = Some(endpoint);

		self
	}

	/// Overrides the regional STS endpoint.
	pub fn sts_endpoint(mut self, endpoint: Url) -> Self {
		self.sts_endpoint = Some(endpoint);

		self
	}

	/// Replaces the marketplace identifier list.
	pub fn marketplace_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
		self.marketplace_ids = ids.into_iter().collect();

		self
	}

	/// Targets the sandbox environment.
	pub fn sandbox(mut self, sandbox: bool) -> Self {
		self.sandbox = sandbox;

		self
	}

	/// Replaces the per-group rate-limit table.
	pub fn rate_limits(mut self, quotas: HashMap<EndpointGroup, RateLimitQuota>) -> Self {
		self.rate_limits = quotas;

		self
	}

	/// Sets the extra wait added on top of the computed token deficit.
	pub fn rate_limit_buffer(mut self, buffer: StdDuration) -> Self {
		self.rate_limit_buffer = buffer;

		self
	}

	/// Sets the retry bound; total attempts are `retry_attempts + 1`.
	pub fn retry_attempts(mut self, attempts: u32) -> Self {
		self.retry_attempts = attempts;

		self
	}

	/// Sets the fixed per-request socket timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Validates the configuration and produces a [`GatewayConfig`].
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		for (field, value) in [
			("client_id", &self.client_id),
			("client_secret", &self.client_secret),
			("refresh_token", &self.refresh_token),
			("aws_access_key_id", &self.aws_access_key_id),
			("aws_secret_access_key", &self.aws_secret_access_key),
			("aws_region", &self.aws_region),
		] {
			if value.trim().is_empty() {
				return Err(ConfigError::MissingField { field });
			}
		}

		let base_url = self.base_url.unwrap_or_else(|| self.region.base_url(self.sandbox));
		let token_endpoint = match self.token_endpoint {
			Some(endpoint) => endpoint,
			None => Url::parse(LWA_TOKEN_ENDPOINT)
				.map_err(|source| ConfigError::InvalidUrl { field: "token_endpoint", source })?,
		};

		Ok(GatewayConfig {
			client_id: self.client_id,
			client_secret: self.client_secret,
			refresh_token: self.refresh_token,
			aws_access_key_id: self.aws_access_key_id,
			aws_secret_access_key: self.aws_secret_access_key,
			aws_session_token: self.aws_session_token,
			aws_region: self.aws_region,
			aws_role_arn: self.aws_role_arn,
			region: self.region,
			base_url,
			token_endpoint,
			sts_endpoint: self.sts_endpoint,
			marketplace_ids: self.marketplace_ids,
			sandbox: self.sandbox,
			rate_limits: self.rate_limits,
			rate_limit_buffer: self.rate_limit_buffer,
			retry_attempts: self.retry_attempts,
			timeout: self.timeout,
		})
	}
}
