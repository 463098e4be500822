//! Login-with-Amazon token lifecycle.
//!
//! [`LwaAuthenticator::token`] serves the cached bearer token while it remains
//! fresh and performs a `grant_type=refresh_token` exchange once the token is
//! absent or inside the five-minute expiry margin. A singleflight guard ensures
//! concurrent callers piggy-back on one in-flight exchange instead of
//! stampeding the token endpoint. A failed refresh leaves the previous cached
//! token in place; the expiry check retries the exchange on the next call.

// std
use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken, RequestTokenError,
	Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::GatewayConfig,
	error::AuthError,
	http::{BridgedTransportError, HttpTransport, TokenDispatch},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

type ConfiguredLwaClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const DEFAULT_EXPIRES_IN: StdDuration = StdDuration::from_secs(3_600);

/// Cached short-lived bearer token.
#[derive(Clone, Debug)]
pub struct BearerToken {
	/// Redacted token material.
	pub secret: TokenSecret,
	/// Expiry instant recorded at issuance.
	pub expires_at: OffsetDateTime,
}
impl BearerToken {
	/// Safety margin subtracted from the recorded expiry.
	pub const EXPIRY_MARGIN: Duration = Duration::minutes(5);

	/// Whether the token must be refreshed as of `now`.
	pub fn is_stale(&self, now: OffsetDateTime) -> bool {
		now + Self::EXPIRY_MARGIN >= self.expires_at
	}
}

/// Thread-safe counters for refresh exchanges.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	exchanges: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refresh exchanges actually dispatched.
	///
	/// Cache hits and singleflight piggy-backs are not counted.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of successful exchanges.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Validation outcome reported by [`LwaAuthenticator::validate`].
#[derive(Clone, Debug, Serialize)]
pub struct LwaReport {
	/// Whether a refresh exchange succeeded.
	pub valid: bool,
	/// Configured client identifier.
	pub client_id: String,
	/// Expiry of the probe token, when the exchange succeeded.
	#[serde(with = "time::serde::rfc3339::option")]
	pub token_expires_at: Option<OffsetDateTime>,
	/// Failure description, when the exchange failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Obtains and caches bearer tokens via the LWA refresh-token exchange.
pub struct LwaAuthenticator {
	oauth_client: ConfiguredLwaClient,
	transport: Arc<dyn HttpTransport>,
	client_id: String,
	refresh_token: TokenSecret,
	cached: Mutex<Option<BearerToken>>,
	refresh_guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl LwaAuthenticator {
	/// Creates an authenticator for the configured LWA application.
	pub fn new(config: &GatewayConfig, transport: Arc<dyn HttpTransport>) -> Self {
		// LWA expects client_id/client_secret in the form body, not a Basic header.
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_token_uri(TokenUrl::from_url(config.token_endpoint.clone()))
			.set_auth_type(AuthType::RequestBody);

		Self {
			oauth_client,
			transport,
			client_id: config.client_id.clone(),
			refresh_token: TokenSecret::new(config.refresh_token.clone()),
			cached: Mutex::new(None),
			refresh_guard: AsyncMutex::new(()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Returns a valid bearer token, refreshing when absent or stale.
	pub async fn token(&self, force_refresh: bool) -> Result<TokenSecret> {
		const KIND: CallKind = CallKind::TokenRefresh;

		let span = CallSpan::new(KIND, "token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				if !force_refresh
					&& let Some(token) = self.fresh_cached(OffsetDateTime::now_utc())
				{
					return Ok(token);
				}

				let _singleflight = self.refresh_guard.lock().await;

				// Another caller may have refreshed while we waited on the guard.
				if !force_refresh
					&& let Some(token) = self.fresh_cached(OffsetDateTime::now_utc())
				{
					return Ok(token);
				}

				self.metrics.record_exchange();

				match self.refresh_exchange().await {
					Ok(token) => {
						self.metrics.record_success();

						let secret = token.secret.clone();

						*self.cached.lock() = Some(token);

						Ok(secret)
					},
					Err(err) => {
						// The previous token stays cached; the expiry check will
						// retry the exchange on the next call.
						self.metrics.record_failure();

						Err(err)
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Performs a `grant_type=client_credentials` exchange for a scope-limited
	/// token, independent of the cached refresh-token flow.
	pub async fn client_credentials_token(&self, scope: &str) -> Result<TokenSecret> {
		const KIND: CallKind = CallKind::ClientCredentials;

		let span = CallSpan::new(KIND, "client_credentials_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let dispatch = TokenDispatch::new(self.transport.clone());
				let response = self
					.oauth_client
					.exchange_client_credentials()
					.add_scope(Scope::new(scope.to_owned()))
					.request_async(&dispatch)
					.await
					.map_err(map_token_error)?;

				Ok(TokenSecret::new(response.access_token().secret().to_owned()))
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Drops the cached token so the next call performs a refresh exchange.
	pub fn invalidate(&self) {
		*self.cached.lock() = None;
	}

	/// Expiry of the cached token, if one is cached.
	pub fn cached_expiry(&self) -> Option<OffsetDateTime> {
		self.cached.lock().as_ref().map(|token| token.expires_at)
	}

	/// Refresh-exchange counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Probes the refresh-token exchange without touching the cached token.
	pub async fn validate(&self) -> LwaReport {
		match self.refresh_exchange().await {
			Ok(token) => LwaReport {
				valid: true,
				client_id: self.client_id.clone(),
				token_expires_at: Some(token.expires_at),
				error: None,
			},
			Err(err) => LwaReport {
				valid: false,
				client_id: self.client_id.clone(),
				token_expires_at: None,
				error: Some(err.to_string()),
			},
		}
	}

	fn fresh_cached(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		self.cached
			.lock()
			.as_ref()
			.filter(|token| !token.is_stale(now))
			.map(|token| token.secret.clone())
	}

	async fn refresh_exchange(&self) -> Result<BearerToken> {
		let dispatch = TokenDispatch::new(self.transport.clone());
		let refresh = RefreshToken::new(self.refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh)
			.request_async(&dispatch)
			.await
			.map_err(map_token_error)?;
		let expires_in = response.expires_in().unwrap_or(DEFAULT_EXPIRES_IN);
		let expires_in = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);

		Ok(BearerToken {
			secret: TokenSecret::new(response.access_token().secret().to_owned()),
			expires_at: OffsetDateTime::now_utc() + Duration::seconds(expires_in),
		})
	}
}
impl Debug for LwaAuthenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LwaAuthenticator")
			.field("client_id", &self.client_id)
			.field("cached", &self.cached.lock().is_some())
			.finish()
	}
}

fn map_token_error(err: BasicRequestTokenError<BridgedTransportError>) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = response
				.error_description()
				.cloned()
				.unwrap_or_else(|| response.error().as_ref().to_owned());

			match response.error() {
				BasicErrorResponseType::InvalidGrant | BasicErrorResponseType::InvalidClient =>
					AuthError::Rejected { reason }.into(),
				_ => AuthError::TokenEndpoint { message: reason }.into(),
			}
		},
		RequestTokenError::Request(BridgedTransportError(transport)) => transport.into(),
		RequestTokenError::Parse(source, _body) => AuthError::ResponseParse { source }.into(),
		RequestTokenError::Other(message) => AuthError::TokenEndpoint { message }.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn staleness_honors_the_expiry_margin() {
		let now = OffsetDateTime::now_utc();
		let token =
			BearerToken { secret: TokenSecret::new("token"), expires_at: now + Duration::hours(1) };

		assert!(!token.is_stale(now));
		assert!(!token.is_stale(now + Duration::minutes(54)));
		assert!(token.is_stale(now + Duration::minutes(55)));
		assert!(token.is_stale(now + Duration::hours(2)));
	}

	#[test]
	fn absent_expiry_margin_edge_is_inclusive() {
		let now = OffsetDateTime::now_utc();
		let token = BearerToken {
			secret: TokenSecret::new("token"),
			expires_at: now + BearerToken::EXPIRY_MARGIN,
		};

		assert!(token.is_stale(now), "A token exactly at the margin boundary must refresh.");
	}

	#[test]
	fn reports_serialize_without_leaking_secrets() {
		let report = LwaReport {
			valid: true,
			client_id: "amzn1.application-oa2-client.test".into(),
			token_expires_at: Some(OffsetDateTime::UNIX_EPOCH),
			error: None,
		};
		let rendered =
			serde_json::to_string(&report).expect("Report should serialize successfully.");

		assert!(rendered.contains("\"valid\":true"));
		assert!(rendered.contains("1970-01-01T00:00:00Z"));
		assert!(!rendered.contains("error"));
	}
}
