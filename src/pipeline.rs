//! The authenticated request pipeline.
//!
//! [`Gateway`] wires the rate limiter, the LWA authenticator, the SigV4 signer,
//! and the retry policy in front of a shared [`HttpTransport`]. One gateway
//! instance is intended to serve an entire process; every component suspends
//! the calling task instead of blocking, so any number of callers can share it.

pub mod request;
pub mod response;

mod execute;
mod validate;

pub use request::*;
pub use response::*;
pub use validate::*;

// self
use crate::{
	_prelude::*,
	auth::{lwa::LwaAuthenticator, sigv4::RequestSigner},
	config::GatewayConfig,
	http::HttpTransport,
	limiter::RateLimiter,
	retry::RetryPolicy,
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestTransport};

/// Authenticated SP-API gateway.
///
/// Construction wires every component from one [`GatewayConfig`]; the
/// components share a single transport so token exchanges, STS calls, and API
/// requests all travel the same stack.
pub struct Gateway {
	config: GatewayConfig,
	transport: Arc<dyn HttpTransport>,
	authenticator: Arc<LwaAuthenticator>,
	signer: Arc<RequestSigner>,
	limiter: Arc<RateLimiter>,
	retry: RetryPolicy,
}
impl Gateway {
	/// Creates a gateway backed by the bundled reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
		let transport = Arc::new(ReqwestTransport::new(config.timeout)?);

		Ok(Self::with_transport(config, transport))
	}

	/// Creates a gateway over a caller-provided transport.
	pub fn with_transport(config: GatewayConfig, transport: Arc<dyn HttpTransport>) -> Self {
		let authenticator = Arc::new(LwaAuthenticator::new(&config, transport.clone()));
		let signer = Arc::new(RequestSigner::new(&config, transport.clone()));
		let limiter = Arc::new(RateLimiter::new(
			config.rate_limits.clone().into_iter(),
			config.rate_limit_buffer,
		));
		let retry = RetryPolicy::new(config.retry_attempts);

		Self { config, transport, authenticator, signer, limiter, retry }
	}

	/// Returns the configuration the gateway was built from.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Returns the LWA authenticator shared by the pipeline.
	pub fn authenticator(&self) -> &Arc<LwaAuthenticator> {
		&self.authenticator
	}

	/// Returns the request signer shared by the pipeline.
	pub fn signer(&self) -> &Arc<RequestSigner> {
		&self.signer
	}

	/// Returns the rate limiter shared by the pipeline.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}
}
impl Debug for Gateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.config.base_url.as_str())
			.field("region", &self.config.region)
			.field("sandbox", &self.config.sandbox)
			.finish()
	}
}
