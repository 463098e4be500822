//! Connection validation aggregating component probes.

// self
use crate::{
	_prelude::*,
	auth::{lwa::LwaReport, sigv4::CredentialsReport},
	limiter::{BucketStatus, EndpointGroup},
	pipeline::Gateway,
};

/// Aggregate health report produced by [`Gateway::validate_connection`].
#[derive(Clone, Debug, Serialize)]
pub struct ConnectionReport {
	/// LWA token-exchange probe outcome.
	pub lwa: LwaReport,
	/// AWS credential probe outcome.
	pub credentials: CredentialsReport,
	/// Current token levels per throttle group.
	pub rate_limits: BTreeMap<EndpointGroup, BucketStatus>,
	/// Whether every probe succeeded.
	pub overall_valid: bool,
}

impl Gateway {
	/// Probes LWA and AWS credentials and snapshots the limiter without
	/// consuming tokens or mutating any cache.
	pub async fn validate_connection(&self) -> ConnectionReport {
		let lwa = self.authenticator.validate().await;
		let credentials = self.signer.validate().await;
		let rate_limits = self.limiter.status();
		let overall_valid =
			lwa.valid && credentials.valid && credentials.role_assumed.unwrap_or(true);

		ConnectionReport { lwa, credentials, rate_limits, overall_valid }
	}
}
