//! Optional observability helpers for gateway calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `spapi_gateway.call` with the `call` (call
//!   kind) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `spapi_gateway_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Remote call kinds observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// LWA refresh-token exchange.
	TokenRefresh,
	/// LWA client-credentials grant.
	ClientCredentials,
	/// STS AssumeRole exchange.
	AssumeRole,
	/// STS GetCallerIdentity probe.
	CallerIdentity,
	/// Signed SP-API request execution.
	Execute,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::TokenRefresh => "token_refresh",
			CallKind::ClientCredentials => "client_credentials",
			CallKind::AssumeRole => "assume_role",
			CallKind::CallerIdentity => "caller_identity",
			CallKind::Execute => "execute",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
