//! Token-bucket refill and consumption math.

// std
use std::time::Duration;
// crates.io
use tokio::time::Instant;
// self
use crate::_prelude::*;

/// Mutable per-group bucket state.
///
/// All mutation happens under the owning limiter's lock so the refill-check-consume
/// sequence never interleaves across concurrent acquirers.
#[derive(Clone, Debug)]
pub(crate) struct RateBucket {
	tokens: f64,
	max_tokens: f64,
	refill_rate: f64,
	last_refill: Instant,
}
impl RateBucket {
	/// Creates a full bucket refilling at `rate` tokens per second up to `burst`.
	pub(crate) fn new(rate: f64, burst: f64) -> Self {
		Self { tokens: burst, max_tokens: burst, refill_rate: rate, last_refill: Instant::now() }
	}

	/// Adds `elapsed * rate` tokens capped at the burst capacity and advances
	/// the refill timestamp.
	pub(crate) fn refill(&mut self, now: Instant) {
		let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

		self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
		self.last_refill = now;
	}

	/// Consumes one token if at least one is available.
	pub(crate) fn try_consume(&mut self) -> bool {
		if self.tokens >= 1. {
			self.tokens -= 1.;

			true
		} else {
			false
		}
	}

	/// Duration until one full token is available, plus the configured buffer.
	pub(crate) fn wait_hint(&self, buffer: Duration) -> Duration {
		let deficit = (1. - self.tokens).max(0.);

		Duration::from_secs_f64(deficit / self.refill_rate) + buffer
	}

	/// Non-mutating snapshot with tokens computed as of `now`.
	pub(crate) fn status(&self, now: Instant) -> BucketStatus {
		let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
		let current_tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);

		BucketStatus { current_tokens, max_tokens: self.max_tokens, refill_rate: self.refill_rate }
	}
}

/// Observability snapshot of one bucket; computed without consuming tokens.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BucketStatus {
	/// Tokens available as of the snapshot instant.
	pub current_tokens: f64,
	/// Burst capacity of the bucket.
	pub max_tokens: f64,
	/// Refill rate in tokens per second.
	pub refill_rate: f64,
}
