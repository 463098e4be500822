//! Failure classification and retry with capped exponential backoff.
//!
//! Every outbound SP-API call runs through [`RetryPolicy::run`]. Transient
//! failures (throttling, server errors, stale authentication, network faults)
//! are retried with jittered exponential backoff; everything else propagates
//! to the caller on the first attempt.

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
use tokio::time::sleep;
// self
use crate::_prelude::*;

/// Backoff ceiling in seconds.
const MAX_BACKOFF_SECS: f64 = 60.;

/// Coarse failure class used to decide retryability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
	/// API rejected the request as unauthenticated; the access token may be
	/// stale, so another attempt with a fresh token can succeed.
	Auth,
	/// API throttled the request.
	RateLimit,
	/// Transient server-side failure.
	ServerError,
	/// Request is malformed or forbidden; repeating it cannot help.
	ClientError,
	/// Connection, TLS, or timeout failure before a response arrived.
	Network,
	/// Anything else.
	Unknown,
}
impl ErrorClass {
	/// Whether another attempt is worthwhile.
	pub const fn is_retryable(self) -> bool {
		matches!(self, Self::Auth | Self::RateLimit | Self::ServerError | Self::Network)
	}
}

/// Maps an error to its failure class.
pub fn classify(err: &Error) -> ErrorClass {
	match err {
		Error::Api(api) => match api.status {
			401 => ErrorClass::Auth,
			429 => ErrorClass::RateLimit,
			500 | 502 | 503 | 504 => ErrorClass::ServerError,
			400..=499 => ErrorClass::ClientError,
			_ => ErrorClass::Unknown,
		},
		Error::Transport(_) => ErrorClass::Network,
		// Token endpoint and STS rejections mean the configured credentials are
		// wrong; repeating the exchange returns the same answer.
		Error::Auth(_) | Error::Credential(_) => ErrorClass::ClientError,
		Error::Config(_) => ErrorClass::Unknown,
	}
}

/// Retry policy with capped exponential backoff and full jitter.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	max_retries: u32,
}
impl RetryPolicy {
	/// Creates a policy performing at most `max_retries` additional attempts
	/// after the first.
	pub const fn new(max_retries: u32) -> Self {
		Self { max_retries }
	}

	/// Runs `op` until it succeeds, fails terminally, or exhausts the attempt
	/// budget of `max_retries + 1`.
	///
	/// `op` receives the zero-based attempt index, so callers can vary
	/// per-attempt behavior such as refreshing an invalidated token.
	pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 0;

		loop {
			let err = match op(attempt).await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};

			if !classify(&err).is_retryable() || attempt >= self.max_retries {
				return Err(err);
			}

			sleep(backoff_delay(attempt)).await;

			attempt += 1;
		}
	}
}

/// Delay before the attempt after `attempt`: `2^attempt` seconds jittered by a
/// uniform factor in `[0.5, 1.5)`, capped at [`MAX_BACKOFF_SECS`].
fn backoff_delay(attempt: u32) -> StdDuration {
	let base = 2_f64.powi(attempt.min(31) as _);
	let jitter = rand::rng().random_range(0.5..1.5);

	StdDuration::from_secs_f64((base * jitter).min(MAX_BACKOFF_SECS))
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::error::{ApiError, TransportError};

	fn api_error(status: u16) -> Error {
		ApiError {
			status,
			body: json!({}),
			url: "https://sellingpartnerapi-eu.amazon.com/orders/v0/orders".into(),
			method: http::Method::GET,
		}
		.into()
	}

	#[test]
	fn classification_follows_response_status() {
		assert_eq!(classify(&api_error(401)), ErrorClass::Auth);
		assert_eq!(classify(&api_error(429)), ErrorClass::RateLimit);
		assert_eq!(classify(&api_error(500)), ErrorClass::ServerError);
		assert_eq!(classify(&api_error(503)), ErrorClass::ServerError);
		assert_eq!(classify(&api_error(404)), ErrorClass::ClientError);
		assert_eq!(classify(&api_error(501)), ErrorClass::Unknown);
		assert_eq!(
			classify(&TransportError::network(std::io::Error::other("connection reset")).into()),
			ErrorClass::Network,
		);
	}

	#[test]
	fn only_transient_classes_are_retryable() {
		assert!(ErrorClass::Auth.is_retryable());
		assert!(ErrorClass::RateLimit.is_retryable());
		assert!(ErrorClass::ServerError.is_retryable());
		assert!(ErrorClass::Network.is_retryable());
		assert!(!ErrorClass::ClientError.is_retryable());
		assert!(!ErrorClass::Unknown.is_retryable());
	}

	#[test]
	fn backoff_grows_exponentially_within_jitter_bounds() {
		for attempt in 0..6 {
			let base = 2_f64.powi(attempt as _);
			let delay = backoff_delay(attempt).as_secs_f64();

			assert!(delay >= (base * 0.5).min(MAX_BACKOFF_SECS));
			assert!(delay <= (base * 1.5).min(MAX_BACKOFF_SECS));
		}

		// Far past the cap, the jitter range collapses onto the ceiling.
		assert_eq!(backoff_delay(30).as_secs_f64(), MAX_BACKOFF_SECS);
	}

	#[tokio::test(start_paused = true)]
	async fn transient_failures_are_retried_until_success() {
		let calls = AtomicU32::new(0);
		let value = RetryPolicy::new(3)
			.run(|_| {
				let call = calls.fetch_add(1, Ordering::SeqCst);

				async move {
					match call {
						0 | 1 => Err(api_error(503)),
						_ => Ok("order-list"),
					}
				}
			})
			.await
			.expect("Third attempt should succeed.");

		assert_eq!(value, "order-list");
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn terminal_failures_are_not_retried() {
		let calls = AtomicU32::new(0);
		let err = RetryPolicy::new(3)
			.run(|_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err::<(), _>(api_error(404)) }
			})
			.await
			.expect_err("Client errors must surface immediately.");

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(err.status(), Some(404));
	}

	#[tokio::test(start_paused = true)]
	async fn attempt_budget_is_max_retries_plus_one() {
		let calls = AtomicU32::new(0);
		let err = RetryPolicy::new(3)
			.run(|_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err::<(), _>(api_error(429)) }
			})
			.await
			.expect_err("Exhausted budget must surface the final error.");

		assert_eq!(calls.load(Ordering::SeqCst), 4);
		assert_eq!(err.status(), Some(429));
	}

	#[tokio::test(start_paused = true)]
	async fn attempt_index_is_passed_through() {
		let seen = parking_lot::Mutex::new(Vec::new());

		let _ = RetryPolicy::new(2)
			.run(|attempt| {
				seen.lock().push(attempt);

				async { Err::<(), _>(api_error(500)) }
			})
			.await;

		assert_eq!(*seen.lock(), vec![0, 1, 2]);
	}
}
