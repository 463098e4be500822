//! Per-endpoint-group token-bucket rate limiting.
//!
//! One bucket exists per configured endpoint group, plus a shared `default`
//! fallback bucket created on first use for unrecognized groups. Acquisition
//! never fails; callers suspend until a token is available, bounded only by the
//! bucket's refill rate.

pub mod bucket;
pub mod group;

pub use bucket::BucketStatus;
pub use group::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::{Instant, sleep};
// self
use crate::{_prelude::*, config::RateLimitQuota, limiter::bucket::RateBucket};

const FALLBACK_RATE: f64 = 1.;
const FALLBACK_BURST: f64 = 10.;

/// Token-bucket rate limiter shared by all pipeline invocations.
pub struct RateLimiter {
	buckets: RwLock<HashMap<EndpointGroup, Arc<Mutex<RateBucket>>>>,
	buffer: StdDuration,
}
impl RateLimiter {
	/// Creates one bucket per configured quota.
	pub fn new<I>(quotas: I, buffer: StdDuration) -> Self
	where
		I: IntoIterator<Item = (EndpointGroup, RateLimitQuota)>,
	{
		let buckets = quotas
			.into_iter()
			.map(|(group, quota)| {
				(group, Arc::new(Mutex::new(RateBucket::new(quota.rate, quota.burst as f64))))
			})
			.collect();

		Self { buckets: RwLock::new(buckets), buffer }
	}

	/// Suspends until one token is available in the named bucket, then consumes it.
	///
	/// The refill is recomputed on every iteration so concurrent consumers
	/// interleave fairly under the same clock.
	pub async fn acquire(&self, group: &EndpointGroup) {
		let bucket = self.bucket_for(group);

		loop {
			let wait = {
				let mut bucket = bucket.lock();

				bucket.refill(Instant::now());

				if bucket.try_consume() {
					return;
				}

				bucket.wait_hint(self.buffer)
			};

			sleep(wait).await;
		}
	}

	/// Returns a non-mutating snapshot of every bucket, keyed by group.
	pub fn status(&self) -> BTreeMap<EndpointGroup, BucketStatus> {
		let now = Instant::now();

		self.buckets
			.read()
			.iter()
			.map(|(group, bucket)| (group.clone(), bucket.lock().status(now)))
			.collect()
	}

	fn bucket_for(&self, group: &EndpointGroup) -> Arc<Mutex<RateBucket>> {
		if let Some(bucket) = self.buckets.read().get(group.as_ref()) {
			return bucket.clone();
		}

		// Unknown groups share one fallback bucket, created on first use.
		let mut buckets = self.buckets.write();

		buckets
			.entry(EndpointGroup::fallback())
			.or_insert_with(|| Arc::new(Mutex::new(RateBucket::new(FALLBACK_RATE, FALLBACK_BURST))))
			.clone()
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("groups", &self.buckets.read().len())
			.field("buffer", &self.buffer)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration;
	// self
	use super::*;

	fn group(name: &str) -> EndpointGroup {
		EndpointGroup::new(name).expect("Test group should be valid.")
	}

	fn limiter(rate: f64, burst: u32) -> RateLimiter {
		RateLimiter::new(
			[(group("orders"), RateLimitQuota { rate, burst })],
			Duration::from_millis(100),
		)
	}

	#[tokio::test(start_paused = true)]
	async fn burst_exhaustion_suspends_for_the_refill_interval() {
		let limiter = limiter(2., 3);
		let orders = group("orders");

		let start = Instant::now();

		for _ in 0..3 {
			limiter.acquire(&orders).await;
		}

		assert_eq!(Instant::now(), start, "Burst acquisitions must not suspend.");

		limiter.acquire(&orders).await;

		let waited = Instant::now() - start;

		assert!(
			waited >= Duration::from_millis(500),
			"Fourth acquisition must wait at least 1/rate, waited {waited:?}.",
		);
	}

	#[tokio::test(start_paused = true)]
	async fn tokens_stay_within_bounds_under_concurrent_acquirers() {
		let limiter = Arc::new(limiter(5., 4));
		let handles: Vec<_> = (0..9)
			.map(|_| {
				let limiter = limiter.clone();

				tokio::spawn(async move { limiter.acquire(&group("orders")).await })
			})
			.collect();

		for handle in handles {
			handle.await.expect("Acquirer task should not panic.");
		}

		let status = limiter.status();
		let orders = &status[&group("orders")];

		assert!(orders.current_tokens >= 0.);
		assert!(orders.current_tokens <= orders.max_tokens);
	}

	#[tokio::test(start_paused = true)]
	async fn unknown_groups_share_the_fallback_bucket() {
		let limiter = limiter(1., 1);

		limiter.acquire(&group("unconfigured")).await;
		limiter.acquire(&group("also-unconfigured")).await;

		let status = limiter.status();
		let fallback = &status[&EndpointGroup::fallback()];

		assert_eq!(fallback.max_tokens, 10.);
		assert_eq!(fallback.refill_rate, 1.);
		assert!(fallback.current_tokens <= 9., "Both acquisitions must hit the same bucket.");
	}

	#[tokio::test(start_paused = true)]
	async fn status_never_consumes_tokens() {
		let limiter = limiter(1., 5);

		let first = limiter.status();
		let second = limiter.status();

		assert_eq!(first[&group("orders")].current_tokens, 5.);
		assert_eq!(second[&group("orders")].current_tokens, 5.);
	}
}
