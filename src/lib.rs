//! Authenticated gateway core for the Amazon Selling Partner API—LWA token lifecycle, SigV4
//! request signing, per-endpoint token-bucket rate limiting, and classified retry composed into
//! one outbound request pipeline.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod limiter;
pub mod obs;
pub mod pipeline;
pub mod retry;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::GatewayConfig,
		http::{HttpTransport, ReqwestTransport},
		pipeline::Gateway,
	};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`Gateway`] backed by the insecure reqwest transport used across
	/// integration tests.
	pub fn build_test_gateway(config: GatewayConfig) -> Gateway {
		let transport: Arc<dyn HttpTransport> = Arc::new(test_reqwest_transport());

		Gateway::with_transport(config, transport)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
