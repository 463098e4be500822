//! Transport primitives for outbound SP-API calls and LWA token exchanges.
//!
//! The module exposes [`HttpTransport`] as the gateway's only dependency on an
//! HTTP stack. The pipeline, the LWA authenticator, and the STS client all
//! dispatch through the same trait object, so a single mock transport can stand
//! in for every remote endpoint during tests.

// std
#[cfg(feature = "reqwest")]
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use http::{Request, Response};
use oauth2::{AsyncHttpClient, HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Byte-body request handed to transports.
pub type WireRequest = Request<Vec<u8>>;
/// Byte-body response resolved by transports.
pub type WireResponse = Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::dispatch`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<WireResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing signed SP-API requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport instance can
/// be shared across the gateway's components behind `Arc<dyn HttpTransport>`,
/// and the returned futures must be `Send` so pipeline invocations can hop
/// executors freely.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one request and resolves with the raw response.
	///
	/// Implementations surface connection, TLS, and timeout failures as
	/// [`TransportError`]; non-2xx statuses are not errors at this layer.
	fn dispatch(&self, request: WireRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Token requests should not follow redirects, matching OAuth 2.0 guidance that token
/// endpoints return results directly instead of delegating to another URI, so
/// [`ReqwestTransport::new`] disables redirect following for every request.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with the fixed per-request socket timeout.
	pub fn new(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn dispatch(&self, request: WireRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::from)?;
			let response = self.0.execute(request).await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();
			let mut wire = Response::new(body);

			*wire.status_mut() = status;
			*wire.headers_mut() = headers;

			Ok(wire)
		})
	}
}

/// Error wrapper carrying [`TransportError`] through the `oauth2` crate's
/// request machinery.
#[derive(Debug, ThisError)]
#[error(transparent)]
pub struct BridgedTransportError(#[from] pub TransportError);

/// Adapter exposing an [`HttpTransport`] as the `oauth2` crate's async HTTP client.
pub(crate) struct TokenDispatch {
	transport: Arc<dyn HttpTransport>,
}
impl TokenDispatch {
	pub(crate) fn new(transport: Arc<dyn HttpTransport>) -> Self {
		Self { transport }
	}
}
impl<'c> AsyncHttpClient<'c> for TokenDispatch {
	type Error = BridgedTransportError;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move { Ok(self.transport.dispatch(request).await?) })
	}
}
