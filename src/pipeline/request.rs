//! Request description consumed by [`Gateway::execute`](crate::pipeline::Gateway::execute).

// crates.io
use http::{HeaderMap, HeaderName, HeaderValue, Method};
// self
use crate::{_prelude::*, auth::TokenSecret, limiter::EndpointGroup};

/// Body attached to an outbound request.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
	/// No body bytes are sent.
	#[default]
	None,
	/// Structured data serialized to canonical JSON bytes.
	Json(serde_json::Value),
	/// UTF-8 text passed through unmodified.
	Text(String),
	/// Raw bytes passed through unmodified.
	Bytes(Vec<u8>),
}
impl RequestBody {
	/// Renders the body to wire bytes.
	pub(crate) fn render(&self) -> Result<Vec<u8>> {
		Ok(match self {
			Self::None => Vec::new(),
			// Infallible for `Value` inputs, but the signature stays uniform.
			Self::Json(value) => serde_json::to_vec(value)
				.map_err(|e| crate::error::ConfigError::InvalidBody { source: e })?,
			Self::Text(text) => text.clone().into_bytes(),
			Self::Bytes(bytes) => bytes.clone(),
		})
	}
}

/// Builder describing one SP-API call.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	pub(crate) method: Method,
	pub(crate) group: EndpointGroup,
	pub(crate) path: String,
	pub(crate) params: Vec<(String, String)>,
	pub(crate) headers: HeaderMap,
	pub(crate) body: RequestBody,
	pub(crate) restricted_token: Option<TokenSecret>,
}
impl ApiRequest {
	/// Starts a request description for the given method, throttle group, and path.
	pub fn new(method: Method, group: EndpointGroup, path: impl Into<String>) -> Self {
		Self {
			method,
			group,
			path: path.into(),
			params: Vec::new(),
			headers: HeaderMap::new(),
			body: RequestBody::None,
			restricted_token: None,
		}
	}

	/// Appends one query parameter.
	pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.push((name.into(), value.into()));

		self
	}

	/// Appends a query parameter when a value is present; absent values are
	/// skipped rather than rendered as empty strings.
	pub fn opt_param(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
		match value {
			Some(value) => self.param(name, value),
			None => self,
		}
	}

	/// Appends every pair from an iterator of query parameters.
	pub fn params<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.params.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Sets one request header; later values override defaults of the same name.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Attaches the request body.
	pub fn body(mut self, body: RequestBody) -> Self {
		self.body = body;

		self
	}

	/// Attaches a JSON body.
	pub fn json(self, value: serde_json::Value) -> Self {
		self.body(RequestBody::Json(value))
	}

	/// Supplies a restricted-data token to be used verbatim instead of the
	/// cached bearer token, for PII-scoped operations.
	pub fn restricted_token(mut self, token: impl Into<String>) -> Self {
		self.restricted_token = Some(TokenSecret::new(token));

		self
	}
}

/// Per-attempt wire state; rebuilt for every retry so each attempt carries
/// fresh credential and signature headers.
#[derive(Clone, Debug)]
pub(crate) struct RequestAttempt {
	pub(crate) headers: HeaderMap,
	pub(crate) body: Vec<u8>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn absent_optional_params_are_skipped() {
		let request = ApiRequest::new(
			Method::GET,
			"orders".parse().expect("Group literal should be valid."),
			"/orders/v0/orders",
		)
		.param("MarketplaceIds", "A1RKKUPIHCS9HS")
		.opt_param("NextToken", None::<String>)
		.opt_param("CreatedAfter", Some("2026-01-01T00:00:00Z"));

		assert_eq!(
			request.params,
			vec![
				("MarketplaceIds".to_owned(), "A1RKKUPIHCS9HS".to_owned()),
				("CreatedAfter".to_owned(), "2026-01-01T00:00:00Z".to_owned()),
			],
		);
	}

	#[test]
	fn body_renders_to_wire_bytes() {
		assert!(
			RequestBody::None.render().expect("Empty body should render.").is_empty()
		);
		assert_eq!(
			RequestBody::Json(json!({"quantity": 3}))
				.render()
				.expect("JSON body should render."),
			br#"{"quantity":3}"#,
		);
		assert_eq!(
			RequestBody::Text("sku\tqty".into()).render().expect("Text body should render."),
			b"sku\tqty",
		);
	}
}
