//! Response normalization for the request pipeline.

// crates.io
use http::Method;
// self
use crate::{_prelude::*, error::ApiError, http::WireResponse};

/// Normalized successful response payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ApiPayload {
	/// The service answered 204 or an empty body.
	NoContent,
	/// Parsed JSON body.
	Json(serde_json::Value),
	/// Body that was not valid JSON, passed through as text.
	Raw(String),
}
impl ApiPayload {
	/// Returns the parsed JSON body, when there is one.
	pub fn json(&self) -> Option<&serde_json::Value> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Consumes the payload, yielding the parsed JSON body when there is one.
	pub fn into_json(self) -> Option<serde_json::Value> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}
}

/// Converts a raw response into a payload, surfacing `status >= 400` as
/// [`ApiError`] carrying the parsed (or raw) body, URL, and method.
pub(crate) fn parse(response: WireResponse, url: &str, method: &Method) -> Result<ApiPayload> {
	let status = response.status();
	let body = response.into_body();

	if status.as_u16() >= 400 {
		let body = match serde_json::from_slice(&body) {
			Ok(value) => value,
			Err(_) => serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()),
		};

		return Err(ApiError {
			status: status.as_u16(),
			body,
			url: url.to_owned(),
			method: method.clone(),
		}
		.into());
	}

	if status == http::StatusCode::NO_CONTENT || body.is_empty() {
		return Ok(ApiPayload::NoContent);
	}

	Ok(match serde_json::from_slice(&body) {
		Ok(value) => ApiPayload::Json(value),
		Err(_) => ApiPayload::Raw(String::from_utf8_lossy(&body).into_owned()),
	})
}
