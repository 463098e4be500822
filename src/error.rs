//! Gateway-level error types shared across authentication, signing, and the request pipeline.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// LWA token exchange failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// AWS identity or signing failure.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// The remote service returned a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Transport failure (DNS, TCP, TLS) with no response.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns the HTTP status attached to the error, when one exists.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(api) => Some(api.status),
			_ => None,
		}
	}

	/// Returns human-readable guidance keyed off the failure class and HTTP status.
	pub fn guidance(&self) -> &'static str {
		match self {
			Self::Api(api) => api.guidance(),
			Self::Auth(_) =>
				"Authentication failed. Check your LWA credentials and refresh token.",
			Self::Credential(_) =>
				"AWS credential error. Check your access keys and role configuration.",
			Self::Transport(_) => "Network error. The request will be retried automatically.",
			Self::Config(_) => "Configuration error. Check the gateway settings.",
		}
	}
}

/// LWA token endpoint failures raised by the authenticator.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The token endpoint rejected the grant (e.g., bad refresh token or client secret).
	#[error("Token endpoint rejected the grant: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The token endpoint returned an unexpected response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
	},
	/// The token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}

/// AWS identity and request-signing failures.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// STS rejected the AssumeRole call.
	#[error("STS AssumeRole failed with status {status}.")]
	AssumeRole {
		/// HTTP status returned by STS.
		status: u16,
		/// Raw response body for diagnostics.
		body: String,
	},
	/// STS rejected the GetCallerIdentity call.
	#[error("STS GetCallerIdentity failed with status {status}.")]
	CallerIdentity {
		/// HTTP status returned by STS.
		status: u16,
		/// Raw response body for diagnostics.
		body: String,
	},
	/// An STS response omitted a required field.
	#[error("STS response is missing the `{field}` field.")]
	MalformedStsResponse {
		/// Name of the missing XML tag.
		field: &'static str,
	},
	/// The SigV4 signer could not produce a signature.
	#[error("Failed to sign the request: {message}.")]
	Signing {
		/// Signer-supplied failure description.
		message: String,
	},
}

/// Remote service error carrying full diagnostic context.
#[derive(Debug, ThisError)]
#[error("API error {status} for {method} {url}.")]
pub struct ApiError {
	/// HTTP status code returned by the service.
	pub status: u16,
	/// Parsed response body, or a raw-text wrapper when the body is not JSON.
	pub body: serde_json::Value,
	/// Full request URL, including appended query parameters.
	pub url: String,
	/// HTTP method of the failed request.
	pub method: http::Method,
}
impl ApiError {
	/// Returns guidance text keyed off the HTTP status.
	pub fn guidance(&self) -> &'static str {
		match self.status {
			400 => "Bad request. Check your request parameters.",
			401 => "Authentication failed. Check your LWA credentials and refresh token.",
			403 => "Access forbidden. Check your application permissions and roles.",
			429 => "Rate limit exceeded. The request will be retried automatically.",
			500.. => "Amazon server error. The request will be retried automatically.",
			_ => "An unexpected error occurred.",
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while executing the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while executing the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required configuration field is empty or absent.
	#[error("Missing required configuration: {field}.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// A configured URL cannot be parsed.
	#[error("Configuration field `{field}` contains an invalid URL.")]
	InvalidUrl {
		/// Name of the offending field.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A numeric configuration value cannot be parsed.
	#[error("Configuration field `{field}` is not a valid number.")]
	InvalidNumber {
		/// Name of the offending field.
		field: &'static str,
	},
	/// The SP-API region selector is not one of `NA`, `EU`, `FE`.
	#[error("Unknown SP-API region `{value}`; expected NA, EU, or FE.")]
	InvalidRegion {
		/// Value that failed to parse.
		value: String,
	},
	/// An endpoint-group identifier failed validation.
	#[error(transparent)]
	InvalidEndpointGroup(#[from] crate::limiter::EndpointGroupError),
	/// A request body could not be serialized to wire bytes.
	#[error("Request body could not be serialized.")]
	InvalidBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn api_error(status: u16) -> ApiError {
		ApiError {
			status,
			body: serde_json::Value::Null,
			url: "https://sellingpartnerapi-eu.amazon.com/orders/v0/orders".into(),
			method: http::Method::GET,
		}
	}

	#[test]
	fn guidance_follows_status() {
		assert!(Error::from(api_error(401)).guidance().contains("LWA credentials"));
		assert!(Error::from(api_error(403)).guidance().contains("permissions"));
		assert!(Error::from(api_error(429)).guidance().contains("retried automatically"));
		assert!(Error::from(api_error(503)).guidance().contains("server error"));
		assert!(Error::from(api_error(400)).guidance().contains("request parameters"));
	}

	#[test]
	fn status_is_surfaced_for_api_errors() {
		assert_eq!(Error::from(api_error(418)).status(), Some(418));
		assert_eq!(
			Error::from(TransportError::Io(std::io::Error::other("boom"))).status(),
			None,
		);
	}
}
