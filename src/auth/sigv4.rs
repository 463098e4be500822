//! AWS identity management and SigV4 request signing.
//!
//! The signer exchanges long-lived credentials for temporary delegated
//! credentials when a role is configured, caches the resulting identity for the
//! process lifetime, and signs outbound requests with AWS Signature Version 4
//! scoped to the `execute-api` service. The cache is never renewed
//! automatically; callers invalidate it explicitly when STS reports expired
//! session credentials.

// std
use std::time::SystemTime;
// crates.io
use aws_credential_types::Credentials;
use aws_sigv4::{
	http_request::{SignableBody, SignableRequest, SigningSettings, sign},
	sign::v4,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::GatewayConfig,
	error::{ConfigError, CredentialError},
	http::HttpTransport,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

const SIGNING_SERVICE: &str = "execute-api";
const STS_SERVICE: &str = "sts";
const STS_API_VERSION: &str = "2011-06-15";
const ROLE_SESSION_NAME: &str = "spapi-gateway-session";
const VALIDATION_SESSION_NAME: &str = "spapi-gateway-validation";
const CREDENTIALS_PROVIDER: &str = "spapi-gateway";

/// Immutable signing identity; a new role assumption produces a new instance.
#[derive(Clone, Debug)]
pub struct SignedIdentity {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: TokenSecret,
	/// Session token accompanying temporary credentials.
	pub session_token: Option<TokenSecret>,
	/// Role that produced these credentials, when assumption occurred.
	pub assumed_role_arn: Option<String>,
}

/// Validation outcome reported by [`RequestSigner::validate`].
#[derive(Clone, Debug, Serialize)]
pub struct CredentialsReport {
	/// Whether GetCallerIdentity succeeded.
	pub valid: bool,
	/// AWS account identifier of the caller.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub account_id: Option<String>,
	/// Unique identifier of the calling entity.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	/// ARN of the calling entity.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub arn: Option<String>,
	/// Signing region in effect.
	pub region: String,
	/// Configured role, when one exists.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role_arn: Option<String>,
	/// Whether the role-assumption probe succeeded; absent when no role is configured.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role_assumed: Option<bool>,
	/// Role-probe failure description.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role_error: Option<String>,
	/// GetCallerIdentity failure description.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Signs outbound requests, assuming the configured role on first use.
pub struct RequestSigner {
	transport: Arc<dyn HttpTransport>,
	access_key_id: String,
	secret_access_key: TokenSecret,
	session_token: Option<TokenSecret>,
	region: String,
	role_arn: Option<String>,
	sts_endpoint: Url,
	cached: Mutex<Option<Arc<SignedIdentity>>>,
	assume_guard: AsyncMutex<()>,
}
impl RequestSigner {
	/// Creates a signer for the configured AWS credentials.
	pub fn new(config: &GatewayConfig, transport: Arc<dyn HttpTransport>) -> Self {
		Self {
			transport,
			access_key_id: config.aws_access_key_id.clone(),
			secret_access_key: TokenSecret::new(config.aws_secret_access_key.clone()),
			session_token: config.aws_session_token.clone().map(TokenSecret::new),
			region: config.aws_region.clone(),
			role_arn: config.aws_role_arn.clone(),
			sts_endpoint: config.sts_endpoint(),
			cached: Mutex::new(None),
			assume_guard: AsyncMutex::new(()),
		}
	}

	/// Returns the cached signing identity, assuming the configured role on
	/// first use.
	pub async fn identity(&self) -> Result<Arc<SignedIdentity>> {
		if let Some(identity) = self.cached.lock().clone() {
			return Ok(identity);
		}

		let _singleflight = self.assume_guard.lock().await;

		if let Some(identity) = self.cached.lock().clone() {
			return Ok(identity);
		}

		let identity = Arc::new(match &self.role_arn {
			Some(role) => self.assume_role(role, ROLE_SESSION_NAME).await?,
			None => SignedIdentity {
				access_key_id: self.access_key_id.clone(),
				secret_access_key: self.secret_access_key.clone(),
				session_token: self.session_token.clone(),
				assumed_role_arn: None,
			},
		});

		*self.cached.lock() = Some(identity.clone());

		Ok(identity)
	}

	/// Drops the cached identity so the next signature triggers a fresh
	/// role assumption.
	pub fn invalidate(&self) {
		*self.cached.lock() = None;
	}

	/// Computes SigV4 signature headers over method, URL, headers, and body,
	/// inserting them into `headers` in place.
	pub async fn sign(
		&self,
		method: &Method,
		url: &Url,
		headers: &mut HeaderMap,
		body: &[u8],
	) -> Result<()> {
		let identity = self.identity().await?;

		ensure_host_header(headers, url)?;

		let rendered = signature_headers(
			&identity.access_key_id,
			identity.secret_access_key.expose(),
			identity.session_token.as_ref().map(|token| token.expose()),
			SIGNING_SERVICE,
			&self.region,
			method.as_str(),
			url,
			headers,
			body,
		)?;

		headers.extend(rendered);

		Ok(())
	}

	/// Probes the configured identity without mutating the cache: a
	/// GetCallerIdentity call plus, when a role is configured, an AssumeRole
	/// attempt under a separate session name.
	pub async fn validate(&self) -> CredentialsReport {
		const KIND: CallKind = CallKind::CallerIdentity;

		let span = CallSpan::new(KIND, "validate");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let report = span
			.instrument(async move {
				let mut report = match self.caller_identity().await {
					Ok(caller) => CredentialsReport {
						valid: true,
						account_id: caller.account_id,
						user_id: caller.user_id,
						arn: caller.arn,
						region: self.region.clone(),
						role_arn: self.role_arn.clone(),
						role_assumed: None,
						role_error: None,
						error: None,
					},
					Err(err) => CredentialsReport {
						valid: false,
						account_id: None,
						user_id: None,
						arn: None,
						region: self.region.clone(),
						role_arn: self.role_arn.clone(),
						role_assumed: None,
						role_error: None,
						error: Some(err.to_string()),
					},
				};

				if report.valid && let Some(role) = &self.role_arn {
					match self.assume_role(role, VALIDATION_SESSION_NAME).await {
						Ok(_) => report.role_assumed = Some(true),
						Err(err) => {
							report.role_assumed = Some(false);
							report.role_error = Some(err.to_string());
						},
					}
				}

				report
			})
			.await;

		match report.valid {
			true => obs::record_call_outcome(KIND, CallOutcome::Success),
			false => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		report
	}

	async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<SignedIdentity> {
		const KIND: CallKind = CallKind::AssumeRole;

		let span = CallSpan::new(KIND, "assume_role");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut url = self.sts_endpoint.clone();

				url.query_pairs_mut()
					.append_pair("Action", "AssumeRole")
					.append_pair("Version", STS_API_VERSION)
					.append_pair("RoleArn", role_arn)
					.append_pair("RoleSessionName", session_name);

				let body = self.sts_query(&url).await?;
				let (status, body) = match body {
					StsOutcome::Success(body) => return parse_assume_role(&body, role_arn),
					StsOutcome::Failure { status, body } => (status, body),
				};

				Err(CredentialError::AssumeRole { status, body }.into())
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	async fn caller_identity(&self) -> Result<CallerIdentity> {
		let mut url = self.sts_endpoint.clone();

		url.query_pairs_mut()
			.append_pair("Action", "GetCallerIdentity")
			.append_pair("Version", STS_API_VERSION);

		match self.sts_query(&url).await? {
			StsOutcome::Success(body) => Ok(CallerIdentity {
				account_id: extract_tag(&body, "Account"),
				user_id: extract_tag(&body, "UserId"),
				arn: extract_tag(&body, "Arn"),
			}),
			StsOutcome::Failure { status, body } =>
				Err(CredentialError::CallerIdentity { status, body }.into()),
		}
	}

	/// Signs and dispatches one STS Query API call with the long-lived
	/// credentials, never the cached delegated identity.
	async fn sts_query(&self, url: &Url) -> Result<StsOutcome> {
		let mut headers = HeaderMap::new();

		ensure_host_header(&mut headers, url)?;

		let rendered = signature_headers(
			&self.access_key_id,
			self.secret_access_key.expose(),
			self.session_token.as_ref().map(|token| token.expose()),
			STS_SERVICE,
			&self.region,
			Method::GET.as_str(),
			url,
			&headers,
			&[],
		)?;

		headers.extend(rendered);

		let mut request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.body(Vec::new())
			.map_err(ConfigError::HttpRequest)?;

		*request.headers_mut() = headers;

		let response = self.transport.dispatch(request).await?;
		let status = response.status().as_u16();
		let body = String::from_utf8_lossy(response.body()).into_owned();

		if response.status().is_success() {
			Ok(StsOutcome::Success(body))
		} else {
			Ok(StsOutcome::Failure { status, body })
		}
	}
}
impl Debug for RequestSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestSigner")
			.field("region", &self.region)
			.field("role_arn", &self.role_arn)
			.field("cached", &self.cached.lock().is_some())
			.finish()
	}
}

enum StsOutcome {
	Success(String),
	Failure { status: u16, body: String },
}

struct CallerIdentity {
	account_id: Option<String>,
	user_id: Option<String>,
	arn: Option<String>,
}

/// Computes the SigV4 signature headers for one request.
#[allow(clippy::too_many_arguments)]
fn signature_headers(
	access_key_id: &str,
	secret_access_key: &str,
	session_token: Option<&str>,
	service: &str,
	region: &str,
	method: &str,
	url: &Url,
	headers: &HeaderMap,
	body: &[u8],
) -> Result<Vec<(HeaderName, HeaderValue)>, CredentialError> {
	let credentials = Credentials::new(
		access_key_id,
		secret_access_key,
		session_token.map(str::to_owned),
		None,
		CREDENTIALS_PROVIDER,
	);
	let identity = credentials.into();
	let signing_params = v4::SigningParams::builder()
		.identity(&identity)
		.region(region)
		.name(service)
		.time(SystemTime::now())
		.settings(SigningSettings::default())
		.build()
		.map_err(signing_error)?;
	let signable_request = SignableRequest::new(
		method,
		url.as_str(),
		headers.iter().map(|(name, value)| (name.as_str(), value.to_str().unwrap_or(""))),
		SignableBody::Bytes(body),
	)
	.map_err(signing_error)?;
	let output = sign(signable_request, &signing_params.into()).map_err(signing_error)?;
	let (instructions, _signature) = output.into_parts();
	let mut rendered = Vec::new();

	for (name, value) in instructions.headers() {
		let name = HeaderName::try_from(name).map_err(signing_error)?;
		let value = HeaderValue::from_str(value).map_err(signing_error)?;

		rendered.push((name, value));
	}

	Ok(rendered)
}

/// Inserts the host header SigV4 covers, eliding default ports so the signed
/// value matches what the transport sends.
fn ensure_host_header(headers: &mut HeaderMap, url: &Url) -> Result<(), CredentialError> {
	if headers.contains_key(http::header::HOST) {
		return Ok(());
	}

	let host = url.host_str().ok_or_else(|| CredentialError::Signing {
		message: "request URL has no host".into(),
	})?;
	let rendered = match url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_owned(),
	};
	let value = HeaderValue::from_str(&rendered).map_err(signing_error)?;

	headers.insert(http::header::HOST, value);

	Ok(())
}

fn signing_error(err: impl Display) -> CredentialError {
	CredentialError::Signing { message: err.to_string() }
}

fn parse_assume_role(body: &str, role_arn: &str) -> Result<SignedIdentity> {
	let access_key_id = extract_tag(body, "AccessKeyId")
		.ok_or(CredentialError::MalformedStsResponse { field: "AccessKeyId" })?;
	let secret_access_key = extract_tag(body, "SecretAccessKey")
		.ok_or(CredentialError::MalformedStsResponse { field: "SecretAccessKey" })?;
	let session_token = extract_tag(body, "SessionToken")
		.ok_or(CredentialError::MalformedStsResponse { field: "SessionToken" })?;

	Ok(SignedIdentity {
		access_key_id,
		secret_access_key: TokenSecret::new(secret_access_key),
		session_token: Some(TokenSecret::new(session_token)),
		assumed_role_arn: Some(role_arn.to_owned()),
	})
}

/// Extracts the text content of the first `<tag>..</tag>` pair.
///
/// The STS Query API responses are flat enough that full XML parsing buys
/// nothing here.
fn extract_tag(xml: &str, tag: &str) -> Option<String> {
	let open = format!("<{tag}>");
	let close = format!("</{tag}>");
	let start = xml.find(&open)? + open.len();
	let end = xml[start..].find(&close)? + start;

	Some(xml[start..end].to_owned())
}
