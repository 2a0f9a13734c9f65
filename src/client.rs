use std::time::Duration;

use crate::{AssertionFields, Error, Field, Result, STEAM_URL};

/// The `check_authentication` form sent back to Steam: the assertion as received, with
/// `openid.mode` replaced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckAuthentication {
    #[serde(rename = "openid.ns")]
    ns: String,
    #[serde(rename = "openid.mode")]
    mode: &'static str,
    #[serde(rename = "openid.op_endpoint")]
    op_endpoint: String,
    #[serde(rename = "openid.claimed_id")]
    claimed_id: String,
    #[serde(rename = "openid.identity")]
    identity: String,
    #[serde(rename = "openid.return_to")]
    return_to: String,
    #[serde(rename = "openid.response_nonce")]
    response_nonce: String,
    #[serde(rename = "openid.assoc_handle")]
    assoc_handle: String,
    #[serde(rename = "openid.signed")]
    signed: String,
    #[serde(rename = "openid.sig")]
    sig: String,
}

impl CheckAuthentication {
    pub const MODE: &'static str = "check_authentication";

    pub(crate) fn new(fields: &AssertionFields) -> Self {
        let field = |f: Field| fields.get(f).to_owned();

        Self {
            ns: field(Field::Ns),
            mode: Self::MODE,
            op_endpoint: field(Field::OpEndpoint),
            claimed_id: field(Field::ClaimedId),
            identity: field(Field::Identity),
            return_to: field(Field::ReturnTo),
            response_nonce: field(Field::ResponseNonce),
            assoc_handle: field(Field::AssocHandle),
            signed: field(Field::Signed),
            sig: field(Field::Sig),
        }
    }

    /// Looks up a value by its `openid.*` key. `openid.mode` is always `check_authentication`.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Mode => self.mode,
            Field::Ns => &self.ns,
            Field::OpEndpoint => &self.op_endpoint,
            Field::ClaimedId => &self.claimed_id,
            Field::Identity => &self.identity,
            Field::ReturnTo => &self.return_to,
            Field::ResponseNonce => &self.response_nonce,
            Field::AssocHandle => &self.assoc_handle,
            Field::Signed => &self.signed,
            Field::Sig => &self.sig,
        }
    }

    /// The `application/x-www-form-urlencoded` request body.
    pub fn to_form_body(&self) -> Result<String> {
        serde_urlencoded::to_string(self).map_err(Error::Serialize)
    }

    /// Builds the verification POST for callers bringing their own HTTP client. You must use the
    /// method, headers, URI and body from the returned `http::Request`.
    pub fn to_http_request(&self) -> Result<http::Request<Vec<u8>>> {
        http::Request::builder()
            .method(http::Method::POST)
            .uri(STEAM_URL)
            .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(http::header::USER_AGENT, ClientConfig::USER_AGENT)
            .body(self.to_form_body()?.into_bytes())
            .map_err(Error::BuildHttpStruct)
    }
}

/// Status and body of the provider's answer to a `check_authentication` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResponse {
    pub status: u16,
    pub body: String,
}

impl VerificationResponse {
    /// Stands in for a status when no HTTP response was received at all.
    pub const UNREACHABLE_STATUS: u16 = 0;

    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn unreachable() -> Self {
        Self::new(Self::UNREACHABLE_STATUS, String::new())
    }
}

impl<B: AsRef<[u8]>> From<http::Response<B>> for VerificationResponse {
    fn from(response: http::Response<B>) -> Self {
        Self {
            status: response.status().as_u16(),
            body: String::from_utf8_lossy(response.body().as_ref()).into_owned(),
        }
    }
}

/// Sends a `check_authentication` request to Steam.
///
/// Implementations make one attempt and never fail: transport errors are reported as
/// [`VerificationResponse::unreachable`]. Closures of the right shape implement this trait, which
/// is how tests stub out the network.
pub trait VerificationClient {
    fn send(&self, request: &CheckAuthentication) -> VerificationResponse;
}

impl<F> VerificationClient for F
where
    F: Fn(&CheckAuthentication) -> VerificationResponse,
{
    fn send(&self, request: &CheckAuthentication) -> VerificationResponse {
        self(request)
    }
}

/// Transport settings for [`ReqwestClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub const USER_AGENT: &'static str = concat!(
        "OpenID Verification (",
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION"),
        ")"
    );
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: STEAM_URL.to_owned(),
            connect_timeout: Duration::from_secs(6),
            timeout: Duration::from_secs(6),
            user_agent: Self::USER_AGENT.to_owned(),
        }
    }
}

#[cfg(feature = "blocking")]
/// Blocking [`VerificationClient`] backed by `reqwest`. Requires the `blocking` feature.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[cfg(feature = "blocking")]
impl ReqwestClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
        })
    }
}

#[cfg(feature = "blocking")]
impl VerificationClient for ReqwestClient {
    fn send(&self, request: &CheckAuthentication) -> VerificationResponse {
        let result = self
            .client
            .post(&self.endpoint)
            .form(request)
            .send()
            .and_then(|response| {
                let status = response.status().as_u16();
                let body = response.text()?;

                Ok(VerificationResponse { status, body })
            });

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.endpoint, "steam verification request failed");
                VerificationResponse::unreachable()
            }
        }
    }
}
