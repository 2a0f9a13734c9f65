//! Strict verification of 'login with steam' OpenID 2.0 assertions.
//!
//! ## Usage
//!
//! First, obtain the URL to which users should be redirected to start the login process:
//!
//! ```rust
//! # fn main() {
//! let redirector = steam_openid_verify::Redirector::new("http://localhost:8080", "/callback").unwrap();
//! let redirect_url = redirector.url();
//! # }
//! ```
//!
//! After redirecting the user to this URL, they will be returned to `/callback` with the
//! assertion in the query string. Extract it into [`AssertionFields`] and hand it to a
//! [`Verifier`] together with a [`VerificationClient`]. Every field is checked locally before a
//! single `check_authentication` request is sent to Steam:
//!
//! ```rust
//! # use steam_openid_verify::{AssertionFields, CheckAuthentication, Verifier, VerificationResponse};
//! # fn main() {
//! # let qs = "openid.mode=id_res";
//! let verifier = Verifier::new("http://localhost:8080/callback");
//!
//! match AssertionFields::from_querystring(qs) {
//!     Ok(fields) => {
//!         // `steam_openid_verify::ReqwestClient` with the `blocking` feature, or any closure
//!         let client = |_: &CheckAuthentication| VerificationResponse::unreachable();
//!         match verifier.verify(&fields, &client) {
//!             Ok(id) => println!("Successfully logged in user with STEAMID64: {}", id),
//!             Err(e) => println!("Login unsuccessful: {}", e),
//!         }
//!     }
//!     Err(e) => println!("Login unsuccessful: {}", e),
//! }
//! # }
//! ```
//!
//! No store of consumed nonces is kept: an assertion stays valid for as long as its nonce is
//! fresh. Callers that need single-use logins must remember nonces themselves.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate failure;

mod client;
mod fields;
mod nonce;
mod redirector;
mod response;
mod steam_id;
mod verifier;

pub use client::{CheckAuthentication, ClientConfig, VerificationClient, VerificationResponse};
#[cfg(feature = "blocking")]
pub use client::ReqwestClient;
pub use fields::{should_validate, AssertionFields, Field};
pub use nonce::{check_freshness, NonceError, MAX_NONCE_SKEW};
pub use redirector::Redirector;
pub use response::parse_key_values;
pub use steam_id::SteamId64;
pub use verifier::{ValidatedAssertion, Verifier};

/// The only OpenID provider endpoint this crate talks to.
pub const STEAM_URL: &str = "https://steamcommunity.com/openid/login";

/// OpenID 2.0 namespace, both sent and expected back.
pub const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";

const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// The exact `openid.signed` list Steam produces.
const EXPECTED_SIGNED: &str =
    "signed,op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{} is not a string", _0)]
    /// A required field was absent, repeated or sent in array form
    MissingOrMalformedField(Field),
    #[fail(display = "Wrong {}", _0)]
    /// A field did not hold the value Steam sends
    WrongField(Field),
    #[fail(display = "Wrong {}: {}", _1, _0)]
    /// The response nonce was unparseable or outside the freshness window
    Nonce(#[cause] NonceError, Field),
    #[fail(display = "Steam rate limit exceeded (http {})", _0)]
    /// Steam answered 403 or 429
    RateLimited(u16),
    #[fail(display = "Failed to verify your login with Steam (http {})", _0)]
    /// Steam answered with some other non-200 status, or could not be reached
    TransportFailure(u16),
    #[fail(display = "Failed to verify your login with Steam: response is not valid OpenID")]
    /// The verification reply lacked the expected namespace
    MalformedProviderResponse,
    #[fail(display = "Failed to verify your login with Steam")]
    /// Steam did not confirm the assertion
    AssertionRejected,
    #[fail(display = "bad site or return url: {}", _0)]
    /// The site or return URL was incorrect
    BadUrl(url::ParseError),
    #[fail(display = "failed to serialize openid form (please file bug): {}", _0)]
    /// Internal error serializing the query string - should never happen.
    Serialize(serde_urlencoded::ser::Error),
    #[fail(display = "failed to parse query string: {}", _0)]
    /// The callback query string was not valid `application/x-www-form-urlencoded`
    Deserialize(serde_urlencoded::de::Error),
    #[fail(display = "failed to build http request: {}", _0)]
    /// Internal error building an `http` struct - should never happen.
    BuildHttpStruct(http::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The inbound assertion was tampered with or malformed. Detected before any request to
    /// Steam is made.
    InvalidArgument,
    /// The `check_authentication` round trip failed or Steam rejected the assertion.
    VerificationFailure,
    /// Misuse of the login URL helpers or a bug in this crate.
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingOrMalformedField(_)
            | Error::WrongField(_)
            | Error::Nonce(..)
            | Error::Deserialize(_) => ErrorKind::InvalidArgument,
            Error::RateLimited(_)
            | Error::TransportFailure(_)
            | Error::MalformedProviderResponse
            | Error::AssertionRejected => ErrorKind::VerificationFailure,
            Error::BadUrl(_) | Error::Serialize(_) | Error::BuildHttpStruct(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// The inbound field responsible for the failure, if any.
    pub fn field(&self) -> Option<Field> {
        match *self {
            Error::MissingOrMalformedField(field)
            | Error::WrongField(field)
            | Error::Nonce(_, field) => Some(field),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}
