use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::client::{CheckAuthentication, VerificationClient, VerificationResponse};
use crate::{
    check_freshness, parse_key_values, AssertionFields, Error, Field, Result, SteamId64,
    EXPECTED_SIGNED, OPENID_NS, STEAM_URL,
};

static IDENTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://steamcommunity\.com/openid/id/(76561[0-9]{12})/?$")
        .expect("this is a valid regex")
});

#[derive(Debug, Clone)]
/// Verifies the login details returned after users have gone through the 'sign in with Steam' page
/// # Example
/// ```
/// # use steam_openid_verify::{AssertionFields, Verifier, VerificationResponse};
/// # fn main() {
/// # let qs = "openid.ns=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0&openid.mode=id_res&openid.op_endpoint=https%3A%2F%2Fsteamcommunity.com%2Fopenid%2Flogin&openid.claimed_id=https%3A%2F%2Fsteamcommunity.com%2Fopenid%2Fid%2F76561197972494985&openid.identity=https%3A%2F%2Fsteamcommunity.com%2Fopenid%2Fid%2F76561197972494985&openid.return_to=http%3A%2F%2Flocalhost%3A8080%2Fcallback&openid.response_nonce=2019-06-15T00%3A36%3A00Z7nVIS5lDAcZe%2FT0gT4%2BQNQyexyA%3D&openid.assoc_handle=1234567890&openid.signed=signed%2Cop_endpoint%2Cclaimed_id%2Cidentity%2Creturn_to%2Cresponse_nonce%2Cassoc_handle&openid.sig=BK0zC%2F%2FKzERs7N%2BNlDO0aL06%2BBA%3D";
/// let verifier = Verifier::new("http://localhost:8080/callback");
/// let fields = AssertionFields::from_querystring(qs).unwrap();
///
/// // Local checks only; the nonce above is long expired.
/// match verifier.check(&fields, chrono::Utc::now()) {
///     Ok(validated) => {
///         // send off validated.request(), get back a response
///         # let response = VerificationResponse::new(200, "ns:http://specs.openid.net/auth/2.0\nis_valid:true\n");
///         let steam_id = validated.interpret(&response);
///     }
///     Err(e) => (), // tampered or stale assertion
/// }
/// # }
/// ```
pub struct Verifier {
    self_url: String,
}

/// An assertion that passed every local check and is ready to be confirmed by Steam.
#[derive(Debug, Clone)]
pub struct ValidatedAssertion {
    steam_id: SteamId64,
    request: CheckAuthentication,
}

impl Verifier {
    /// `self_url` is the URL Steam was told to return to. The assertion's `openid.return_to`
    /// must start with it.
    pub fn new<S: Into<String>>(self_url: S) -> Self {
        Self {
            self_url: self_url.into(),
        }
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Checks the assertion and confirms it with Steam, returning the logged in user's SteamID.
    pub fn verify<C>(&self, fields: &AssertionFields, client: &C) -> Result<SteamId64>
    where
        C: VerificationClient + ?Sized,
    {
        self.verify_at(fields, client, Utc::now())
    }

    /// Like [`verify`](Self::verify), with the time used to judge nonce freshness.
    #[tracing::instrument(level = "debug", name = "Verifier::verify", err(Display, level = "debug"), skip_all, fields(self_url = %self.self_url))]
    pub fn verify_at<C>(
        &self,
        fields: &AssertionFields,
        client: &C,
        now: DateTime<Utc>,
    ) -> Result<SteamId64>
    where
        C: VerificationClient + ?Sized,
    {
        let validated = self.check(fields, now)?;
        let response = client.send(&validated.request);

        validated.interpret(&response)
    }

    /// Runs every local check without contacting Steam.
    pub fn check(&self, fields: &AssertionFields, now: DateTime<Utc>) -> Result<ValidatedAssertion> {
        let reject = |field: Field| {
            tracing::debug!(field = field.key(), value = fields.get(field), "rejected openid field");
            Err(Error::WrongField(field))
        };

        if fields.get(Field::Mode) != "id_res" {
            return reject(Field::Mode);
        }

        // See http://openid.net/specs/openid-authentication-2_0.html#positive_assertions
        if fields.get(Field::ClaimedId) != fields.get(Field::Identity) {
            return reject(Field::ClaimedId);
        }

        if fields.get(Field::Ns) != OPENID_NS {
            return reject(Field::Ns);
        }

        if fields.get(Field::OpEndpoint) != STEAM_URL {
            return reject(Field::OpEndpoint);
        }

        if fields.get(Field::Signed) != EXPECTED_SIGNED {
            return reject(Field::Signed);
        }

        if !fields.get(Field::ReturnTo).starts_with(&self.self_url) {
            return reject(Field::ReturnTo);
        }

        let steam_id = match IDENTITY_REGEX
            .captures(fields.get(Field::Identity))
            .and_then(|captures| captures[1].parse::<SteamId64>().ok())
        {
            Some(steam_id) => steam_id,
            None => return reject(Field::Identity),
        };

        check_freshness(fields.get(Field::ResponseNonce), now).map_err(|e| {
            tracing::debug!(error = %e, nonce = fields.get(Field::ResponseNonce), "rejected openid nonce");
            Error::Nonce(e, Field::ResponseNonce)
        })?;

        Ok(ValidatedAssertion {
            steam_id,
            request: CheckAuthentication::new(fields),
        })
    }
}

impl ValidatedAssertion {
    /// The SteamID from `openid.identity`. Not confirmed until [`interpret`](Self::interpret)
    /// succeeds.
    pub fn unconfirmed_steam_id(&self) -> SteamId64 {
        self.steam_id
    }

    /// The form to POST to Steam.
    pub fn request(&self) -> &CheckAuthentication {
        &self.request
    }

    /// Judges Steam's reply to [`request`](Self::request).
    pub fn interpret(&self, response: &VerificationResponse) -> Result<SteamId64> {
        match response.status {
            200 => {}
            status @ 403 | status @ 429 => {
                tracing::warn!(status, "rate limited by steam");
                return Err(Error::RateLimited(status));
            }
            status => {
                tracing::warn!(status, "steam verification request failed");
                return Err(Error::TransportFailure(status));
            }
        }

        let kv = parse_key_values(&response.body);

        if kv.get("ns").map(String::as_str) != Some(OPENID_NS) {
            tracing::debug!(body = %response.body, "steam reply is not openid");
            return Err(Error::MalformedProviderResponse);
        }

        if kv.get("is_valid").map(String::as_str) != Some("true") {
            tracing::debug!(body = %response.body, "steam login invalid");
            return Err(Error::AssertionRejected);
        }

        tracing::debug!(steam_id = %self.steam_id, "user logged in");

        Ok(self.steam_id)
    }
}
