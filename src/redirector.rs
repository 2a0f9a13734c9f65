use crate::{Error, IDENTIFIER_SELECT, OPENID_NS, STEAM_URL};
use url::Url;

/// Builds the URL that sends a user to Steam's login page.
#[derive(Debug, Clone)]
pub struct Redirector {
    url: Url,
    return_to: Url,
}

impl Redirector {
    /// `site_url` becomes the OpenID realm, `return_url` is resolved against it and is where
    /// Steam sends the user back to.
    pub fn new<T: AsRef<str>, U: AsRef<str>>(site_url: T, return_url: U) -> Result<Self, Error> {
        let return_to = Url::parse(site_url.as_ref())
            .map_err(Error::BadUrl)?
            .join(return_url.as_ref())
            .map_err(Error::BadUrl)?;

        let openid = LoginForm::new(site_url.as_ref(), return_to.as_str());

        let qs = serde_urlencoded::to_string(&openid).map_err(Error::Serialize)?;

        let mut url = Url::parse(STEAM_URL).map_err(Error::BadUrl)?;

        url.set_query(Some(&qs));

        Ok(Self { url, return_to })
    }

    pub fn create_response(&self) -> http::Result<http::Response<()>> {
        http::Response::builder()
            .status(http::StatusCode::FOUND)
            .header(http::header::LOCATION, self.url.as_str())
            .body(())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The `openid.return_to` sent to Steam; pass this to [`Verifier::new`](crate::Verifier::new).
    pub fn return_to(&self) -> &str {
        self.return_to.as_str()
    }
}

#[derive(Serialize)]
struct LoginForm<'a> {
    #[serde(rename = "openid.ns")]
    ns: &'static str,
    #[serde(rename = "openid.identity")]
    identity: &'static str,
    #[serde(rename = "openid.claimed_id")]
    claimed_id: &'static str,
    #[serde(rename = "openid.mode")]
    mode: &'static str,
    #[serde(rename = "openid.return_to")]
    return_to: &'a str,
    #[serde(rename = "openid.realm")]
    realm: &'a str,
}

impl<'a> LoginForm<'a> {
    fn new(site_url: &'a str, return_to: &'a str) -> Self {
        Self {
            ns: OPENID_NS,
            identity: IDENTIFIER_SELECT,
            claimed_id: IDENTIFIER_SELECT,
            mode: "checkid_setup",
            realm: site_url,
            return_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn login_url() {
        let redirector = Redirector::new("http://localhost:8080", "/callback").unwrap();
        let url = redirector.url();

        assert_eq!(url.as_str().split('?').next(), Some(STEAM_URL));

        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["openid.ns"], OPENID_NS);
        assert_eq!(query["openid.mode"], "checkid_setup");
        assert_eq!(query["openid.identity"], IDENTIFIER_SELECT);
        assert_eq!(query["openid.claimed_id"], IDENTIFIER_SELECT);
        assert_eq!(query["openid.realm"], "http://localhost:8080");
        assert_eq!(query["openid.return_to"], "http://localhost:8080/callback");
        assert_eq!(redirector.return_to(), "http://localhost:8080/callback");
    }

    #[test]
    fn redirect_response() {
        let redirector = Redirector::new("https://example.com", "/auth/steam?next=%2F").unwrap();
        let response = redirector.create_response().unwrap();

        assert_eq!(response.status(), http::StatusCode::FOUND);
        assert_eq!(
            response.headers()[http::header::LOCATION],
            redirector.url().as_str()
        );
    }

    #[test]
    fn bad_site_url() {
        match Redirector::new("not a url", "/callback") {
            Err(Error::BadUrl(_)) => {}
            other => panic!("{:?}", other),
        }
    }
}
