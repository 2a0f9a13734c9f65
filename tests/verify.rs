use std::cell::Cell;

use chrono::{Duration, Utc};
use steam_openid_verify::{
    should_validate, AssertionFields, CheckAuthentication, Error, ErrorKind, Field, SteamId64,
    VerificationResponse, Verifier,
};

const SELF_URL: &str = "https://localhost/SteamOpenID/Example.php";
const VALID: &str = "ns:http://specs.openid.net/auth/2.0\nis_valid:true";

fn nonce() -> String {
    format!("{}UNIQUE", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"))
}

fn input() -> Vec<(&'static str, String)> {
    vec![
        ("openid.mode", "id_res".to_owned()),
        ("openid.ns", "http://specs.openid.net/auth/2.0".to_owned()),
        ("openid.op_endpoint", "https://steamcommunity.com/openid/login".to_owned()),
        (
            "openid.claimed_id",
            "https://steamcommunity.com/openid/id/76561197972494985".to_owned(),
        ),
        (
            "openid.identity",
            "https://steamcommunity.com/openid/id/76561197972494985".to_owned(),
        ),
        ("openid.return_to", SELF_URL.to_owned()),
        ("openid.response_nonce", nonce()),
        ("openid.assoc_handle", "1234567890".to_owned()),
        (
            "openid.signed",
            "signed,op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle"
                .to_owned(),
        ),
        ("openid.sig", "test_sig".to_owned()),
    ]
}

fn with(key: &str, value: &str) -> Vec<(&'static str, String)> {
    let mut pairs = input();
    for pair in pairs.iter_mut().filter(|(k, _)| *k == key) {
        pair.1 = value.to_owned();
    }
    pairs
}

/// Stub transport recording whether it was called and checking what it was sent.
struct Stub {
    sent: Cell<bool>,
    response: VerificationResponse,
    expected: AssertionFields,
}

impl Stub {
    fn new(pairs: &[(&'static str, String)], status: u16, body: &str) -> Self {
        Self {
            sent: Cell::new(false),
            response: VerificationResponse::new(status, body),
            expected: AssertionFields::from_pairs(pairs.to_vec()).unwrap(),
        }
    }

    fn verify(&self, pairs: Vec<(&'static str, String)>) -> Result<SteamId64, Error> {
        let fields = AssertionFields::from_pairs(pairs)?;
        let client = |request: &CheckAuthentication| {
            self.sent.set(true);

            for field in Field::ALL.iter() {
                if *field == Field::Mode {
                    assert_eq!(request.get(*field), "check_authentication");
                } else {
                    assert_eq!(request.get(*field), self.expected.get(*field), "{}", field);
                }
            }

            self.response.clone()
        };

        Verifier::new(SELF_URL).verify(&fields, &client)
    }
}

#[test]
fn success_login() {
    let pairs = input();
    assert!(should_validate(pairs.iter().map(|(k, v)| (*k, v.as_str()))));

    let stub = Stub::new(&pairs, 200, VALID);
    let id = stub.verify(pairs).unwrap();

    assert_eq!(id.to_string(), "76561197972494985");
    assert_eq!(u64::from(id), 76_561_197_972_494_985);
    assert!(stub.sent.get());
}

#[test]
fn success_login_with_trailing_slash_and_no_nonce_suffix() {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut pairs = with("openid.response_nonce", &timestamp);
    for pair in pairs.iter_mut().filter(|(k, _)| k.ends_with("_id") || *k == "openid.identity") {
        pair.1.push('/');
    }

    let stub = Stub::new(&pairs, 200, VALID);
    assert_eq!(stub.verify(pairs).unwrap().to_string(), "76561197972494985");
}

#[test]
fn fail_login() {
    let bodies = [
        "ns:http://specs.openid.net/auth/2.0\nis_valid:false",
        "ns:http://specs.openid.net/auth/2.0\n_is_valid:true",
        "ns:http://specs.openid.net/auth/2.0\nis_valid:true:is_valid:true",
        "ns:http://specs.openid.net/auth/2.0\nis_valid_true",
    ];

    for body in bodies.iter() {
        let pairs = input();
        let stub = Stub::new(&pairs, 200, body);

        match stub.verify(pairs) {
            Err(e @ Error::AssertionRejected) => {
                assert_eq!(e.kind(), ErrorKind::VerificationFailure);
                assert!(e.to_string().contains("Failed to verify"));
            }
            other => panic!("{:?}: {:?}", body, other),
        }
        assert!(stub.sent.get());
    }
}

#[test]
fn fail_login_for_missing_keys_in_reply() {
    for body in &["", "garbage", "is_valid:true", "ns:http://specs.openid.net/auth/2.1\nis_valid:true"] {
        let pairs = input();
        let stub = Stub::new(&pairs, 200, body);

        let err = stub.verify(pairs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VerificationFailure, "{:?}", body);
        assert!(stub.sent.get());
    }
}

#[test]
fn fail_login_for_rate_limit() {
    for status in &[403, 429] {
        let pairs = input();
        let stub = Stub::new(&pairs, *status, "");

        let err = stub.verify(pairs).unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("rate limit"));
        assert_eq!(err.kind(), ErrorKind::VerificationFailure);
    }
}

#[test]
fn fail_login_for_other_status() {
    for status in &[0, 201, 404, 500] {
        let pairs = input();
        let stub = Stub::new(&pairs, *status, VALID);

        match stub.verify(pairs) {
            Err(Error::TransportFailure(s)) => assert_eq!(s, *status),
            other => panic!("{}: {:?}", status, other),
        }
        assert!(stub.sent.get());
    }
}

#[test]
fn should_not_validate_for_wrong_mode() {
    let pairs = with("openid.mode", "id_res2");
    assert!(!should_validate(pairs.iter().map(|(k, v)| (*k, v.as_str()))));
}

#[test]
fn unexpected_arguments_never_reach_steam() {
    let changes = [
        ("openid.mode", "id_res2", Field::Mode),
        ("openid.ns", "http://specs.openid.net/auth/2.1", Field::Ns),
        ("openid.op_endpoint", "https://steamcommunity.com/idopen/login", Field::OpEndpoint),
        (
            "openid.claimed_id",
            "https://steamcommunity.com/openid/id/76561197972494984",
            Field::ClaimedId,
        ),
        (
            "openid.identity",
            "https://steamcommunity.com/openid/id/76561197972494984",
            Field::ClaimedId,
        ),
        ("openid.return_to", "https://localhost/SteamOpenID/Login.php", Field::ReturnTo),
        ("openid.return_to", "https://LOCALHOST/SteamOpenID/Example.php", Field::ReturnTo),
        ("openid.return_to", "https://localhost/SteamOpenID/", Field::ReturnTo),
        (
            "openid.signed",
            "signed,op_endpoint,claimed_id,identity,return_to,assoc_handle,response_nonce",
            Field::Signed,
        ),
    ];

    for (key, value, field) in changes.iter() {
        let pairs = with(key, value);
        let stub = Stub::new(&input(), 200, VALID);

        match stub.verify(pairs) {
            Err(e @ Error::WrongField(_)) => {
                assert_eq!(e.field(), Some(*field), "{}", key);
                assert_eq!(e.kind(), ErrorKind::InvalidArgument);
            }
            other => panic!("{}: {:?}", key, other),
        }
        assert!(!stub.sent.get(), "{}", key);
    }
}

#[test]
fn unexpected_identity() {
    let url = "https://staemcommunity.com/openid/id/76561197972494984";
    let mut pairs = with("openid.identity", url);
    pairs.retain(|(k, _)| *k != "openid.claimed_id");
    pairs.push(("openid.claimed_id", url.to_owned()));

    let stub = Stub::new(&input(), 200, VALID);
    match stub.verify(pairs) {
        Err(Error::WrongField(Field::Identity)) => {}
        other => panic!("{:?}", other),
    }
    assert!(!stub.sent.get());
}

#[test]
fn return_to_with_extra_query_is_accepted() {
    let pairs = with("openid.return_to", &format!("{}?redirect=%2Fhome&x=1", SELF_URL));
    let stub = Stub::new(&pairs, 200, VALID);

    assert!(stub.verify(pairs).is_ok());
}

#[test]
fn missing_parameter() {
    for field in Field::ALL.iter() {
        let mut pairs = input();
        pairs.retain(|(k, _)| *k != field.key());

        let stub = Stub::new(&input(), 200, VALID);
        match stub.verify(pairs) {
            Err(e @ Error::MissingOrMalformedField(_)) => {
                assert_eq!(e.field(), Some(*field));
                assert_eq!(e.to_string(), format!("{} is not a string", field.key()));
            }
            other => panic!("{}: {:?}", field, other),
        }
        assert!(!stub.sent.get());
    }
}

#[test]
fn non_string_parameter() {
    for field in Field::ALL.iter() {
        for extra in &[field.key().to_owned(), format!("{}[]", field.key())] {
            let query = format!(
                "{}&{}=123",
                serde_urlencoded::to_string(input()).unwrap(),
                extra
            );

            match AssertionFields::from_querystring(&query) {
                Err(Error::MissingOrMalformedField(f)) => assert_eq!(f, *field),
                other => panic!("{}: {:?}", extra, other),
            }
        }
    }
}

#[test]
fn stale_or_malformed_nonce() {
    let stamp = |offset: i64| {
        (Utc::now() + Duration::seconds(offset))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    };

    let cases = [
        (format!("{}UNIQUE", stamp(-600)), "nonce is too old"),
        (format!("{}UNIQUE", stamp(600)), "nonce is too old"),
        ("2024-13-02T08:04:10ZUNIQUE".to_owned(), "nonce is too old"),
        ("2024-11-02 08:04:10ZUNIQUE".to_owned(), "YYYY-MM-DDTHH:MM:SSZ"),
        ("2024-11-2T08:04:10ZUNIQUE".to_owned(), "YYYY-MM-DDTHH:MM:SSZ"),
    ];

    for (nonce, message) in cases.iter() {
        let pairs = with("openid.response_nonce", nonce);
        let stub = Stub::new(&input(), 200, VALID);

        match stub.verify(pairs) {
            Err(e @ Error::Nonce(..)) => {
                assert_eq!(e.field(), Some(Field::ResponseNonce));
                assert!(e.to_string().contains(message), "{}: {}", nonce, e);
            }
            other => panic!("{}: {:?}", nonce, other),
        }
        assert!(!stub.sent.get());
    }
}

#[test]
fn same_assertion_verifies_twice() {
    let pairs = input();
    let stub = Stub::new(&pairs, 200, VALID);

    assert!(stub.verify(pairs.clone()).is_ok());
    assert!(stub.verify(pairs).is_ok());
}
