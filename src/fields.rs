use std::fmt;

use crate::{Error, Result};

/// The `openid.*` fields Steam appends to the callback URL. All of them are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Mode,
    Ns,
    OpEndpoint,
    ClaimedId,
    Identity,
    ReturnTo,
    ResponseNonce,
    AssocHandle,
    Signed,
    Sig,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Mode,
        Field::Ns,
        Field::OpEndpoint,
        Field::ClaimedId,
        Field::Identity,
        Field::ReturnTo,
        Field::ResponseNonce,
        Field::AssocHandle,
        Field::Signed,
        Field::Sig,
    ];

    /// The query string key, e.g. `openid.claimed_id`.
    pub fn key(self) -> &'static str {
        match self {
            Field::Mode => "openid.mode",
            Field::Ns => "openid.ns",
            Field::OpEndpoint => "openid.op_endpoint",
            Field::ClaimedId => "openid.claimed_id",
            Field::Identity => "openid.identity",
            Field::ReturnTo => "openid.return_to",
            Field::ResponseNonce => "openid.response_nonce",
            Field::AssocHandle => "openid.assoc_handle",
            Field::Signed => "openid.signed",
            Field::Sig => "openid.sig",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a key was seen while scanning the inbound pairs.
#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Value(String),
    Malformed,
}

/// The assertion Steam sent back, one plain string per [`Field`].
///
/// Values are kept verbatim. Construction only guarantees that every field is present exactly
/// once; whether the values are acceptable is decided by [`Verifier`](crate::Verifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFields {
    values: [String; 10],
}

impl AssertionFields {
    /// Collects the assertion from decoded key/value pairs. Keys not belonging to the assertion
    /// are ignored.
    ///
    /// A field that is missing, given more than once, or given in array form (`openid.sig[]`,
    /// `openid.sig[0]`) is rejected with [`Error::MissingOrMalformedField`].
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut slots: [Slot; 10] = Default::default();

        for (key, value) in pairs {
            let key = key.as_ref();

            if let Some(field) = Field::from_key(key) {
                let slot = &mut slots[field.index()];
                *slot = match slot {
                    Slot::Empty => Slot::Value(value.into()),
                    _ => Slot::Malformed,
                };
            } else if let Some(field) = array_base(key).and_then(Field::from_key) {
                slots[field.index()] = Slot::Malformed;
            }
        }

        let mut values: [String; 10] = Default::default();

        for (field, slot) in Field::ALL.iter().zip(slots.iter_mut()) {
            match std::mem::replace(slot, Slot::Empty) {
                Slot::Value(value) => values[field.index()] = value,
                Slot::Empty | Slot::Malformed => {
                    tracing::debug!(field = field.key(), "missing or malformed openid field");
                    return Err(Error::MissingOrMalformedField(*field));
                }
            }
        }

        Ok(Self { values })
    }

    /// Decodes an `application/x-www-form-urlencoded` query string, such as the one on the
    /// callback URL.
    pub fn from_querystring<S: AsRef<str>>(s: S) -> Result<Self> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(s.as_ref()).map_err(Error::Deserialize)?;

        Self::from_pairs(pairs)
    }

    /// Reads the assertion from the query string of an incoming callback request.
    pub fn from_request<B>(req: &http::Request<B>) -> Result<Self> {
        Self::from_querystring(req.uri().query().unwrap_or_default())
    }

    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    /// Iterates over `(key, value)` in [`Field::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        Field::ALL
            .iter()
            .map(move |field| (field.key(), self.get(*field)))
    }
}

/// Whether the pairs carry a positive assertion at all, i.e. exactly one `openid.mode` equal to
/// `id_res`. Callers use this to tell a login callback apart from an ordinary page visit before
/// running any validation.
pub fn should_validate<I, K, V>(pairs: I) -> bool
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut modes = pairs
        .into_iter()
        .filter(|(key, _)| {
            let key = key.as_ref();
            key == Field::Mode.key() || array_base(key) == Some(Field::Mode.key())
        })
        .map(|(key, value)| key.as_ref() == Field::Mode.key() && value.as_ref() == "id_res");

    matches!((modes.next(), modes.next()), (Some(true), None))
}

/// `openid.sig[]` and `openid.sig[0]` both name `openid.sig`.
fn array_base(key: &str) -> Option<&str> {
    let open = key.find('[')?;

    if key.ends_with(']') {
        Some(&key[..open])
    } else {
        None
    }
}
