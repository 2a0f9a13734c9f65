use chrono::{DateTime, NaiveDate, Utc};

/// How far, in seconds, a nonce timestamp may lie from the current time in either direction.
pub const MAX_NONCE_SKEW: i64 = 300;

/// Width of the `YYYY-MM-DDTHH:MM:SSZ` prefix.
const TIMESTAMP_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum NonceError {
    #[fail(display = "nonce does not start with a YYYY-MM-DDTHH:MM:SSZ timestamp")]
    /// The leading timestamp is not in the exact format
    Malformed,
    #[fail(display = "nonce is too old")]
    /// The timestamp is outside the freshness window, or names a date or time that does not
    /// exist
    TooOld,
}

/// Checks that `nonce` starts with a UTC timestamp within [`MAX_NONCE_SKEW`] of `now`.
///
/// Anything after the 20 character timestamp is the provider's uniqueness suffix and is not
/// inspected. Nonces are not remembered, so this bounds replay to the freshness window but does
/// not prevent it.
pub fn check_freshness(nonce: &str, now: DateTime<Utc>) -> Result<(), NonceError> {
    let timestamp = nonce
        .get(..TIMESTAMP_LEN)
        .ok_or(NonceError::Malformed)?
        .as_bytes();

    let digits = |range: std::ops::Range<usize>| -> Result<u32, NonceError> {
        timestamp[range].iter().try_fold(0, |acc, &b| match b {
            b'0'..=b'9' => Ok(acc * 10 + u32::from(b - b'0')),
            _ => Err(NonceError::Malformed),
        })
    };

    let separators = [(4, b'-'), (7, b'-'), (10, b'T'), (13, b':'), (16, b':'), (19, b'Z')];
    if separators.iter().any(|&(i, sep)| timestamp[i] != sep) {
        return Err(NonceError::Malformed);
    }

    let year = digits(0..4)?;
    let month = digits(5..7)?;
    let day = digits(8..10)?;
    let hour = digits(11..13)?;
    let minute = digits(14..16)?;
    let second = digits(17..19)?;

    // Impossible dates are reported as stale, not malformed.
    let issued = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or(NonceError::TooOld)?
        .and_utc();

    let skew = (now - issued).num_seconds().abs();
    if skew > MAX_NONCE_SKEW {
        tracing::debug!(%issued, skew, "stale response nonce");
        return Err(NonceError::TooOld);
    }

    Ok(())
}
