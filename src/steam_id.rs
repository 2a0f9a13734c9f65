use std::fmt;
use std::str::FromStr;

/// A 64-bit Steam account identifier, as embedded in Steam's OpenID identity URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SteamId64(u64);

impl SteamId64 {
    pub const MIN: u64 = 76_561_197_960_265_728;
    pub const MAX: u64 = 76_561_202_255_233_023;

    /// Returns `None` outside of `MIN..=MAX`.
    pub fn new(id: u64) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&id) {
            Some(SteamId64(id))
        } else {
            None
        }
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl FromStr for SteamId64 {
    type Err = ();

    /// Accepts exactly 17 ASCII digits; no sign, whitespace or padding.
    fn from_str(s: &str) -> Result<Self, ()> {
        if s.len() != 17 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }

        s.parse::<u64>().ok().and_then(Self::new).ok_or(())
    }
}

impl fmt::Display for SteamId64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<SteamId64> for u64 {
    fn from(id: SteamId64) -> u64 {
        id.0
    }
}
