//! Stand-ins for the identifiers the portal's client-side script would
//! normally compute in the browser.
//!
//! The server never verifies them cryptographically, so a seedable
//! `StdRng` is enough.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::SESSION_COOKIE;

pub const TOKEN_LEN: usize = 32;
/// Exclusive upper bound of the numeric suffix.
pub const SUFFIX_BOUND: u32 = 999_999;

/// The fabricated session token plus its correlation suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSession {
    token: String,
    suffix: u32,
}

impl ScriptSession {
    pub fn fabricate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let token = std::iter::repeat_with(|| rng.sample(Alphanumeric))
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let suffix = rng.gen_range(0..SUFFIX_BOUND);
        Self { token, suffix }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    /// `<token>/<suffix>`, sent as `scriptSessionId`.
    pub fn script_session_id(&self) -> String {
        format!("{}/{}", self.token, self.suffix)
    }

    /// `Set-Cookie` style line for the session cookie, scoped to `path` and `domain`.
    pub fn cookie(&self, path: &str, domain: &str) -> String {
        format!(
            "{SESSION_COOKIE}={}; Path={path}; Domain={domain}",
            self.token
        )
    }
}
