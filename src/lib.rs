//! Scraper for the published scholarship grants of a DWR-backed university portal.
//!
//! The portal only serves its data through a browser session: a login form,
//! then an AJAX call whose reply embeds the records as object literals.
//! [`session`] replays that conversation without a browser, [`parse`] pulls the
//! records out of the reply, [`store`] persists them as CSV and [`analyze`]
//! summarizes what was stored.

mod error;
mod macros;
mod request;
mod unquote;

pub mod analyze;
pub mod config;
pub mod model;
pub mod parse;
pub mod process;
pub mod session;
pub mod store;
pub mod token;

pub use error::{DecodeError, Error, Result};

pub const CONFIG_PATH: &str = "config.json";
pub const CONFIG_FALLBACK_PATH: &str = "config.json.example";

/// Name of the cookie the portal's script would set in the browser.
pub const SESSION_COOKIE: &str = "DWRSESSIONID";
/// Any RPC reply containing this is treated as a failed call.
pub const ERROR_MARKER: &str = "Exception";
/// How much of a failed RPC reply ends up in the log.
const EXCERPT_LEN: usize = 200;

const SUBMIT_FIELD: (&str, &str) = ("Submit", "Entrar");
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
/// Applied to every request of a run; the portal is slow.
const REQUEST_TIMEOUT_SECS: u64 = 180;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
