use std::sync::OnceLock;

use regex::{Matches, Regex};
use scraper::{Html, Selector};

use crate::error::DecodeError;
use crate::model::Scholarship;
use crate::unquote::unquote;
use crate::{Error, Result};

const ARRAY_OPEN: &str = "[{";
const ARRAY_CLOSE: &str = "}]";

const KEY_YEAR: &str = "anoProjeto";
const KEY_UNIT: &str = "nomeUnidade";
const KEY_TITLE: &str = "tituloProjeto";
const KEY_TRACK: &str = "nomeVertente";
const KEY_GRANTS: &str = "qtdBolsas";

/// Four-digit calendar years only.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Returns `true` if the page carries the credentials form
/// (both the `codpes` and the `senusu` inputs inside a `<form>`).
pub fn has_login_form(html: &str) -> Result<bool> {
    let doc = Html::parse_document(html);
    let user_selector = create_selector(r#"form input[name="codpes"]"#)?;
    let pass_selector = create_selector(r#"form input[name="senusu"]"#)?;

    Ok(doc.select(&user_selector).next().is_some() && doc.select(&pass_selector).next().is_some())
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Lazily decodes the records embedded in an RPC reply.
///
/// The reply is not valid JSON: it wraps one array of object literals with
/// unquoted keys. Everything between the first `[{` and the last `}]` is
/// scanned for `{...}` fragments; a reply without both markers yields nothing.
/// Each fragment decodes independently, so one bad object doesn't stop the rest.
pub fn decode(body: &str) -> Records<'_> {
    let span = match (body.find(ARRAY_OPEN), body.rfind(ARRAY_CLOSE)) {
        (Some(start), Some(end)) if start <= end => &body[start..end + ARRAY_CLOSE.len()],
        _ => "",
    };
    Records {
        objects: regexes().object.find_iter(span),
    }
}

/// Iterator returned by [`decode`].
pub struct Records<'a> {
    objects: Matches<'static, 'a>,
}

impl Iterator for Records<'_> {
    type Item = core::result::Result<Scholarship, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.objects.next().map(|m| decode_object(m.as_str()))
    }
}

struct Patterns {
    object: Regex,
    year: Regex,
    unit: Regex,
    title: Regex,
    track: Regex,
    grants: Regex,
}

fn regexes() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        object: Regex::new(r"(?s)\{.*?\}").expect("object pattern"),
        year: quoted_field(KEY_YEAR),
        unit: quoted_field(KEY_UNIT),
        title: quoted_field(KEY_TITLE),
        track: quoted_field(KEY_TRACK),
        grants: Regex::new(&format!(r"\b{KEY_GRANTS}\s*:\s*([^,}}\s]*)")).expect("grants pattern"),
    })
}

/// `key:"..."`, capturing the still-escaped literal body.
fn quoted_field(key: &str) -> Regex {
    Regex::new(&format!(r#"\b{key}\s*:\s*"((?:[^"\\]|\\.)*)""#)).expect("field pattern")
}

fn capture<'h>(re: &Regex, object: &'h str) -> Option<&'h str> {
    re.captures(object).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Missing text fields become empty; escapes that don't decode are kept verbatim.
fn text_field(re: &Regex, object: &str) -> String {
    match capture(re, object) {
        Some(raw) => unquote(raw).unwrap_or_else(|| raw.to_owned()),
        None => String::new(),
    }
}

fn decode_object(object: &str) -> core::result::Result<Scholarship, DecodeError> {
    let patterns = regexes();

    let raw_grants = capture(&patterns.grants, object)
        .filter(|raw| !raw.is_empty())
        .ok_or(DecodeError::MissingGrantCount)?;
    let grant_count = raw_grants
        .parse::<u32>()
        .map_err(|_| DecodeError::InvalidGrantCount(raw_grants.to_owned()))?;

    let raw_year = text_field(&patterns.year, object);
    let year = raw_year
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|year| YEAR_RANGE.contains(year))
        .ok_or_else(|| DecodeError::InvalidYear(raw_year.clone()))?;

    Ok(Scholarship {
        year,
        unit: text_field(&patterns.unit, object),
        title: text_field(&patterns.title, object),
        track: text_field(&patterns.track, object),
        grant_count,
    })
}
