//! String helpers shared by checks and transforms.

use std::sync::OnceLock;

use regex::Regex;

pub(crate) const EMAIL_PATTERN: &str = r"^[\w.-]+@[\w.-]+\.[a-zA-Z]{2,}$";
pub(crate) const STRICT_EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
pub(crate) const MOBILE_PATTERN: &str = r"^1[3-9]\d{9}$";
pub(crate) const INTERNATIONAL_PHONE_PATTERN: &str = r"^\+\d{1,3}\d{7,14}$";

static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static STRICT_EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static MOBILE: OnceLock<Option<Regex>> = OnceLock::new();
static INTERNATIONAL_PHONE: OnceLock<Option<Regex>> = OnceLock::new();

/// Well-known formats with precompiled patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KnownFormat {
    Email,
    StrictEmail,
    Mobile,
    InternationalPhone,
}

impl KnownFormat {
    pub(crate) fn is_match(self, s: &str) -> bool {
        let (cell, pattern) = match self {
            KnownFormat::Email => (&EMAIL, EMAIL_PATTERN),
            KnownFormat::StrictEmail => (&STRICT_EMAIL, STRICT_EMAIL_PATTERN),
            KnownFormat::Mobile => (&MOBILE, MOBILE_PATTERN),
            KnownFormat::InternationalPhone => (&INTERNATIONAL_PHONE, INTERNATIONAL_PHONE_PATTERN),
        };
        cell.get_or_init(|| Regex::new(pattern).ok())
            .as_ref()
            .is_some_and(|re| re.is_match(s))
    }
}

/// Compile a user-supplied pattern, rendering the error as issue text.
pub(crate) fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid regex pattern '{}': {}", pattern, e))
}

/// Upper-case the first letter of every whitespace-separated word and
/// lower-case the rest.
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
