//! URL detection in free chat text.
//!
//! Only the first URL of a message is ever reported; a message carrying several
//! links is enriched for the first one alone.

use std::sync::OnceLock;

use regex::Regex;

static URL_RE: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    URL_RE.get_or_init(|| {
        Regex::new(r"(ftp|http|https)://(\w+:?\w*@)?(\S+)(:[0-9]+)?(/|/([\w#!:.?+=&%@/-]))?")
            .expect("valid regex")
    })
}

/// Return the first URL-like substring of `text`, verbatim.
///
/// The match is the canonical dedup key: no trailing-slash or query
/// normalization is applied.
pub fn detect(text: &str) -> Option<String> {
    url_regex().find(text).map(|m| m.as_str().to_string())
}
