//! Calendar dates embedded in filename stems

use chrono::{Datelike, NaiveDate};
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

/// Earliest year accepted as a real filename date
pub const MIN_PLAUSIBLE_YEAR: i32 = 1981;
/// Latest year accepted as a real filename date
pub const MAX_PLAUSIBLE_YEAR: i32 = 2050;

/// A date found inside a string, with its byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedDate {
    pub date: NaiveDate,
    pub start: usize,
    pub end: usize,
}

/// `YYYY_MMDD`, `YYYYMMDD`, `YYYY-MM-DD`, tried in that order.
fn date_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(\d{4})_(\d{2})(\d{2})").expect("valid date pattern"),
            Regex::new(r"(\d{4})(\d{2})(\d{2})").expect("valid date pattern"),
            Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid date pattern"),
        ]
    })
}

fn suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_(\d+)$").expect("valid suffix pattern"))
}

fn date_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}_?\d{4}$").expect("valid token pattern"))
}

fn captured_date(caps: &Captures<'_>) -> Option<NaiveDate> {
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Find the first plausible date in `text`.
///
/// Only the leftmost match of each pattern is examined. A match that is not a
/// calendar date, or whose year falls outside
/// [`MIN_PLAUSIBLE_YEAR`, `MAX_PLAUSIBLE_YEAR`], is a false positive and the
/// next pattern is tried.
pub fn find_embedded_date(text: &str) -> Option<EmbeddedDate> {
    first_plausible(date_patterns(), text)
}

/// Like [`find_embedded_date`], but only the compact `YYYY_MMDD` and
/// `YYYYMMDD` forms count.
pub fn find_compact_date(text: &str) -> Option<EmbeddedDate> {
    first_plausible(&date_patterns()[..2], text)
}

fn first_plausible(patterns: &[Regex], text: &str) -> Option<EmbeddedDate> {
    for pattern in patterns {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let Some(date) = captured_date(&caps) else {
            continue;
        };
        if !(MIN_PLAUSIBLE_YEAR..=MAX_PLAUSIBLE_YEAR).contains(&date.year()) {
            continue;
        }
        if let Some(whole) = caps.get(0) {
            return Some(EmbeddedDate {
                date,
                start: whole.start(),
                end: whole.end(),
            });
        }
    }
    None
}

/// Trailing `_<digits>` suffix: byte offset of the underscore and the digits.
pub fn trailing_suffix(stem: &str) -> Option<(usize, &str)> {
    let caps = suffix_pattern().captures(stem)?;
    let whole = caps.get(0)?;
    let digits = caps.get(1)?;
    Some((whole.start(), digits.as_str()))
}

/// Whether a hyphen-delimited filename segment is a bare date token
/// (`YYYYMMDD` or `YYYY_MMDD`).
pub fn is_date_token(segment: &str) -> bool {
    date_token_pattern().is_match(segment)
}
