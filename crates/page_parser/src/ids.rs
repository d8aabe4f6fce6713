//! Identity extraction from site URLs and small field parsers.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static YEAR_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*\d)[-_](?:19|20)\d{2}$").unwrap());
static TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)$").unwrap());
static FOUR_DIGIT_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:19|20)\d{2}").unwrap());

fn is_year_segment(seg: &str) -> bool {
    seg.len() == 4
        && (seg.starts_with("19") || seg.starts_with("20"))
        && seg.bytes().all(|b| b.is_ascii_digit())
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Path segments with a trailing season-year removed (`/123/2025/` and `/123-2025/` → `123`).
fn strip_year_suffix(mut segs: Vec<String>) -> Vec<String> {
    if segs.len() >= 2 {
        let last_is_year = segs.last().map(|s| is_year_segment(s)).unwrap_or(false);
        let prev_has_digits = segs[segs.len() - 2].bytes().any(|b| b.is_ascii_digit());
        if last_is_year && prev_has_digits {
            segs.pop();
        }
    }
    if let Some(last) = segs.last_mut() {
        if let Some(caps) = YEAR_SUFFIX.captures(last) {
            *last = caps[1].to_string();
        }
    }
    segs
}

/// Tournament identity: numeric id from the canonical URL, year suffix stripped.
pub fn tournament_id(url: &Url) -> Option<i64> {
    let segs = strip_year_suffix(path_segments(url));
    let last = segs.last()?;
    TRAILING_DIGITS.captures(last)?.get(1)?.as_str().parse().ok()
}

/// The URL tournaments are stored under: no query, no fragment, no year suffix.
pub fn canonical_tournament_url(url: &Url) -> Url {
    let segs = strip_year_suffix(path_segments(url));
    let mut canonical = url.clone();
    canonical.set_query(None);
    canonical.set_fragment(None);
    let path = if segs.is_empty() { "/".to_string() } else { format!("/{}/", segs.join("/")) };
    canonical.set_path(&path);
    canonical
}

/// Team identity: trailing numeric segment, else a stable hash of the URL.
pub fn team_id(url: &Url) -> i64 {
    path_segments(url)
        .last()
        .and_then(|seg| TRAILING_DIGITS.captures(seg))
        .and_then(|c| c[1].parse::<i64>().ok())
        .unwrap_or_else(|| url_hash(url.as_str()))
}

/// First 8 bytes of SHA-256, masked to a positive i64.
pub fn url_hash(raw: &str) -> i64 {
    let digest = Sha256::digest(raw.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(buf) & i64::MAX as u64) as i64
}

pub fn player_id(url: &Url) -> Option<i64> {
    let last = path_segments(url).pop()?;
    TRAILING_DIGITS.captures(&last)?.get(1)?.as_str().parse().ok()
}

/// Player `source`: lowercased host without `www.`.
pub fn host_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// `https://spb.fhr.ru/anything` → `https://spb.fhr.ru/`
pub fn site_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Year filter labels look like "2009", "2009 г.р." or "Юноши 2009".
pub fn parse_year_label(raw: &str) -> Option<i32> {
    FOUR_DIGIT_YEAR.find(raw)?.as_str().parse().ok()
}

pub fn birth_year(date: Option<NaiveDate>) -> Option<i32> {
    date.map(|d| d.year())
}

/// Numeric cell: "185", "185 см", "-3", "" → None
pub fn parse_int(raw: &str) -> Option<i32> {
    let cleaned: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-' || *c == '+')
        .collect();
    cleaned.trim_start_matches('+').parse().ok()
}
