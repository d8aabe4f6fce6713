//! Year/group heuristic for AJAX filter links.
//!
//! Filter links carry `params=<base64 of a PHP-serialized array>`. A year switch
//! serializes `"GROUP_ID";N` (null group), a group switch `"GROUP_ID";s:<len>:"<id>"`.
//! We never decode the array: the markers are matched in plain text and at all
//! three base64 alignments.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use url::form_urlencoded;

const NULL_GROUP: &[u8] = br#""GROUP_ID";N"#;
const STRING_GROUP: &[u8] = br#""GROUP_ID";s:"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Year,
    Group,
    /// `params=` present but neither marker found
    Unknown,
}

impl FilterKind {
    /// Unknown links are drilled into like years so nothing is silently dropped.
    pub fn drills_into_groups(self) -> bool {
        !matches!(self, FilterKind::Group)
    }
}

pub fn classify(link: &str) -> FilterKind {
    let Some(blob) = params_blob(link) else {
        return FilterKind::Year;
    };

    if contains_marker(&blob, NULL_GROUP) {
        FilterKind::Year
    } else if contains_marker(&blob, STRING_GROUP) {
        FilterKind::Group
    } else {
        FilterKind::Unknown
    }
}

/// Percent-decoded value of the `params=` query fragment.
fn params_blob(link: &str) -> Option<String> {
    let start = link.find("params=")?;
    let raw = &link[start + "params=".len()..];
    let raw = raw.split(|c| c == '&' || c == '#').next().unwrap_or_default();
    if raw.is_empty() {
        return None;
    }

    // '+' is a base64 character here, not an encoded space
    let query = format!("p={}", raw.replace('+', "%2B"));
    form_urlencoded::parse(query.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
}

fn contains_marker(blob: &str, marker: &[u8]) -> bool {
    if blob.as_bytes().windows(marker.len()).any(|w| w == marker) {
        return true;
    }
    let normalized = blob.replace('-', "+").replace('_', "/");
    encoded_variants(marker).iter().any(|v| normalized.contains(v.as_str()))
}

/// Base64 text that any occurrence of `marker` must produce, one per alignment.
/// Leading chars mixed with preceding bytes and a trailing partial char are cut.
fn encoded_variants(marker: &[u8]) -> [String; 3] {
    const SKIP: [usize; 3] = [0, 2, 3];
    std::array::from_fn(|shift| {
        let mut data = vec![0u8; shift];
        data.extend_from_slice(marker);
        let encoded = STANDARD_NO_PAD.encode(&data);
        let end = encoded.len() - usize::from(data.len() % 3 != 0);
        encoded[SKIP[shift]..end].to_string()
    })
}
