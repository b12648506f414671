//! The query string is the only place navigation state persists. The schema:
//!
//! - `route`: the selected route ID (or, in older links, its display name)
//! - `all`: `1` or `0`, whether to show every route in the viewport
//! - `lat`, `lng`: the map center, to 5 decimal places
//! - `zoom`: the map zoom, rounded
//!
//! Writes merge into whatever else is in the query string.

use serde::{Deserialize, Serialize};

const KEYS: [&str; 5] = ["route", "all", "lat", "lng", "zoom"];

/// Parsed from the URL, every field is whatever was present and valid. Written to the URL, `None`
/// leaves that parameter alone, except for `route`, where `None` removes it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UrlState {
    pub route: Option<String>,
    pub all: Option<bool>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub zoom: Option<f64>,
}

/// Whether a URL write creates a new history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    Push,
    Replace,
}

/// Never fails; anything missing or malformed is just absent.
pub fn parse_url_state(search: &str) -> UrlState {
    let pairs = parse_pairs(search);
    let num = |key: &str| {
        get(&pairs, key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|x| x.is_finite())
    };

    UrlState {
        route: get(&pairs, "route")
            .filter(|x| !x.is_empty())
            .map(|x| x.to_string()),
        all: match get(&pairs, "all") {
            Some("1") => Some(true),
            Some("0") => Some(false),
            _ => None,
        },
        lat: num("lat"),
        lng: num("lng"),
        zoom: num("zoom"),
    }
}

/// Merges `state` into the `base` query string, returning the new one with a leading `?`, or the
/// empty string if nothing's left. Unrelated parameters keep their place.
pub fn build_search(state: &UrlState, base: &str) -> String {
    let mut pairs = parse_pairs(base);

    set_or_delete(&mut pairs, "route", state.route.clone());
    if let Some(all) = state.all {
        set_or_delete(&mut pairs, "all", Some(if all { "1" } else { "0" }.to_string()));
    }
    if let Some(lat) = state.lat {
        set_or_delete(&mut pairs, "lat", Some(format!("{lat:.5}")));
    }
    if let Some(lng) = state.lng {
        set_or_delete(&mut pairs, "lng", Some(format!("{lng:.5}")));
    }
    if let Some(zoom) = state.zoom {
        set_or_delete(&mut pairs, "zoom", Some((zoom.round() as i64).to_string()));
    }

    // Don't leave things like `route=` lying around
    for key in KEYS {
        if get(&pairs, key).map_or(false, str::is_empty) {
            pairs.retain(|(k, _)| k != key);
        }
    }

    if pairs.is_empty() {
        return String::new();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish();
    format!("?{query}")
}

fn parse_pairs(search: &str) -> Vec<(String, String)> {
    let query = search.strip_prefix('?').unwrap_or(search);
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

// The first value wins, like URLSearchParams
fn get<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// Also like URLSearchParams: setting replaces the first occurrence in place and drops any others
fn set_or_delete(pairs: &mut Vec<(String, String)>, key: &str, value: Option<String>) {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        pairs.retain(|(k, _)| k != key);
        return;
    };
    match pairs.iter().position(|(k, _)| k == key) {
        Some(idx) => {
            pairs[idx].1 = value;
            let mut seen = 0;
            pairs.retain(|(k, _)| {
                if k != key {
                    return true;
                }
                seen += 1;
                seen == 1
            });
        }
        None => {
            pairs.push((key.to_string(), value));
        }
    }
}
