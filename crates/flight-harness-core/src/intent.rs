//! Keyword-based inference of relevant message types.
//!
//! A question is lower-cased and tested against independent keyword
//! groups. Matching is by substring, so `"alt"` also matches
//! `"altitude"` and `"temp"` matches `"temperature"`. All matching groups
//! contribute, and the result keeps the order in which types were first
//! inferred.

use crate::models::message_types::{
    BATTERY_STATUS, GLOBAL_POSITION_INT, GPS_RAW_INT, RC_CHANNELS, STATUSTEXT,
};

/// Keyword group → message types it selects.
const KEYWORD_GROUPS: &[(&[&str], &[&str])] = &[
    (&["altitude", "alt"], &[GPS_RAW_INT, GLOBAL_POSITION_INT]),
    (&["battery", "temp", "temperature"], &[BATTERY_STATUS]),
    (&["gps", "signal"], &[GPS_RAW_INT]),
    (&["rc", "remote"], &[RC_CHANNELS]),
    (&["error", "critical"], &[STATUSTEXT]),
];

/// Infer which message types a question is about.
///
/// Returns an empty vector when no keyword matches; callers treat that as
/// "no filter".
pub fn infer_message_types(query_text: &str) -> Vec<&'static str> {
    let lower = query_text.to_lowercase();
    let mut types: Vec<&'static str> = Vec::new();

    for (keywords, selected) in KEYWORD_GROUPS {
        if keywords.iter().any(|k| lower.contains(k)) {
            for t in selected.iter() {
                if !types.contains(t) {
                    types.push(t);
                }
            }
        }
    }

    types
}
