//! Best-effort version ordering for APK `versionName` strings.
//!
//! Only the first dotted run of digits is looked at (`v2.10.1-beta` compares
//! as `2.10.1`). This is a heuristic, not semantic versioning: qualifiers such
//! as `-beta` or `-rc1` are ignored, and a string without any digits compares
//! as `0`.
use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

/// Recorded when the inspection tool could not report a version.
pub const UNKNOWN_VERSION: &str = "Unknown";

static NUMERIC_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)*").expect("numeric run pattern is valid"));

pub fn is_unknown(version: &str) -> bool {
    version.trim().is_empty() || version == UNKNOWN_VERSION
}

/// Compares `a` against `b` on their numeric prefixes.
pub fn compare(a: &str, b: &str) -> Ordering {
    let left = numeric_components(a);
    let right = numeric_components(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        match compare_unsigned(l, r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn numeric_components(version: &str) -> Vec<&str> {
    match NUMERIC_RUN.find(version) {
        Some(m) => m.as_str().split('.').collect(),
        None => vec!["0"],
    }
}

// Digit strings of any length; avoids overflow on absurd build numbers.
fn compare_unsigned(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
