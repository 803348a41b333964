use chrono::{NaiveDate, NaiveDateTime};

/// Trim and compose to NFC so names typed on different systems compare equal.
pub fn normalize_name(input: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    input.trim().nfc().collect::<String>()
}

/// First `n` characters (not bytes) of `s`.
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Render an integral numeric ID without decimals, zero-padded to `width`.
pub fn numeric_id_to_string(v: f64, width: Option<usize>) -> String {
    let digits = if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        format!("{:.0}", v)
    } else {
        v.to_string()
    };
    match width {
        Some(w) if digits.len() < w && digits.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{:0>width$}", digits, width = w)
        }
        _ => digits,
    }
}

/// Parse an amount cell written as text; blanks are zero, thousands separators are ignored.
pub fn parse_amount(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    t.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse a visit date; `None` when the text matches no known layout.
pub fn parse_visit_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }
    for f in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt.date());
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return Some(d);
        }
    }
    None
}
