//! Display formatting for exposure values.
//!
//! EXIF stores exposure settings as rationals and the extractor keeps them in
//! their bracketed field form (`"[28/10]"`, `"[1/13]"`). These formatters turn
//! them into what a gallery caption shows. None of them fail: anything that
//! cannot be parsed becomes [`UNKNOWN`].

/// Placeholder for values that are missing or unparseable.
pub const UNKNOWN: &str = "Unknown";

fn strip_brackets(raw: &str) -> &str {
    raw.trim_matches(|c| c == '[' || c == ']')
}

fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Parse an EXIF number: plain (`"2.8"`) or rational (`"28/10"`), with or
/// without surrounding brackets.
///
/// A zero denominator is a parse failure, not infinity.
pub fn parse_exif_number(raw: &str) -> Option<f64> {
    let s = strip_brackets(raw.trim());
    match s.split_once('/') {
        Some((num, rest)) => {
            let denom = parse_float(rest.split('/').next().unwrap_or(rest))?;
            if denom == 0.0 {
                return None;
            }
            Some(parse_float(num)? / denom)
        }
        None => parse_float(s),
    }
}

/// First element of a bracketed list field: `"[200, 400]"` → `"200"`.
pub fn first_element(raw: &str) -> &str {
    let inner = strip_brackets(raw.trim());
    inner.split(',').next().unwrap_or(inner).trim()
}

/// Aperture from its APEX value: `f/{2^(v/2)}` with one decimal.
///
/// ```
/// # use filmstrip::formatting::format_aperture;
/// assert_eq!(format_aperture(Some("0")), "f/1.0");
/// assert_eq!(format_aperture(Some("[4]")), "f/4.0");
/// assert_eq!(format_aperture(None), "Unknown");
/// ```
pub fn format_aperture(raw: Option<&str>) -> String {
    raw.and_then(parse_exif_number)
        .map(|apex| 2f64.powf(apex / 2.0))
        .filter(|f| f.is_finite())
        .map(|f| format!("f/{f:.1}"))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Shutter speed: `"1/…"` passes through, one second or longer becomes
/// `"{n}s"`, anything faster becomes `"1/{n}"`.
pub fn format_shutter_speed(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return UNKNOWN.to_string();
    };
    let stripped = strip_brackets(raw);
    if stripped.starts_with("1/") {
        return stripped.to_string();
    }
    match parse_exif_number(stripped) {
        Some(v) if v.is_finite() && v >= 1.0 => format!("{}s", v.trunc() as i64),
        Some(v) if v.is_finite() && v != 0.0 => {
            let inverse = 1.0 / v;
            if inverse.is_finite() {
                format!("1/{}", inverse.trunc() as i64)
            } else {
                UNKNOWN.to_string()
            }
        }
        _ => UNKNOWN.to_string(),
    }
}

/// Focal length in whole millimetres.
pub fn format_focal_length(raw: Option<&str>) -> String {
    raw.and_then(parse_exif_number)
        .filter(|v| v.is_finite())
        .map(|v| format!("{}mm", v.trunc() as i64))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// ISO as an integer: brackets stripped, first list element, 0 when absent
/// or unparseable.
pub fn parse_iso(raw: Option<&str>) -> u32 {
    raw.map(first_element)
        .and_then(|s| {
            s.parse::<u32>()
                .ok()
                .or_else(|| parse_float(s).filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u32))
        })
        .unwrap_or(0)
}
