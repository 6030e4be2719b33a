use once_cell::sync::Lazy;
use regex::Regex;

/// Roman numeral suffixes indexed by the `nameindex` attribute of a component
pub const NAME_INDEX_SUFFIXES: &[&str] = &[
    "", " I", " II", " III", " IV", " V", " VI", " VII", " VIII", " IX", " X", " XI", " XII",
    " XIII", " XIV", " XV", " XVI", " XVII", " XVIII", " XIX", " XX", " XXI", " XXII", " XXIII",
    " XXIV", " XXV", " XXVI", " XXVII", " XXVIII", " XXIX", " XXX",
];

static TEXT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\s*(\d+)\s*,\s*(\d+)\s*\}$").expect("valid text reference regex"));

/// Parse a save-game object id.
///
/// Ids come as `[0x1a2b]`, `0x1a2b` or plain decimal. Anything unparsable
/// yields 0, which every caller treats as "no id".
pub fn parse_id(raw: &str) -> i64 {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(raw)
        .trim();
    if raw.is_empty() {
        return 0;
    }

    match raw.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).unwrap_or(0),
        None => raw.parse().unwrap_or(0),
    }
}

/// Parse an integer attribute, defaulting to 0
pub fn parse_int(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

/// Parse a numeric attribute that may carry a fractional part (e.g. `"1250.0"`)
pub fn parse_number(raw: &str) -> i64 {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        .unwrap_or(0)
}

/// Convert a game time in float seconds to integer milliseconds
pub fn normalize_time(raw: &str) -> i64 {
    match raw.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => (seconds * 1000.0).round() as i64,
        _ => 0,
    }
}

/// Parse an attribute that is exactly a `{page,id}` text reference
pub fn parse_text_ref(input: &str) -> Option<(u32, u32)> {
    let caps = TEXT_REF.captures(input.trim())?;
    let page: u32 = caps[1].parse().ok()?;
    let id: u32 = caps[2].parse().ok()?;
    (page > 0 && id > 0).then_some((page, id))
}

/// Map a `nameindex` attribute to its roman suffix
pub fn name_index_suffix(raw: &str) -> &'static str {
    usize::try_from(parse_int(raw))
        .ok()
        .and_then(|idx| NAME_INDEX_SUFFIXES.get(idx))
        .copied()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("[0x1f]"), 31);
        assert_eq!(parse_id("0x10"), 16);
        assert_eq!(parse_id("42"), 42);
        assert_eq!(parse_id("[]"), 0);
        assert_eq!(parse_id(""), 0);
        assert_eq!(parse_id("[0xzz]"), 0);
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("12.3456"), 12346);
        assert_eq!(normalize_time("0"), 0);
        assert_eq!(normalize_time("abc"), 0);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1250"), 1250);
        assert_eq!(parse_number("1250.7"), 1250);
        assert_eq!(parse_number("x"), 0);
    }

    #[test]
    fn test_parse_text_ref() {
        assert_eq!(parse_text_ref("{20101, 10101}"), Some((20101, 10101)));
        assert_eq!(parse_text_ref("{0,5}"), None);
        assert_eq!(parse_text_ref("Argon Prime"), None);
        assert_eq!(parse_text_ref("x {1,2}"), None);
    }

    #[test]
    fn test_name_index_suffix() {
        assert_eq!(name_index_suffix("0"), "");
        assert_eq!(name_index_suffix("4"), " IV");
        assert_eq!(name_index_suffix("99"), "");
        assert_eq!(name_index_suffix("-1"), "");
    }
}
