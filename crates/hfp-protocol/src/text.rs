//! Small string helpers shared by the frame parsers

/// Returns the byte index of the first character in `s` that appears in `delims`
pub fn find_any(s: &str, delims: &[char]) -> Option<usize> {
    s.find(|c: char| delims.contains(&c))
}

/// Removes every ASCII whitespace character in place
pub fn strip_whitespace(s: &mut String) {
    s.retain(|c| !c.is_ascii_whitespace());
}

/// Removes every occurrence of `c` in place
pub fn strip_char(s: &mut String, c: char) {
    s.retain(|ch| ch != c);
}

/// Strips exactly one pair of surrounding double quotes
///
/// A string with only a leading or only a trailing quote is returned as-is.
pub fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Parses a non-negative decimal integer, rejecting anything but digits
///
/// Surrounding whitespace is tolerated; `"12x"`, `"+3"` and `""` are not.
pub fn parse_decimal(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_any() {
        assert_eq!(find_any("AT+BRSF=1023", &['?', '=', ':']), Some(7));
        assert_eq!(find_any("AT+CIND=?", &['?', '=', ':']), Some(7));
        assert_eq!(find_any("RING", &['?', '=', ':']), None);
        assert_eq!(find_any("", &[':']), None);
    }

    #[test]
    fn test_strip_whitespace() {
        let mut s = String::from(" (\"service\" , (0-1))\t");
        strip_whitespace(&mut s);
        assert_eq!(s, "(\"service\",(0-1))");
    }

    #[test]
    fn test_strip_char() {
        let mut s = String::from("\"555\"");
        strip_char(&mut s, '"');
        assert_eq!(s, "555");
    }

    #[test]
    fn test_strip_quotes_one_level() {
        assert_eq!(strip_quotes("\"12345\""), "12345");
        assert_eq!(strip_quotes("\"\"12\"\""), "\"12\"");
        assert_eq!(strip_quotes("\"12345"), "\"12345");
        assert_eq!(strip_quotes("12345"), "12345");
    }

    #[test]
    fn test_parse_decimal_strict() {
        assert_eq!(parse_decimal("1023"), Some(1023));
        assert_eq!(parse_decimal("  7 "), Some(7));
        assert_eq!(parse_decimal("12x"), None);
        assert_eq!(parse_decimal("-1"), None);
        assert_eq!(parse_decimal("+1"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("99999999999"), None);
    }
}
