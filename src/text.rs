//! Text matching used by in-memory filters
//!
//! Both sides are NFC-normalized before case folding so composed and
//! decomposed input compare equal.

use unicode_normalization::UnicodeNormalization;

/// NFC-normalized, lowercased, trimmed form of `s`
pub fn normalize(s: &str) -> String {
    s.trim().nfc().collect::<String>().to_lowercase()
}

/// Whether any of `fields` contains `needle` (case-insensitive).
/// An empty needle matches everything.
pub fn any_contains(fields: &[Option<&str>], needle: &str) -> bool {
    let needle = normalize(needle);
    if needle.is_empty() {
        return true;
    }
    fields
        .iter()
        .flatten()
        .any(|field| normalize(field).contains(&needle))
}

/// Escape `%`, `_` and `\` for a SQL `LIKE` pattern and wrap it in wildcards
pub fn like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('%');
    for c in normalize(s).chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_composes() {
        let decomposed = "Cafe\u{0301}";
        assert_eq!(normalize(decomposed), normalize("Caf\u{e9}"));
        assert_eq!(normalize("\u{0e19}\u{0e49}\u{0e33}"), "\u{0e19}\u{0e49}\u{0e33}");
        assert_eq!(normalize("  Canon EOS "), "canon eos");
    }

    #[test]
    fn test_any_contains() {
        let fields = [Some("Canon EOS R6"), None, Some("CAM-0042")];
        assert!(any_contains(&fields, "eos"));
        assert!(any_contains(&fields, "cam-00"));
        assert!(any_contains(&fields, ""));
        assert!(!any_contains(&fields, "nikon"));
        assert!(!any_contains(&[None, None], "x"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("Dell"), "%dell%");
    }
}
