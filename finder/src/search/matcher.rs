/// Strategy for case-insensitive containment
#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchStrategy {
    /// ASCII needle: compare bytes with ASCII case folding, no allocation
    Ascii(Vec<u8>),
    /// Needle with non-ASCII characters: lowercase both sides
    Unicode(String),
}

/// Tests whether text contains a needle, ignoring case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeedleMatcher {
    strategy: MatchStrategy,
}

impl NeedleMatcher {
    /// Creates a matcher for `needle`
    pub fn new(needle: &str) -> Self {
        let folded = needle.to_lowercase();
        let strategy = if folded.is_ascii() {
            MatchStrategy::Ascii(folded.into_bytes())
        } else {
            MatchStrategy::Unicode(folded)
        };
        Self { strategy }
    }

    /// Returns true when `haystack` contains the needle in any letter case
    pub fn is_match(&self, haystack: &str) -> bool {
        match &self.strategy {
            MatchStrategy::Ascii(needle) => {
                contains_ignore_ascii_case(haystack.as_bytes(), needle)
                    // Some non-ASCII characters fold to ASCII letters (e.g. KELVIN SIGN)
                    || (!haystack.is_ascii() && contains_folded(haystack, needle))
            }
            MatchStrategy::Unicode(needle) => haystack.to_lowercase().contains(needle.as_str()),
        }
    }
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

fn contains_folded(haystack: &str, needle: &[u8]) -> bool {
    contains_ignore_ascii_case(haystack.to_lowercase().as_bytes(), needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let matcher = NeedleMatcher::new("log4net");
        assert!(matcher.is_match("<Reference Include=\"Log4Net\" />"));
        assert!(matcher.is_match("LOG4NET"));
        assert!(matcher.is_match("log4net"));
        assert!(!matcher.is_match("log4j"));
        assert!(!matcher.is_match(""));
    }

    #[test]
    fn test_uppercase_needle() {
        let matcher = NeedleMatcher::new("TODO");
        assert!(matcher.is_match("// todo: remove"));
        assert!(!matcher.is_match("to do"));
    }

    #[test]
    fn test_needle_longer_than_haystack() {
        let matcher = NeedleMatcher::new("a much longer needle");
        assert!(!matcher.is_match("short"));
    }

    #[test]
    fn test_unicode_needle() {
        let matcher = NeedleMatcher::new("STRASSE Ärger");
        assert!(matcher.is_match("die strasse ärger"));
        assert!(matcher.is_match("Die Strasse ÄRGER!"));
        assert!(!matcher.is_match("die strasse arger"));
    }

    #[test]
    fn test_ascii_needle_in_non_ascii_text() {
        let matcher = NeedleMatcher::new("kelvin");
        assert!(matcher.is_match("température en KELVIN"));
        // U+212A KELVIN SIGN lowercases to 'k'
        assert!(matcher.is_match("\u{212A}elvin"));
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            NeedleMatcher::new("Hello").strategy,
            MatchStrategy::Ascii(b"hello".to_vec())
        );
        assert_eq!(
            NeedleMatcher::new("Grüße").strategy,
            MatchStrategy::Unicode("grüße".to_string())
        );
    }
}
