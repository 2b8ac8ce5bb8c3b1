//! SQL `LIKE` pattern matching.
//!
//! The in-memory backend evaluates compiled predicates itself, so it needs
//! the same matching behaviour the SQL backend delegates to the server:
//! `%` matches any run of characters (including none), `_` matches exactly
//! one. Matching is case-sensitive; callers wanting the `UPPER(..) LIKE
//! UPPER(..)` behaviour upper-case both sides first.

/// Does `text` match the `LIKE` `pattern`?
#[must_use]
pub fn like_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Two-pointer scan with backtracking to the most recent `%`.
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::like_match;

    #[test]
    fn exact_match_without_wildcards() {
        assert!(like_match("ERROR", "ERROR"));
        assert!(!like_match("ERROR", "ERRO"));
        assert!(!like_match("ERROR", "ERRORS"));
    }

    #[test]
    fn percent_matches_any_run() {
        assert!(like_match("%timeout%", "connection timeout reached"));
        assert!(like_match("%timeout%", "timeout"));
        assert!(!like_match("%timeout%", "time out"));
        assert!(like_match("log%", "log2024-10-2"));
    }

    #[test]
    fn underscore_matches_one_char() {
        assert!(like_match("WAR_", "WARN"));
        assert!(!like_match("WAR_", "WAR"));
        assert!(!like_match("WAR_", "WARNS"));
    }

    #[test]
    fn backtracking_across_repeated_prefixes() {
        assert!(like_match("%abc%", "ababc"));
        assert!(like_match("%a%b%", "xaxbx"));
        assert!(!like_match("%a%b%", "xbxax"));
    }

    #[test]
    fn empty_cases() {
        assert!(like_match("", ""));
        assert!(like_match("%", ""));
        assert!(!like_match("_", ""));
        assert!(!like_match("", "x"));
    }
}
