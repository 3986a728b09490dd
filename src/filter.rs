use serde_json::{Map, Value};

/// Injectable sensitive-field filter.
///
/// Implementations receive a (size-limited) mapping and return it with the
/// values of configured sensitive keys replaced in place — keys stay
/// present. This mirrors how host frameworks expose parameter filtering.
/// When no filter is injected, the built-in pattern fallback
/// ([`is_sensitive_key`]) is used instead, which *removes* matched keys
/// and adds an explicit `<key>_filtered` marker.
pub trait FieldFilter: Send + Sync {
    /// Replace sensitive values in `fields` and return the result.
    ///
    /// A panicking implementation is contained by the sanitizer and turns
    /// the whole mapping into `{"sanitization_error": true}`.
    fn filter(&self, fields: Map<String, Value>) -> Map<String, Value>;
}

impl<F> FieldFilter for F
where
    F: Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync,
{
    fn filter(&self, fields: Map<String, Value>) -> Map<String, Value> {
        self(fields)
    }
}

/// Key patterns treated as sensitive by the fallback filter, matched
/// case-insensitively as whole words within the key.
pub const SENSITIVE_KEY_PATTERNS: [&str; 11] = [
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "access_token",
    "auth_token",
    "private_key",
    "credential",
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whole-word containment check: `needle` must not be glued to a word
/// character on either side. `passwords` does not match `password`, while
/// `x-password` does.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = !haystack[..start]
            .chars()
            .next_back()
            .map_or(false, is_word_char);
        let after_ok = !haystack[end..].chars().next().map_or(false, is_word_char);
        if before_ok && after_ok {
            return true;
        }
        from = start + 1;
    }
    false
}

/// Fallback sensitivity test used when no [`FieldFilter`] is injected.
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    SENSITIVE_KEY_PATTERNS
        .iter()
        .any(|pattern| contains_word(&lowered, pattern))
}

/// Convert a key to snake_case for the `<key>_filtered` marker.
///
/// Keeps the historical wire behavior: `ApiToken` filters to
/// `api_token_filtered`, not `ApiToken_filtered`.
pub(crate) fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{is_sensitive_key, snake_case};

    #[test]
    fn matches_whole_words_only() {
        assert!(is_sensitive_key("password"));
        assert!(is_sensitive_key("PASSWORD"));
        assert!(is_sensitive_key("x-password"));
        assert!(is_sensitive_key("api_key"));
        // Glued to word characters on either side: not a whole word.
        assert!(!is_sensitive_key("passwords"));
        assert!(!is_sensitive_key("user_password"));
        assert!(!is_sensitive_key("name"));
    }

    #[test]
    fn matches_every_documented_pattern() {
        for pattern in super::SENSITIVE_KEY_PATTERNS {
            assert!(is_sensitive_key(pattern), "pattern {pattern:?} must match itself");
        }
    }

    #[test]
    fn snake_cases_camel_keys() {
        assert_eq!(snake_case("ApiToken"), "api_token");
        assert_eq!(snake_case("password"), "password");
        assert_eq!(snake_case("x-api-key"), "x_api_key");
        assert_eq!(snake_case("userId42"), "user_id42");
    }
}
