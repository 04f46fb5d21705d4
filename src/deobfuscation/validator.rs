//! Acceptance checks for decoded strings.
//!
//! Every strategy produces guesses. A guess is kept only if it reads like text:
//!
//! - In single-character mode, exactly one printable ASCII character, space included
//! - Otherwise an embedded length prefix (a leading control character whose code
//!   equals the number of characters that follow) is stripped first
//! - The trimmed result must not be empty
//! - No control characters except `\n`, `\r` and `\t`

/// Decides whether decoded text is an acceptable string literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateValidator {
    single_char: bool,
}

impl CandidateValidator {
    /// Creates a validator for ordinary multi-character literals.
    #[must_use]
    pub fn new() -> Self {
        Self { single_char: false }
    }

    /// Creates a validator for the short-constant population.
    #[must_use]
    pub fn single_char() -> Self {
        Self { single_char: true }
    }

    /// Returns `true` in single-character mode.
    #[must_use]
    pub fn is_single_char(&self) -> bool {
        self.single_char
    }

    /// Returns the accepted literal, or `None` if `text` is rejected.
    ///
    /// The returned literal has its length prefix removed but is not trimmed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stringscope::deobfuscation::CandidateValidator;
    ///
    /// let validator = CandidateValidator::new();
    /// assert_eq!(validator.accept("hello\n").as_deref(), Some("hello\n"));
    /// assert_eq!(validator.accept("\u{5}hello").as_deref(), Some("hello"));
    /// assert_eq!(validator.accept("   "), None);
    /// assert_eq!(validator.accept("a\u{1}b"), None);
    ///
    /// assert_eq!(CandidateValidator::single_char().accept("ab"), None);
    /// ```
    #[must_use]
    pub fn accept(&self, text: &str) -> Option<String> {
        if self.single_char {
            // a lone space is a valid character literal
            let mut chars = text.chars();
            let single = chars.next().filter(|c| matches!(c, ' '..='~'))?;
            if chars.next().is_some() {
                return None;
            }
            return Some(single.to_string());
        }

        let text = strip_length_prefix(text);

        if text.trim().is_empty() {
            return None;
        }

        if text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        {
            return None;
        }

        Some(text.to_string())
    }

    /// Decodes strict UTF-8 and validates the result.
    #[must_use]
    pub fn accept_utf8(&self, bytes: &[u8]) -> Option<String> {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| self.accept(text))
    }
}

fn strip_length_prefix(text: &str) -> &str {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_control() && !matches!(first, '\n' | '\r' | '\t') => {
            let rest = chars.as_str();
            if rest.chars().count() == first as usize {
                rest
            } else {
                text
            }
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_text() {
        let validator = CandidateValidator::new();
        assert_eq!(validator.accept("hello").as_deref(), Some("hello"));
        assert_eq!(
            validator.accept("line1\r\n\tline2").as_deref(),
            Some("line1\r\n\tline2")
        );
        assert_eq!(validator.accept("  padded ").as_deref(), Some("  padded "));
        assert_eq!(validator.accept("Grüße, 世界").as_deref(), Some("Grüße, 世界"));
    }

    #[test]
    fn test_rejects_empty_and_control() {
        let validator = CandidateValidator::new();
        assert_eq!(validator.accept(""), None);
        assert_eq!(validator.accept("\t\r\n"), None);
        assert_eq!(validator.accept("abc\0"), None);
        assert_eq!(validator.accept("\u{7f}x"), None);
        assert_eq!(validator.accept("x\u{85}"), None);
    }

    #[test]
    fn test_length_prefix() {
        let validator = CandidateValidator::new();
        assert_eq!(validator.accept("\u{3}abc").as_deref(), Some("abc"));
        // prefix that does not match the remaining length is a plain control char
        assert_eq!(validator.accept("\u{4}abc"), None);
        // a prefix alone leaves nothing
        assert_eq!(validator.accept("\u{0}"), None);
    }

    #[test]
    fn test_single_char_mode() {
        let validator = CandidateValidator::single_char();
        assert!(validator.is_single_char());
        assert_eq!(validator.accept("A").as_deref(), Some("A"));
        assert_eq!(validator.accept("~").as_deref(), Some("~"));
        assert_eq!(validator.accept("AB"), None);
        assert_eq!(validator.accept("é"), None);
        assert_eq!(validator.accept(" ").as_deref(), Some(" "));
        assert_eq!(validator.accept("\t"), None);
        assert_eq!(validator.accept(""), None);
    }

    #[test]
    fn test_utf8() {
        let validator = CandidateValidator::new();
        assert_eq!(validator.accept_utf8(b"ok").as_deref(), Some("ok"));
        assert_eq!(validator.accept_utf8(&[0xC3, 0x28]), None);
    }
}
