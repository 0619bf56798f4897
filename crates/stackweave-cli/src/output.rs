//! Formatted output helpers for CLI commands.

/// Length of a digest prefix shown to humans.
const SHORT_DIGEST_LEN: usize = 12;

/// Horizontal rule of `width` box-drawing characters.
#[must_use]
pub fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

/// Leading characters of a hex digest.
#[must_use]
pub fn short_digest(digest: &str) -> &str {
    digest.get(..SHORT_DIGEST_LEN).unwrap_or(digest)
}

/// `"1 unit"`, `"3 units"`.
#[must_use]
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_has_requested_width() {
        assert_eq!(rule(3).chars().count(), 3);
    }

    #[test]
    fn short_digest_truncates() {
        assert_eq!(short_digest("0123456789abcdef"), "0123456789ab");
    }

    #[test]
    fn short_digest_keeps_short_input() {
        assert_eq!(short_digest("abc"), "abc");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "unit"), "1 unit");
        assert_eq!(plural(0, "file"), "0 files");
        assert_eq!(plural(4, "file"), "4 files");
    }
}
