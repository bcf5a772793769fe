//! Clean-up of user-supplied identifiers before lookup or storage.

pub trait Sanitizer: Send + Sync + core::fmt::Debug {
    fn sanitize(&self, input: &str) -> String;
}

/// Drops markup tags and control characters, then trims whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictSanitizer;

impl Sanitizer for StrictSanitizer {
    fn sanitize(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut in_tag = false;

        for c in input.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if in_tag => {}
                c if c.is_control() => {}
                c => out.push(c),
            }
        }

        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_markup_and_whitespace() {
        let s = StrictSanitizer;
        assert_eq!(s.sanitize("  alice  "), "alice");
        assert_eq!(s.sanitize("<script>alert(1)</script>bob"), "alert(1)bob");
        assert_eq!(s.sanitize("<b></b>"), "");
        assert_eq!(s.sanitize("car\u{0}ol\n"), "carol");
    }

    proptest! {
        #[test]
        fn output_never_contains_tags_or_controls(input in "\\PC{0,64}|[<>a-z\\t\\n]{0,64}") {
            let out = StrictSanitizer.sanitize(&input);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.chars().any(char::is_control));
            prop_assert_eq!(out.trim(), out.as_str());
        }

        #[test]
        fn plain_identifiers_are_unchanged(input in "[a-zA-Z0-9_.-]{1,32}") {
            prop_assert_eq!(StrictSanitizer.sanitize(&input), input);
        }
    }
}
