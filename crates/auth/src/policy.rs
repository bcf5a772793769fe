//! Password strength rules for new passwords.

use thiserror::Error;

use crate::config::{PolicyConfig, PolicyMode};

/// A single failed password rule.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("password is empty")]
    Empty,

    #[error("password is shorter than {min} characters")]
    TooShort { min: usize },

    #[error("password is longer than {max} characters")]
    TooLong { max: usize },

    #[error("password has no upper-case letter")]
    MissingUppercase,

    #[error("password has no lower-case letter")]
    MissingLowercase,

    #[error("password has no digit")]
    MissingDigit,

    #[error("password has no symbol")]
    MissingSymbol,
}

impl PolicyViolation {
    /// Stable rule name.
    pub fn rule(&self) -> &'static str {
        match self {
            PolicyViolation::Empty => "empty",
            PolicyViolation::TooShort { .. } => "too_short",
            PolicyViolation::TooLong { .. } => "too_long",
            PolicyViolation::MissingUppercase => "missing_uppercase",
            PolicyViolation::MissingLowercase => "missing_lowercase",
            PolicyViolation::MissingDigit => "missing_digit",
            PolicyViolation::MissingSymbol => "missing_symbol",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    config: PolicyConfig,
}

impl PasswordPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn is_strict(&self) -> bool {
        self.config.mode == PolicyMode::Strict
    }

    /// First failing rule, in declaration order.
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        match self.violations(password).into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every failing rule.
    pub fn violations(&self, password: &str) -> Vec<PolicyViolation> {
        if password.is_empty() {
            return vec![PolicyViolation::Empty];
        }
        if !self.is_strict() {
            return Vec::new();
        }

        let mut violations = Vec::new();
        let len = password.chars().count();

        if len < self.config.min_length {
            violations.push(PolicyViolation::TooShort {
                min: self.config.min_length,
            });
        }
        if let Some(max) = self.config.max_length {
            if len > max {
                violations.push(PolicyViolation::TooLong { max });
            }
        }
        if !password.chars().any(char::is_uppercase) {
            violations.push(PolicyViolation::MissingUppercase);
        }
        if !password.chars().any(char::is_lowercase) {
            violations.push(PolicyViolation::MissingLowercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::MissingDigit);
        }
        if !password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            violations.push(PolicyViolation::MissingSymbol);
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strict() -> PasswordPolicy {
        PasswordPolicy::new(PolicyConfig {
            mode: PolicyMode::Strict,
            min_length: 8,
            max_length: None,
        })
    }

    fn permissive() -> PasswordPolicy {
        PasswordPolicy::new(PolicyConfig {
            mode: PolicyMode::Permissive,
            ..PolicyConfig::default()
        })
    }

    #[test]
    fn strict_policy_accepts_a_complex_password() {
        assert_eq!(strict().validate("Str0ng!Pass99"), Ok(()));
    }

    #[test]
    fn strict_policy_rejects_short_simple_password() {
        let policy = strict();
        assert_eq!(policy.validate("abc"), Err(PolicyViolation::TooShort { min: 8 }));
        assert_eq!(
            policy.violations("abc"),
            vec![
                PolicyViolation::TooShort { min: 8 },
                PolicyViolation::MissingUppercase,
                PolicyViolation::MissingDigit,
                PolicyViolation::MissingSymbol,
            ]
        );
    }

    #[test]
    fn each_character_class_is_a_named_rule() {
        let policy = strict();
        assert_eq!(policy.validate("str0ng!pass99").unwrap_err().rule(), "missing_uppercase");
        assert_eq!(policy.validate("STR0NG!PASS99").unwrap_err().rule(), "missing_lowercase");
        assert_eq!(policy.validate("Strong!Passxx").unwrap_err().rule(), "missing_digit");
        assert_eq!(policy.validate("Str0ngPass99").unwrap_err().rule(), "missing_symbol");
    }

    #[test]
    fn max_length_applies_when_configured() {
        let policy = PasswordPolicy::new(PolicyConfig {
            mode: PolicyMode::Strict,
            min_length: 8,
            max_length: Some(16),
        });
        assert_eq!(
            policy.validate("Str0ng!Pass99-and-then-some"),
            Err(PolicyViolation::TooLong { max: 16 })
        );
    }

    #[test]
    fn permissive_policy_only_rejects_empty() {
        let policy = permissive();
        assert_eq!(policy.validate(""), Err(PolicyViolation::Empty));
        assert_eq!(policy.validate("abc"), Ok(()));
    }

    proptest! {
        #[test]
        fn permissive_accepts_any_non_empty_input(password in ".{1,64}") {
            prop_assert!(permissive().validate(&password).is_ok());
        }

        #[test]
        fn strict_accepts_every_password_with_all_classes(
            upper in "[A-Z]{1,4}",
            lower in "[a-z]{1,4}",
            digit in "[0-9]{1,4}",
            symbol in "[!@#$%^&*]{1,4}",
            padding in "[a-z]{4}",
        ) {
            let password = format!("{upper}{lower}{digit}{symbol}{padding}");
            prop_assert!(strict().validate(&password).is_ok());
        }

        #[test]
        fn strict_rejects_anything_without_a_digit(password in "[A-Za-z!@#]{8,20}") {
            prop_assert!(strict().violations(&password).contains(&PolicyViolation::MissingDigit));
        }
    }
}
