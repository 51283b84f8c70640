// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact message validator.
//!
//! Checks, in order:
//! - both fields present and non-empty
//! - message length within the configured limit
//! - email length within the configured limit
//!
//! Lengths are counted in characters, not bytes.

use crate::config::RelayConfig;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("Email is {len} characters, limit is {max}")]
    EmailTooLong { len: usize, max: usize },
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Message is valid
    Valid,
    /// Message is invalid
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }
}

/// Contact message validator.
pub struct ContactValidator {
    max_message_len: usize,
    max_email_len: usize,
}

impl ContactValidator {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            max_message_len: config.max_message_len,
            max_email_len: config.max_email_len,
        }
    }

    pub fn validate(&self, email: Option<&str>, message: Option<&str>) -> ValidationResult {
        let message = match message {
            Some(m) if !m.is_empty() => m,
            _ => {
                debug!("Missing message field");
                return ValidationResult::Invalid(ValidationError::MissingField("message"));
            }
        };

        let email = match email {
            Some(e) if !e.is_empty() => e,
            _ => {
                debug!("Missing email field");
                return ValidationResult::Invalid(ValidationError::MissingField("email"));
            }
        };

        let message_len = message.chars().count();
        if message_len > self.max_message_len {
            debug!(len = message_len, "Message too long");
            return ValidationResult::Invalid(ValidationError::MessageTooLong {
                len: message_len,
                max: self.max_message_len,
            });
        }

        let email_len = email.chars().count();
        if email_len > self.max_email_len {
            debug!(len = email_len, "Email too long");
            return ValidationResult::Invalid(ValidationError::EmailTooLong {
                len: email_len,
                max: self.max_email_len,
            });
        }

        ValidationResult::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ContactValidator {
        ContactValidator::new(&RelayConfig::default())
    }

    #[test]
    fn test_valid_message() {
        let result = validator().validate(Some("me@example.com"), Some("hello there"));
        assert!(result.is_valid());
        assert!(result.error().is_none());
    }

    #[test]
    fn test_empty_and_missing_fields() {
        let v = validator();
        assert_eq!(
            v.validate(Some(""), Some("hi")).error(),
            Some(&ValidationError::MissingField("email"))
        );
        assert_eq!(
            v.validate(Some("a@b.c"), Some("")).error(),
            Some(&ValidationError::MissingField("message"))
        );
        assert_eq!(
            v.validate(None, None).error(),
            Some(&ValidationError::MissingField("message"))
        );
    }

    #[test]
    fn test_message_length_boundary() {
        let v = validator();
        assert!(v.validate(Some("a@b.c"), Some(&"x".repeat(1000))).is_valid());
        assert_eq!(
            v.validate(Some("a@b.c"), Some(&"x".repeat(1001))).error(),
            Some(&ValidationError::MessageTooLong { len: 1001, max: 1000 })
        );
    }

    #[test]
    fn test_email_length_boundary() {
        let v = validator();
        assert!(v.validate(Some(&"e".repeat(500)), Some("hi")).is_valid());
        assert!(matches!(
            v.validate(Some(&"e".repeat(501)), Some("hi")).error(),
            Some(ValidationError::EmailTooLong { len: 501, .. })
        ));
    }

    #[test]
    fn test_lengths_count_characters() {
        // 1000 two-byte characters is within the limit
        let message = "é".repeat(1000);
        assert!(validator().validate(Some("a@b.c"), Some(&message)).is_valid());
    }

    #[test]
    fn test_message_checked_before_email() {
        let result = validator().validate(Some(&"e".repeat(501)), Some(&"x".repeat(1001)));
        assert!(matches!(
            result.error(),
            Some(ValidationError::MessageTooLong { .. })
        ));
    }
}
