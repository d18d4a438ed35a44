//! Canonical UUID parsing.

use crate::{IdError, IdResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// A UUID known to have been supplied in canonical form (32 lowercase hex characters, no
/// hyphens).
///
/// Use this when accepting identifiers from outside the core (CLI arguments, scripted
/// input). Once constructed, `Display` always produces the same canonical string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalUuid(Uuid);

impl CanonicalUuid {
    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (for example, hyphenated or
    /// uppercase).
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> IdResult<Self> {
        if !Self::is_canonical(input) {
            return Err(IdError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }

        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| IdError::InvalidInput(format!("invalid UUID '{}': {}", input, e)))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is exactly 32 bytes of `0-9a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for CanonicalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for CanonicalUuid {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let parsed = CanonicalUuid::parse(canonical).unwrap();
        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        match CanonicalUuid::parse("550e8400-e29b-41d4-a716-446655440000") {
            Err(IdError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            other => panic!("Expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_uuid() {
        assert!(CanonicalUuid::parse("550E8400E29B41D4A716446655440000").is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(CanonicalUuid::parse("550e8400").is_err());
        assert!(CanonicalUuid::parse("").is_err());
    }

    #[test]
    fn test_display_matches_simple_form() {
        let uuid = Uuid::new_v4();
        assert_eq!(
            CanonicalUuid::from_uuid(uuid).to_string(),
            uuid.simple().to_string()
        );
    }
}
