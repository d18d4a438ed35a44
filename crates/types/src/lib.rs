//! Validated primitive types shared across the screening crates.
//!
//! Each type checks its invariant once at construction, so holders can rely on it
//! without re-validating:
//! - [`NonEmptyText`]: trimmed text with at least one non-whitespace character
//! - [`WordLimitedText`]: free text capped at a number of words (may be empty)
//! - [`PermissionName`]: a permission of the form `<app_label>.<name>`

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input text has more words than allowed
    #[error("Text must be {max} words or less, got {actual}")]
    TooManyWords { max: usize, actual: usize },

    /// The permission name is not of the form `<app_label>.<name>`
    #[error("Permission must have the format \"<app_label>.<name>\", got '{0}'")]
    InvalidPermissionName(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, returning [`TextError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(s).map_err(serde::de::Error::custom)
    }
}

/// Free text limited to `MAX` whitespace-separated words.
///
/// Unlike [`NonEmptyText`] this may be empty; notes for image readers and
/// "provide details" fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WordLimitedText<const MAX: usize>(String);

impl<const MAX: usize> WordLimitedText<MAX> {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        let actual = trimmed.split_whitespace().count();
        if actual > MAX {
            return Err(TextError::TooManyWords { max: MAX, actual });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const MAX: usize> fmt::Display for WordLimitedText<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const MAX: usize> serde::Serialize for WordLimitedText<MAX> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de, const MAX: usize> serde::Deserialize<'de> for WordLimitedText<MAX> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        WordLimitedText::new(s).map_err(serde::de::Error::custom)
    }
}

/// A named permission of the form `<app_label>.<name>`.
///
/// Both parts must be non-empty and contain no whitespace. The split happens at the
/// first `.`, so the name part may itself contain dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionName {
    full: String,
    split: usize,
}

impl PermissionName {
    pub fn parse(input: &str) -> Result<Self, TextError> {
        let invalid = || TextError::InvalidPermissionName(input.to_owned());

        if input.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (app_label, name) = input.split_once('.').ok_or_else(invalid)?;
        if app_label.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            full: input.to_owned(),
            split: app_label.len(),
        })
    }

    pub fn app_label(&self) -> &str {
        &self.full[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.full[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl FromStr for PermissionName {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl serde::Serialize for PermissionName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.full)
    }
}

impl<'de> serde::Deserialize<'de> for PermissionName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PermissionName::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Jane  ").unwrap();
        assert_eq!(text.as_str(), "Jane");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new(" \n\t").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn non_empty_text_deserialize_rejects_empty() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"   \"");
        assert!(result.is_err());
    }

    #[test]
    fn word_limited_text_counts_words() {
        let ok = WordLimitedText::<3>::new("one two  three").unwrap();
        assert_eq!(ok.as_str(), "one two  three");

        let err = WordLimitedText::<3>::new("one two three four").unwrap_err();
        assert_eq!(err, TextError::TooManyWords { max: 3, actual: 4 });
    }

    #[test]
    fn word_limited_text_allows_empty() {
        let text = WordLimitedText::<500>::new("   ").unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn permission_name_splits_at_first_dot() {
        let perm = PermissionName::parse("mammograms.do_appointment").unwrap();
        assert_eq!(perm.app_label(), "mammograms");
        assert_eq!(perm.name(), "do_appointment");

        let dotted = PermissionName::parse("a.b.c").unwrap();
        assert_eq!(dotted.app_label(), "a");
        assert_eq!(dotted.name(), "b.c");
    }

    #[test]
    fn permission_name_rejects_bad_formats() {
        for bad in ["nodot", ".name", "app.", "", "app .name", "app.na me"] {
            assert!(
                matches!(
                    PermissionName::parse(bad),
                    Err(TextError::InvalidPermissionName(_))
                ),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn permission_name_round_trips_through_serde() {
        let perm: PermissionName = serde_json::from_str("\"clinics.view_clinics\"").unwrap();
        assert_eq!(perm.to_string(), "clinics.view_clinics");
        assert!(serde_json::from_str::<PermissionName>("\"clinics\"").is_err());
    }
}
