//! Clock and identifier services for the screening workflow.
//!
//! The workflow core never calls `Utc::now()` or `Uuid::new_v4()` directly. Both effects are
//! injected so that tests can pin time and identifiers:
//! - [`Clock`] with [`SystemClock`] (strictly increasing wall-clock time) and [`ManualClock`]
//! - [`IdMinter`] with [`RandomIdMinter`] (UUID v4) and [`SequentialIdMinter`]
//!
//! ## Canonical UUID form
//! Identifiers are displayed and parsed in a *canonical* representation: **32 lowercase
//! hexadecimal characters** (no hyphens), e.g. `550e8400e29b41d4a716446655440000`.
//! This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected.
//!
//! Typed record identifiers are declared with [`record_id!`], which wraps a [`Uuid`] and uses
//! the canonical form for `Display`, `FromStr` and serde.

mod canonical;
mod clock;
mod minter;

pub use canonical::CanonicalUuid;
pub use clock::{Clock, ManualClock, SystemClock};
pub use minter::{IdMinter, RandomIdMinter, SequentialIdMinter};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

#[doc(hidden)]
pub use ::serde as __serde;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;

/// Declares a `Copy` newtype identifier over [`Uuid`].
///
/// The generated type displays, parses and serialises in canonical form.
///
/// ```
/// screening_ids::record_id!(
///     /// Identifies a clinic.
///     ClinicId
/// );
///
/// let id = ClinicId::from_uuid(screening_ids::Uuid::from_u128(1));
/// assert_eq!(id.to_string(), "00000000000000000000000000000001");
/// assert_eq!(id.to_string().parse::<ClinicId>().unwrap(), id);
/// ```
#[macro_export]
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($crate::Uuid);

        impl $name {
            pub fn from_uuid(uuid: $crate::Uuid) -> Self {
                Self(uuid)
            }

            pub fn uuid(&self) -> $crate::Uuid {
                self.0
            }

            /// Parses an identifier that must already be in canonical form.
            pub fn parse(input: &str) -> $crate::IdResult<Self> {
                $crate::CanonicalUuid::parse(input).map(|c| Self(c.uuid()))
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl $crate::__serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::__serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> $crate::__serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: $crate::__serde::Deserializer<'de>,
            {
                let s = <::std::string::String as $crate::__serde::Deserialize>::deserialize(
                    deserializer,
                )?;
                Self::parse(&s).map_err(<D::Error as $crate::__serde::de::Error>::custom)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    record_id!(
        /// Test identifier.
        WidgetId
    );

    #[test]
    fn record_id_displays_canonical_form() {
        let id = WidgetId::from_uuid(Uuid::from_u128(0xabc));
        assert_eq!(id.to_string(), "00000000000000000000000000000abc");
    }

    #[test]
    fn record_id_rejects_hyphenated_input() {
        let err = WidgetId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap_err();
        assert!(matches!(err, IdError::InvalidInput(_)));
    }

    #[test]
    fn record_id_serde_uses_canonical_string() {
        let id = WidgetId::from_uuid(Uuid::from_u128(7));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000000000000000000000000007\"");

        let back: WidgetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
