//! Visibility levels for imported projects and their destination
//! namespaces.
//!
//! The source instance exports visibility as a string; the destination
//! stores it as an integer level. The mapping is fixed.

use serde::{Deserialize, Serialize};

/// Integer level stored for private entities.
pub const PRIVATE_LEVEL: i32 = 0;

/// Integer level stored for internal entities.
pub const INTERNAL_LEVEL: i32 = 10;

/// Integer level stored for public entities.
pub const PUBLIC_LEVEL: i32 = 20;

/// Visibility of a project or namespace.
///
/// Variants are declared from least to most visible so the derived
/// `Ord` matches the integer levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLevel {
    Private,
    Internal,
    Public,
}

impl VisibilityLevel {
    /// Return the visibility name as exported by the source instance.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Internal => "internal",
            Self::Public => "public",
        }
    }

    /// Parse an exported visibility string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "internal" => Some(Self::Internal),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    /// The integer level stored in the database.
    pub fn level(&self) -> i32 {
        match self {
            Self::Private => PRIVATE_LEVEL,
            Self::Internal => INTERNAL_LEVEL,
            Self::Public => PUBLIC_LEVEL,
        }
    }

    /// Map a stored integer level back to a variant.
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            PRIVATE_LEVEL => Some(Self::Private),
            INTERNAL_LEVEL => Some(Self::Internal),
            PUBLIC_LEVEL => Some(Self::Public),
            _ => None,
        }
    }

    /// Clamp to `max`. A project is never more visible than its namespace.
    pub fn capped_to(self, max: Self) -> Self {
        self.min(max)
    }
}

impl std::fmt::Display for VisibilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_strings_map_to_fixed_levels() {
        assert_eq!(VisibilityLevel::from_str("private").map(|v| v.level()), Some(0));
        assert_eq!(VisibilityLevel::from_str("internal").map(|v| v.level()), Some(10));
        assert_eq!(VisibilityLevel::from_str("public").map(|v| v.level()), Some(20));
    }

    #[test]
    fn unknown_string_is_none() {
        assert_eq!(VisibilityLevel::from_str("bogus"), None);
        assert_eq!(VisibilityLevel::from_str("Private"), None);
        assert_eq!(VisibilityLevel::from_str(""), None);
    }

    #[test]
    fn every_level_parses_back() {
        for level in [
            VisibilityLevel::Private,
            VisibilityLevel::Internal,
            VisibilityLevel::Public,
        ] {
            assert_eq!(VisibilityLevel::from_str(level.as_str()), Some(level));
            assert_eq!(VisibilityLevel::from_level(level.level()), Some(level));
        }
    }

    #[test]
    fn unknown_level_is_none() {
        assert_eq!(VisibilityLevel::from_level(5), None);
    }

    #[test]
    fn cap_lowers_to_namespace_level() {
        assert_eq!(
            VisibilityLevel::Public.capped_to(VisibilityLevel::Internal),
            VisibilityLevel::Internal
        );
        assert_eq!(
            VisibilityLevel::Private.capped_to(VisibilityLevel::Public),
            VisibilityLevel::Private
        );
    }
}
