//! Collision-free naming of imported entities inside a destination
//! namespace.
//!
//! Two pieces:
//!
//! - [`derive_path`] turns a free-form slug into a URL-safe path.
//! - [`resolve_unique`] appends `_1`, `_2`, ... to a name or path until the
//!   destination reports no sibling with that value.
//!
//! Every uniqueness check is a fresh [`DestinationLookup::sibling_exists`]
//! call. Nothing is cached between checks, so a concurrent import into the
//! same namespace can still win the race; the unique constraint at creation
//! time settles that.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;
use crate::visibility::VisibilityLevel;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on `_N` suffixes tried before giving up.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

/// Characters allowed to separate words in a path.
const SEPARATORS: &[char] = &['-', '_', '.'];

/// A run of characters that may not appear in a path.
static INVALID_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_.\-]+").expect("valid regex"));

/// Two or more adjacent separators.
static SEPARATOR_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\-_.]{2,}").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The attribute a sibling collision is checked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingField {
    Name,
    Path,
}

impl SiblingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Path => "path",
        }
    }
}

impl std::fmt::Display for SiblingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved destination namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationNamespace {
    pub id: DbId,
    pub full_path: String,
    pub visibility_level: VisibilityLevel,
}

/// Read-only queries against the destination instance.
///
/// Answers must be consistent for an unmodified namespace, but are not
/// expected to be atomic with the later create.
#[async_trait]
pub trait DestinationLookup: Send + Sync {
    /// Find a namespace by its full path. `Ok(None)` when it does not exist.
    async fn find_namespace(
        &self,
        full_path: &str,
    ) -> Result<Option<DestinationNamespace>, CoreError>;

    /// Whether a project or child group of `namespace_id` already uses
    /// `value` for `field`.
    async fn sibling_exists(
        &self,
        namespace_id: DbId,
        field: SiblingField,
        value: &str,
    ) -> Result<bool, CoreError>;
}

// ---------------------------------------------------------------------------
// Path derivation
// ---------------------------------------------------------------------------

/// Derive a URL-safe path from a free-form slug.
///
/// Lower-cases, replaces every run of characters outside `[a-z0-9_.-]`
/// with `-`, collapses adjacent separators into a single `-` and trims
/// separators from both ends. Applying it to its own output is a no-op.
///
/// Returns an empty string when nothing path-safe is left.
pub fn derive_path(slug: &str) -> String {
    let lowered = slug.to_lowercase();
    let replaced = INVALID_RUN_RE.replace_all(&lowered, "-");
    let collapsed = SEPARATOR_RUN_RE.replace_all(&replaced, "-");
    collapsed.trim_matches(SEPARATORS).to_string()
}

// ---------------------------------------------------------------------------
// Uniqueness
// ---------------------------------------------------------------------------

/// Make `candidate` unique among the siblings of `namespace_id`.
///
/// Returns `candidate` unchanged when it is free, otherwise the first free
/// `candidate_N` for `N` in `1..=max_attempts`. With no namespace there is
/// nothing to collide with and no query is issued.
pub async fn resolve_unique<L>(
    lookup: &L,
    namespace_id: Option<DbId>,
    field: SiblingField,
    candidate: &str,
    max_attempts: u32,
) -> Result<String, CoreError>
where
    L: DestinationLookup + ?Sized,
{
    let Some(namespace_id) = namespace_id else {
        return Ok(candidate.to_string());
    };

    if !lookup.sibling_exists(namespace_id, field, candidate).await? {
        return Ok(candidate.to_string());
    }

    for counter in 1..=max_attempts {
        let suffixed = format!("{candidate}_{counter}");
        if !lookup.sibling_exists(namespace_id, field, &suffixed).await? {
            return Ok(suffixed);
        }
    }

    Err(CoreError::NamespaceExhausted {
        namespace_id,
        field: field.as_str(),
        value: candidate.to_string(),
        attempts: max_attempts,
    })
}
