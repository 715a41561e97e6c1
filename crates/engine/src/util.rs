//! Internal helpers for input normalization and id conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Canonical form of a username: NFKC, lowercase, trimmed.
///
/// Usernames are the user id everywhere (memberships, payers, settlements),
/// so two spellings of the same name must collapse to one key.
pub(crate) fn normalize_username(value: &str) -> ResultEngine<String> {
    let normalized: String = value.trim().nfkc().flat_map(char::to_lowercase).collect();
    if normalized.is_empty() {
        return Err(EngineError::InvalidName(
            "username must not be empty".to_string(),
        ));
    }
    if normalized.chars().any(char::is_whitespace) {
        return Err(EngineError::InvalidName(format!(
            "username must not contain whitespace: {normalized}"
        )));
    }
    Ok(normalized)
}

/// Trim and collapse inner whitespace; reject empty names.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(collapsed)
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}
