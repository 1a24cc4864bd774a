//! Validation helpers for DTOs.

use std::{collections::BTreeSet, time::SystemTime};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use validator::ValidationError;

/// Age group label kept verbatim instead of being split into tokens.
pub const MIXED_AGES: &str = "Mixed Ages";

/// Parse an RFC 3339 timestamp such as `2026-05-01T18:30:00Z`.
pub fn parse_rfc3339(value: &str) -> Option<SystemTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .ok()
        .map(SystemTime::from)
}

/// Validates that a timestamp is RFC 3339.
pub fn validate_rfc3339(value: &str) -> Result<(), ValidationError> {
    if parse_rfc3339(value).is_some() {
        return Ok(());
    }

    let mut err = ValidationError::new("rfc3339");
    err.message = Some(format!("`{value}` is not an RFC 3339 timestamp").into());
    Err(err)
}

/// Normalize an age group: comma separated tokens are trimmed, deduplicated and sorted.
///
/// The literal [`MIXED_AGES`] is returned unchanged. Returns `None` when no token remains.
///
/// ```ignore
/// normalize_age_group("2011, 2010, 2011") // Some("2010, 2011")
/// normalize_age_group("Mixed Ages")       // Some("Mixed Ages")
/// normalize_age_group(" , ")              // None
/// ```
pub fn normalize_age_group(raw: &str) -> Option<String> {
    if raw == MIXED_AGES {
        return Some(raw.to_owned());
    }

    let tokens: BTreeSet<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.into_iter().collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_age_group_sorts_and_dedupes() {
        assert_eq!(
            normalize_age_group("2011, 2010, 2011").as_deref(),
            Some("2010, 2011")
        );
        assert_eq!(normalize_age_group("U12").as_deref(), Some("U12"));
        assert_eq!(
            normalize_age_group("b,a , B").as_deref(),
            Some("B, a, b")
        );
    }

    #[test]
    fn test_normalize_age_group_keeps_mixed_ages() {
        assert_eq!(normalize_age_group(MIXED_AGES).as_deref(), Some(MIXED_AGES));
    }

    #[test]
    fn test_normalize_age_group_empty() {
        assert_eq!(normalize_age_group(""), None);
        assert_eq!(normalize_age_group(" , ,"), None);
    }

    #[test]
    fn test_validate_rfc3339() {
        assert!(validate_rfc3339("2026-05-01T18:30:00Z").is_ok());
        assert!(validate_rfc3339("2026-05-01T18:30:00+02:00").is_ok());
        assert!(validate_rfc3339("2026-05-01").is_err());
        assert!(validate_rfc3339("tomorrow").is_err());
    }
}
