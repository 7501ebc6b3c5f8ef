//! Boundary validation (§6.2). Core handlers call these before touching the
//! repository; the HTTP shell maps the resulting [`Error::Validation`] to
//! `400`.

use crate::error::{Error, Result};

const ID_CHARSET: fn(char) -> bool =
    |c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-';

/// `tenant_id`: 1..64 chars, `[A-Za-z0-9_.-]`.
pub fn validate_tenant_id(value: &str) -> Result<()> {
    validate_identifier(value, "tenant_id", 64)
}

/// `conversation_id`: 1..128 chars, `[A-Za-z0-9_.-]`.
pub fn validate_conversation_id(value: &str) -> Result<()> {
    validate_identifier(value, "conversation_id", 128)
}

fn validate_identifier(value: &str, field: &str, max_len: usize) -> Result<()> {
    if value.is_empty() || value.chars().count() > max_len {
        return Err(Error::Validation(format!(
            "{field} must be 1..{max_len} chars"
        )));
    }
    if !value.chars().all(ID_CHARSET) {
        return Err(Error::Validation(format!(
            "{field} must match [A-Za-z0-9_.-]"
        )));
    }
    Ok(())
}

/// `content`: trimmed non-empty, <= 100_000 chars. Returns the trimmed
/// string.
pub fn validate_content(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("content must not be empty".to_string()));
    }
    if trimmed.chars().count() > 100_000 {
        return Err(Error::Validation(
            "content must not exceed 100000 chars".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// `importance_override`: clamp to `[0, 1]`. Defense-in-depth alongside the
/// schema-level bound (§9 open question: one clamp layer suffices, the
/// other is cheap redundancy).
#[must_use]
pub fn clamp_importance(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_tenant_id() {
        assert!(validate_tenant_id("tenant-1.prod").is_ok());
    }

    #[test]
    fn rejects_empty_and_overlong_tenant_id() {
        assert!(validate_tenant_id("").is_err());
        assert!(validate_tenant_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn rejects_bad_charset() {
        assert!(validate_tenant_id("tenant/1").is_err());
    }

    #[test]
    fn trims_and_validates_content() {
        assert_eq!(validate_content("  hi  ").unwrap(), "hi");
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"a".repeat(100_001)).is_err());
    }

    #[test]
    fn clamps_importance_override() {
        assert_eq!(clamp_importance(-0.5), 0.0);
        assert_eq!(clamp_importance(1.5), 1.0);
        assert_eq!(clamp_importance(0.4), 0.4);
    }
}
