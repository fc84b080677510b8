//! # Input Validation
//!
//! Security-focused helpers that turn untrusted JSON input into plain strings and
//! check package and version documents before anything reaches the store.
//!
//! Coercion guards against structural injection: an object or array supplied
//! where a scalar is expected is flattened to its JSON text instead of being
//! passed through as a nested document.

use crate::config::LimitsConfig;
use crate::error::ValidationErrors;
use crate::types::VersionData;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Maximum allowed version string length
pub const MAX_VERSION_LENGTH: usize = 64;

/// Lowercase alphanumerics separated by single dashes, no leading or trailing dash
pub fn package_name_pattern() -> &'static Regex {
    static PACKAGE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    PACKAGE_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap_or_else(|e| {
            panic!("Failed to compile package name regex: {}. This is a bug in the code - the regex pattern should be valid.", e)
        })
    })
}

/// Numeric segments with at least two dots, optionally followed by a dotted
/// pre-release tag (`1.0.2`, `0.0.0.1`, `1.0.2-a.1`)
pub fn version_name_pattern() -> &'static Regex {
    static VERSION_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    VERSION_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[0-9]+(?:\.[0-9]+){2,}(?:-[0-9A-Za-z]+(?:\.[0-9A-Za-z]+)*)?$")
            .unwrap_or_else(|e| {
                panic!("Failed to compile version name regex: {}. This is a bug in the code - the regex pattern should be valid.", e)
            })
    })
}

/// String form of an untrusted scalar. Strings pass through unquoted,
/// everything else becomes its JSON text.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JavaScript-style truthiness used when deciding whether an optional field was supplied
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Base64 encodes 3 bytes as 4 characters
pub fn estimated_decoded_size(encoded: &str) -> u64 {
    let trimmed = encoded.trim_end_matches('=');
    (trimmed.len() as u64 * 3) / 4
}

pub fn validate_package_name(name: &str, limits: &LimitsConfig) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if name.is_empty() {
        errors.add("name", "name is required");
    } else if name.len() > limits.max_package_name_length {
        errors.add(
            "name",
            format!(
                "name exceeds maximum length of {} characters",
                limits.max_package_name_length
            ),
        );
    } else if !package_name_pattern().is_match(name) {
        errors.add(
            "name",
            format!(
                "`{name}` is not a valid package name: use lowercase letters, digits and single dashes"
            ),
        );
    }

    errors
}

/// Synchronous checks run before a version touches any store
pub fn validate_version(data: &VersionData, limits: &LimitsConfig) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    match data.name.as_deref() {
        None | Some("") => errors.add("name", "name is required"),
        Some(name) if name.len() > MAX_VERSION_LENGTH => errors.add(
            "name",
            format!("name exceeds maximum length of {MAX_VERSION_LENGTH} characters"),
        ),
        Some(name) if !version_name_pattern().is_match(name) => {
            errors.add("name", format!("`{name}` is not a valid version name"))
        }
        Some(_) => {}
    }

    match data.archive.as_deref() {
        None | Some("") => errors.add("archive", "archive is required"),
        Some(archive) => {
            let size = estimated_decoded_size(archive);
            if size > limits.max_artifact_size {
                errors.add(
                    "archive",
                    format!(
                        "archive exceeds maximum size of {} bytes",
                        limits.max_artifact_size
                    ),
                );
            }
        }
    }

    if let Some(description) = data.description.as_deref() {
        if description.len() > limits.max_description_length {
            errors.add(
                "description",
                format!(
                    "description exceeds maximum length of {} characters",
                    limits.max_description_length
                ),
            );
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_package_name_pattern() {
        for valid in ["left-pad", "a", "abc123", "x-1-y"] {
            assert!(package_name_pattern().is_match(valid), "{valid}");
        }
        for invalid in ["-pad", "pad-", "left--pad", "Left", "left_pad", ""] {
            assert!(!package_name_pattern().is_match(invalid), "{invalid}");
        }
    }

    #[test]
    fn test_version_name_pattern() {
        for valid in ["0.0.0", "1.0.2-a.1", "10.20.30", "1.2.3.4"] {
            assert!(version_name_pattern().is_match(valid), "{valid}");
        }
        for invalid in ["1.0", "v1.0.0", "1..0", "1.0.0-", "a.b.c"] {
            assert!(!version_name_pattern().is_match(invalid), "{invalid}");
        }
    }

    #[test]
    fn test_coercion_and_truthiness() {
        assert_eq!(coerce_string(&json!("1.0.0")), "1.0.0");
        assert_eq!(coerce_string(&json!(42)), "42");
        assert_eq!(coerce_string(&json!({"$gt": ""})), r#"{"$gt":""}"#);
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&Value::Null));
        assert!(is_truthy(&json!("text")));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_validate_version_reports_each_field() {
        let limits = LimitsConfig::default();
        let errors = validate_version(&VersionData::default(), &limits);
        let messages: Vec<_> = errors.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["name is required", "archive is required"]);

        let data = VersionData {
            name: Some("1.0".into()),
            archive: Some("aGVsbG8=".into()),
            description: None,
        };
        let errors = validate_version(&data, &limits);
        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.errors()[0].field, "name");
    }

    #[test]
    fn test_validate_version_rejects_oversized_archive() {
        let limits = LimitsConfig {
            max_artifact_size: 3,
            ..LimitsConfig::default()
        };
        let data = VersionData {
            name: Some("1.0.0".into()),
            archive: Some("aGVsbG8gd29ybGQ=".into()),
            description: None,
        };
        let errors = validate_version(&data, &limits);
        assert!(errors.to_string().contains("archive exceeds maximum size"));
    }

    #[test]
    fn test_validate_package_name() {
        let limits = LimitsConfig::default();
        assert!(validate_package_name("left-pad", &limits).is_empty());
        assert_eq!(
            validate_package_name("", &limits).to_string(),
            "name is required"
        );
        assert!(!validate_package_name("Left_Pad", &limits).is_empty());
    }
}
