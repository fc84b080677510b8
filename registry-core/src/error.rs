//! # Error Handling
//!
//! This module defines the error taxonomy shared by every lifecycle operation of the
//! registry core, together with a machine-readable classification that the outer
//! HTTP layer can map onto status codes without re-deriving it.
//!
//! ## Key Types
//!
//! - [`RegistryError`]: Main error enum covering all possible core errors
//! - [`ValidationErrors`]: Field-level validation messages, surfaced verbatim
//! - [`ErrorCode`]: Machine-readable error classification
//! - [`ErrorResponse`]: Standardized serialisable error body
//! - [`RegistryResult<T>`]: Convenience type alias for Results using `RegistryError`
//!
//! ## Error Classifications
//!
//! - **Validation Errors** (400): missing or malformed fields, oversized artifacts
//! - **Invalid Operation** (400): business rules such as removing a package's last version
//! - **Forbidden** (403): the actor's role lacks the required permission
//! - **Not Found** (404): missing packages or versions
//! - **Conflict** (409): duplicate package or version names
//! - **Dependency** (502): the search engine failed
//! - **Internal** (500): misconfiguration and I/O failures

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collection of field-level validation failures for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a single failing field
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Merge the errors of a nested document, prefixing their field paths
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for error in other.errors {
            self.errors.push(FieldError {
                field: format!("{prefix}.{}", error.field),
                message: error.message,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns `Ok(())` when nothing was recorded, the collected errors otherwise
    pub fn into_result(self) -> RegistryResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    InvalidOperation,
    Forbidden,
    NotFound,
    Conflict,
    DependencyError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InvalidOperation => "invalid_operation",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::DependencyError => "dependency_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    /// HTTP status the outer layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError | ErrorCode::InvalidOperation => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::DependencyError => 502,
            ErrorCode::InternalError => 500,
        }
    }
}

/// Registry core error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Search engine error: {0}")]
    Dependency(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RegistryError {
    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RegistryError::Validation(_) | RegistryError::Base64(_) => ErrorCode::ValidationError,
            RegistryError::InvalidOperation(_) => ErrorCode::InvalidOperation,
            RegistryError::Forbidden(_) => ErrorCode::Forbidden,
            RegistryError::NotFound(_) => ErrorCode::NotFound,
            RegistryError::Conflict(_) => ErrorCode::Conflict,
            RegistryError::Dependency(_) => ErrorCode::DependencyError,
            RegistryError::InvalidRole(_)
            | RegistryError::InvalidPermission(_)
            | RegistryError::Io(_)
            | RegistryError::Json(_)
            | RegistryError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get additional error details if available
    pub fn details(&self) -> Option<Value> {
        match self {
            RegistryError::Validation(errors) => Some(json!({ "fields": errors.errors() })),
            RegistryError::Internal(e) => e
                .source()
                .map(|source| json!({ "source": source.to_string() })),
            _ => None,
        }
    }

    /// Create a standardized error response
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.error_code().as_str().to_string(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standardized error body for consistent error reporting at the boundary
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,          // Human-readable error message
    pub code: String,           // Machine-readable error code
    pub details: Option<Value>, // Additional error details
    pub timestamp: String,      // ISO 8601 timestamp
}

/// Convenient result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
