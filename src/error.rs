//! Error handling for the mapper
//!
//! This module provides:
//! - A single typed error enum covering every mapping and conversion failure
//! - Stable error codes with categories for metrics
//! - Process-wide error metrics

use crate::model::RdfKey;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use thiserror::Error;

pub type Result<T, E = MapperError> = std::result::Result<T, E>;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable identifiers for every failure the mapper reports
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[repr(i32)]
pub enum ErrorCode {
    /// No statements exist for the requested key
    NotFound = 1001,
    /// An entity type declaration cannot be turned into mapping metadata
    MappingError = 1002,
    /// An interface declaration cannot be implemented by the generator
    ShapeError = 1003,
    /// A literal does not fit the declared property type
    TypingError = 1004,
    /// An instance could not be converted to or from statements
    ConversionError = 1005,
    /// A key was empty or malformed
    InvalidKey = 1006,
    /// The triple source failed
    SourceError = 1007,
    /// Configuration could not be loaded or applied
    ConfigError = 1008,
}

impl ErrorCode {
    /// Get the integer code
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Errors caused by the data rather than by a declaration; the caller can
    /// fix the input and try again with the same types.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NotFound
                | ErrorCode::TypingError
                | ErrorCode::ConversionError
                | ErrorCode::InvalidKey
                | ErrorCode::SourceError
        )
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::MappingError | ErrorCode::ShapeError => "declaration_error",
            ErrorCode::TypingError | ErrorCode::ConversionError => "data_error",
            ErrorCode::InvalidKey => "validation_error",
            ErrorCode::SourceError => "source_error",
            ErrorCode::ConfigError => "config_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_ref(), self.code())
    }
}

// =============================================================================
// MAPPER ERROR
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MapperError {
    #[error("no statements about {key} for entity type {entity_type}")]
    NotFound { key: RdfKey, entity_type: String },

    #[error("cannot map entity type {entity_type}: {reason}")]
    Mapping { entity_type: String, reason: String },

    #[error("cannot implement interface {interface}: {reason}")]
    Shape { interface: String, reason: String },

    #[error("literal {literal:?} on {key} <{predicate}> is not a valid {expected}: {reason}")]
    Typing {
        key: RdfKey,
        predicate: String,
        literal: String,
        expected: String,
        reason: String,
    },

    #[error(
        "cannot convert {entity_type}{}: {reason}",
        .key.as_ref().map(|k| format!(" {k}")).unwrap_or_default()
    )]
    Conversion {
        entity_type: String,
        key: Option<RdfKey>,
        reason: String,
    },

    #[error("invalid key {value:?}: {reason}")]
    InvalidKey { value: String, reason: String },

    #[error("triple source error: {0}")]
    Source(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MapperError {
    pub fn mapping(entity_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            entity_type: entity_type.into(),
            reason: reason.into(),
        }
    }

    pub fn shape(interface: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Shape {
            interface: interface.into(),
            reason: reason.into(),
        }
    }

    pub fn conversion(
        entity_type: impl Into<String>,
        key: Option<&RdfKey>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            entity_type: entity_type.into(),
            key: key.cloned(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MapperError::NotFound { .. } => ErrorCode::NotFound,
            MapperError::Mapping { .. } => ErrorCode::MappingError,
            MapperError::Shape { .. } => ErrorCode::ShapeError,
            MapperError::Typing { .. } => ErrorCode::TypingError,
            MapperError::Conversion { .. } => ErrorCode::ConversionError,
            MapperError::InvalidKey { .. } => ErrorCode::InvalidKey,
            MapperError::Source(_) => ErrorCode::SourceError,
            MapperError::Config(_) => ErrorCode::ConfigError,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }

    /// Record this error in [`ERROR_METRICS`] under `operation` and hand it back.
    pub fn track(self, operation: &str) -> Self {
        ERROR_METRICS.record_error(&self.code(), Some(operation));
        tracing::debug!(code = %self.code(), operation, error = %self, "mapper error");
        self
    }
}

impl From<oxigraph::store::StorageError> for MapperError {
    fn from(err: oxigraph::store::StorageError) -> Self {
        MapperError::Source(err.to_string())
    }
}

// =============================================================================
// ERROR METRICS
// =============================================================================

/// Error metrics collector
pub struct ErrorMetrics {
    /// Total error count by error code
    error_counts: RwLock<HashMap<ErrorCode, AtomicU64>>,
    /// Error count by operation
    operation_errors: RwLock<HashMap<String, AtomicU64>>,
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self {
            error_counts: RwLock::new(HashMap::new()),
            operation_errors: RwLock::new(HashMap::new()),
        }
    }

    /// Record an error occurrence
    pub fn record_error(&self, code: &ErrorCode, operation: Option<&str>) {
        {
            let map = self.error_counts.read();
            if let Some(counter) = map.get(code) {
                counter.fetch_add(1, Ordering::Relaxed);
            } else {
                drop(map);
                let mut map = self.error_counts.write();
                map.entry(*code)
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(name) = operation {
            let map = self.operation_errors.read();
            if let Some(counter) = map.get(name) {
                counter.fetch_add(1, Ordering::Relaxed);
            } else {
                drop(map);
                let mut map = self.operation_errors.write();
                map.entry(name.to_string())
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get error count for a specific code
    pub fn get_error_count(&self, code: &ErrorCode) -> u64 {
        self.error_counts
            .read()
            .get(code)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get error count for a specific operation
    pub fn get_operation_error_count(&self, operation: &str) -> u64 {
        self.operation_errors
            .read()
            .get(operation)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get all error statistics, with per-category totals
    pub fn get_stats(&self) -> ErrorStats {
        let error_counts: HashMap<ErrorCode, u64> = self
            .error_counts
            .read()
            .iter()
            .map(|(k, v)| (*k, v.load(Ordering::Relaxed)))
            .collect();

        let mut category_counts: HashMap<String, u64> = HashMap::new();
        for (code, count) in &error_counts {
            *category_counts.entry(code.category().to_string()).or_default() += count;
        }

        let operation_errors = self
            .operation_errors
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        ErrorStats {
            error_counts,
            operation_errors,
            category_counts,
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.error_counts.write().clear();
        self.operation_errors.write().clear();
    }
}

impl Default for ErrorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Error statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    pub error_counts: HashMap<ErrorCode, u64>,
    pub operation_errors: HashMap<String, u64>,
    pub category_counts: HashMap<String, u64>,
}

/// Global error metrics instance
pub static ERROR_METRICS: once_cell::sync::Lazy<ErrorMetrics> =
    once_cell::sync::Lazy::new(ErrorMetrics::new);

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_code_has_a_category() {
        for code in ErrorCode::iter() {
            assert!(!code.category().is_empty());
            assert!(code.code() > 1000);
        }
    }

    #[test]
    fn declaration_errors_are_not_recoverable() {
        assert!(!MapperError::mapping("Person", "no class").is_recoverable());
        assert!(!MapperError::shape("Person", "bad method").is_recoverable());
        assert!(MapperError::Source("io".into()).is_recoverable());
    }

    #[test]
    fn conversion_message_includes_key_when_present() {
        let key = RdfKey::resource("http://example.org/a").expect("key");
        let err = MapperError::conversion("Person", Some(&key), "no id");
        assert_eq!(
            err.to_string(),
            "cannot convert Person http://example.org/a: no id"
        );
        let err = MapperError::conversion("Person", None, "no id");
        assert_eq!(err.to_string(), "cannot convert Person: no id");
    }

    #[test]
    fn metrics_count_by_code_and_operation() {
        let metrics = ErrorMetrics::new();
        metrics.record_error(&ErrorCode::NotFound, Some("resolve"));
        metrics.record_error(&ErrorCode::NotFound, Some("resolve"));
        metrics.record_error(&ErrorCode::TypingError, None);

        assert_eq!(metrics.get_error_count(&ErrorCode::NotFound), 2);
        assert_eq!(metrics.get_operation_error_count("resolve"), 2);

        let stats = metrics.get_stats();
        assert_eq!(stats.category_counts.get("not_found"), Some(&2));
        assert_eq!(stats.category_counts.get("data_error"), Some(&1));

        metrics.reset();
        assert_eq!(metrics.get_error_count(&ErrorCode::NotFound), 0);
    }
}
