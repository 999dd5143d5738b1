//! Error types for Aqualog services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AquaError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AquaError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key {key} in partition {partition}")]
    DuplicateKey { partition: String, key: i64 },

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("Partition {partition} unavailable: {reason}")]
    UpstreamUnavailable { partition: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AquaError {
    pub fn upstream(partition: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            partition: partition.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidRange { .. } => 400,
            Self::NotFound(_) => 404,
            Self::DuplicateKey { .. } => 409,
            Self::UpstreamUnavailable { .. } => 503,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for AquaError {
    fn from(err: serde_json::Error) -> Self {
        AquaError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let dup = AquaError::DuplicateKey { partition: "box-1".into(), key: 10 };
        assert_eq!(dup.status_code(), 409);
        assert_eq!(dup.error_code(), "DUPLICATE_KEY");

        let range = AquaError::InvalidRange { start: 5, end: 1 };
        assert_eq!(range.status_code(), 400);

        let upstream = AquaError::upstream("box-2", "timed out");
        assert_eq!(upstream.status_code(), 503);
        assert_eq!(upstream.to_string(), "Partition box-2 unavailable: timed out");
    }
}
