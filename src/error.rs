use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} references missing {target} {target_id}")]
    DanglingReference {
        entity: &'static str,
        id: i64,
        target: &'static str,
        target_id: i64,
    },

    #[error("Invalid {entity}: {reason}")]
    Invalid { entity: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup parse error at record {record}: {message}")]
    Parse { record: u64, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            entity,
            reason: reason.into(),
        }
    }

    pub fn parse(record: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            record,
            message: message.into(),
        }
    }

    /// Failures of the underlying store rather than of the caller's request.
    pub fn is_store_io(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Json(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_told_apart_from_rejected_requests() {
        assert!(AppError::from(std::io::Error::other("disk gone")).is_store_io());
        assert!(!AppError::not_found("Bit", 1).is_store_io());
        assert!(!AppError::parse(2, "bad rating").is_store_io());
    }
}
