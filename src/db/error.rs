use thiserror::Error;

/// Errors returned by store queries.
///
/// Constraint violations are split out so callers can branch on them instead
/// of inspecting driver error text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated while trying to {action}")]
    UniqueViolation { action: &'static str },
    #[error("record not found while trying to {action}")]
    NotFound { action: &'static str },
    #[error("failed to {action}: {source}")]
    Database {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    /// Classify a driver error raised while performing `action`.
    #[must_use]
    pub fn from_sqlx(action: &'static str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound { action },
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Self::UniqueViolation { action }
            }
            source => Self::Database { action, source },
        }
    }

    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Attach the attempted action to a driver error, `anyhow::Context` style.
pub trait StoreResultExt<T> {
    /// # Errors
    ///
    /// Returns the classified [`StoreError`] if `self` is an error.
    fn during(self, action: &'static str) -> Result<T, StoreError>;
}

impl<T> StoreResultExt<T> for Result<T, sqlx::Error> {
    fn during(self, action: &'static str) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::from_sqlx(action, e))
    }
}
