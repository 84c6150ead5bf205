//! Failure types for the account feature.

/// Errors raised by an [`AccountStore`](super::store::AccountStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("row could not be decoded: {0}")]
    Decode(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors surfaced by the account repository to its callers.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    /// Shared by unknown email, wrong password and wrong old password.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    HashingFailure(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => AccountError::DuplicateEmail,
            other => AccountError::PersistenceFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_duplicate_email() {
        let err: AccountError = StoreError::UniqueViolation("users_email_key".into()).into();
        assert!(matches!(err, AccountError::DuplicateEmail));
    }

    #[test]
    fn other_store_errors_map_to_persistence_failure() {
        let err: AccountError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, AccountError::PersistenceFailure(_)));
        let err: AccountError = StoreError::Decode("bad column".into()).into();
        assert!(matches!(err, AccountError::PersistenceFailure(m) if m.contains("bad column")));
    }
}
