//! Failures of the persisted release table.
//!
//! redb and serde_json errors are flattened to strings at the store
//! boundary; the release engine only branches on [`StateError::NotFound`]
//! and [`StateError::Invalid`], everything else surfaces as an upstream
//! failure.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The release database file could not be created or opened.
    #[error("cannot open release database: {0}")]
    Open(String),

    /// Beginning or committing a read/write transaction failed.
    #[error("release transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open releases table: {0}")]
    Table(String),

    #[error("reading release row: {0}")]
    Read(String),

    #[error("writing release row: {0}")]
    Write(String),

    #[error("encoding release row: {0}")]
    Serialize(String),

    /// A stored row no longer decodes as a release record.
    #[error("corrupt release row: {0}")]
    Deserialize(String),

    /// No row for this `{kind}:{version}` key.
    #[error("release {0} not recorded")]
    NotFound(String),

    /// Rejected before touching the table, e.g. a rollout above 100%.
    #[error("invalid release update: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_release_row() {
        assert_eq!(
            StateError::NotFound("app:1.2.0".to_string()).to_string(),
            "release app:1.2.0 not recorded"
        );
        assert!(
            StateError::Invalid("rollout percentage 150 exceeds 100".to_string())
                .to_string()
                .starts_with("invalid release update")
        );
    }
}
