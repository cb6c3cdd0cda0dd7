use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const INVALID_JSON_TEXT: &str = "22032";
const INTEGRITY_CLASS: &str = "23";
const QUERY_CANCELED: &str = "57014";

/// Classify a driver error by its SQLSTATE code.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            match code.as_str() {
                UNIQUE_VIOLATION => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                FOREIGN_KEY_VIOLATION | INVALID_TEXT_REPRESENTATION | INVALID_JSON_TEXT => {
                    RepoError::InvalidInput {
                        message: db.message().to_string(),
                    }
                }
                QUERY_CANCELED => RepoError::Timeout,
                other if other.starts_with(INTEGRITY_CLASS) => RepoError::Integrity {
                    message: db.message().to_string(),
                },
                _ => RepoError::from_persistence(db.message()),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
