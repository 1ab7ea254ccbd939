use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Stored value is invalid: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
