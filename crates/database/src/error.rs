use std::fmt;

#[derive(Debug)]
pub enum DatabaseError {
    NotFound,
    MissingEnv(&'static str),
    Sqlx(sqlx::Error),
    Migration(sqlx::migrate::MigrateError),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::NotFound => write!(f, "row not found"),
            DatabaseError::MissingEnv(name) => write!(f, "missing environment variable: {name}"),
            DatabaseError::Sqlx(why) => write!(f, "database error: {why}"),
            DatabaseError::Migration(why) => write!(f, "migration error: {why}"),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(why: sqlx::Error) -> Self {
        match why {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            other => DatabaseError::Sqlx(other),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(why: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::Migration(why)
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
