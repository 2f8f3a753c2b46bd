use std::fmt;

use connectors::error::ConnectorError;
use database::DatabaseError;
use registry::RegistryError;

#[derive(Debug)]
pub enum RuntimeError {
    MissingEnv(&'static str),
    InvalidEnv { name: &'static str, value: String },
    Registry(RegistryError),
    Connector(ConnectorError),
    Database(DatabaseError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::MissingEnv(name) => write!(f, "missing environment variable: {name}"),
            RuntimeError::InvalidEnv { name, value } => {
                write!(f, "invalid value for {name}: {value:?}")
            }
            RuntimeError::Registry(why) => write!(f, "balise registry error: {why}"),
            RuntimeError::Connector(why) => write!(f, "connector error: {why}"),
            RuntimeError::Database(why) => write!(f, "database error: {why}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<RegistryError> for RuntimeError {
    fn from(why: RegistryError) -> Self {
        RuntimeError::Registry(why)
    }
}

impl From<ConnectorError> for RuntimeError {
    fn from(why: ConnectorError) -> Self {
        RuntimeError::Connector(why)
    }
}

impl From<DatabaseError> for RuntimeError {
    fn from(why: DatabaseError) -> Self {
        RuntimeError::Database(why)
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
