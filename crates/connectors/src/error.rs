use std::{fmt, io};

#[derive(Debug)]
pub enum ConnectorError {
    Io(io::Error),
    Csv(csv::Error),
    MissingDirectory(String),
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorError::Io(why) => write!(f, "connector io error: {why}"),
            ConnectorError::Csv(why) => write!(f, "connector csv error: {why}"),
            ConnectorError::MissingDirectory(path) => {
                write!(f, "backfill directory does not exist: {path}")
            }
        }
    }
}

impl std::error::Error for ConnectorError {}

impl From<io::Error> for ConnectorError {
    fn from(why: io::Error) -> Self {
        ConnectorError::Io(why)
    }
}

impl From<csv::Error> for ConnectorError {
    fn from(why: csv::Error) -> Self {
        ConnectorError::Csv(why)
    }
}
