use std::fmt;

#[derive(Debug)]
pub enum DecodeError {
    TooShort { need: usize, got: usize },
    InvalidHex(hex::FromHexError),
    MissingTopicSegment { topic: String, index: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort { need, got } => {
                write!(f, "frame too short: need at least {need} bytes, got {got}")
            }
            DecodeError::InvalidHex(err) => write!(f, "invalid hex payload: {err}"),
            DecodeError::MissingTopicSegment { topic, index } => write!(
                f,
                "mqtt topic '{topic}' has no segment at index {index}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(err)
    }
}
