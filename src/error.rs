use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing field `{field}` in line: {line:?}")]
    MissingField { field: &'static str, line: String },

    #[error("Invalid address `{text}` in line: {line:?}")]
    InvalidAddress { text: String, line: String },

    #[error("Session file error on line {line}: {reason}")]
    Session { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
