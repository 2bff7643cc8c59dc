use thiserror::Error;

/// Failures produced while decoding MySQL wire data.
///
/// All of these are flow-local: the analyzer downgrades them to debug
/// logs and keeps the process alive. Only capture initialization is
/// fatal, and that is handled in `main`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("need more bytes for a complete packet")]
    Incomplete,
    #[error("empty buffer")]
    Empty,
    #[error("malformed payload: {0}")]
    Malformed(&'static str),
    #[error("parameterized query (parameter_count={0}) is not supported")]
    ParameterizedQuery(u64),
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
