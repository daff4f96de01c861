use thiserror::Error;

/// PostgREST code for "the result contains 0 rows" on a single-object request.
pub const NO_ROWS_CODE: &str = "PGRST116";
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    NoRows,
    Unauthorized,
    Conflict,
    Transport,
    Decode,
    Other(String),
}

impl ErrorCode {
    pub fn from_backend_code(code: &str) -> Self {
        match code {
            NO_ROWS_CODE => Self::NoRows,
            UNIQUE_VIOLATION_CODE => Self::Conflict,
            "401" | "403" | "PGRST301" | "PGRST302" | "invalid_grant" | "invalid_credentials"
            | "bad_jwt" | "session_not_found" | "refresh_token_not_found" => Self::Unauthorized,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Error returned by every remote call. `Display` is the backend's message
/// text, unadorned, because it is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub code: ErrorCode,
    pub message: String,
    pub status: Option<u16>,
}

impl RemoteError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn no_rows() -> Self {
        Self::new(
            ErrorCode::NoRows,
            "JSON object requested, multiple (or no) rows returned",
        )
        .with_status(406)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Decode, message)
    }

    pub fn is_no_rows(&self) -> bool {
        self.code == ErrorCode::NoRows
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == ErrorCode::Unauthorized
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
