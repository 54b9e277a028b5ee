use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Login rejected, or the data endpoint still answered 401 after re-login.
    Authentication { status: u16 },
    /// The control page did not contain the hidden token input.
    TokenExtraction,
    Parse(String),
    UnexpectedResponse(String),
    Network(reqwest::Error),
    Command { action: &'static str, status: u16 },
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication { status } => {
                write!(f, "authentication failed (HTTP {status})")
            }
            Error::TokenExtraction => write!(f, "session token not found in control page"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::UnexpectedResponse(msg) => write!(f, "unexpected response: {msg}"),
            Error::Network(e) => write!(f, "network error: {e}"),
            Error::Command { action, status } => {
                write!(f, "command {action} failed (HTTP {status})")
            }
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Network(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
