use std::fmt;

/// Custom error type for client operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Request building attempted before connect or after close
    NotConnected
  , /// Connect-time validation failed
    ConnectionError(String)
  , /// Malformed request, prompt or gold choices
    InvalidArgument(String)
  , /// Deferred execution failed
    BackendError(String)
  , /// HTTP request error
    HttpError(String)
  , /// API returned an error response
    ApiError(String)
  , /// Failed to parse API response
    ParseError(String)
  , /// Operation not offered by this backend
    Unsupported(String)
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind
{   NotConnected
  , Connection
  , InvalidArgument
  , Backend
  , Unsupported
}

impl Error
{   pub fn kind(&self) -> ErrorKind
    {   match self
        {   Error::NotConnected => ErrorKind::NotConnected
          , Error::ConnectionError(_) => ErrorKind::Connection
          , Error::InvalidArgument(_) => ErrorKind::InvalidArgument
          , Error::BackendError(_)
          | Error::HttpError(_)
          | Error::ApiError(_)
          | Error::ParseError(_) => ErrorKind::Backend
          , Error::Unsupported(_) => ErrorKind::Unsupported
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self
    {   Error::InvalidArgument(msg.into())
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::NotConnected => {
              write!(f, "Client is not connected")
            }
          , Error::ConnectionError(msg) => {
              write!(f, "Connection error: {}", msg)
            }
          , Error::InvalidArgument(msg) => {
              write!(f, "Invalid argument: {}", msg)
            }
          , Error::BackendError(msg) => {
              write!(f, "Backend error: {}", msg)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::Unsupported(msg) => {
              write!(f, "Unsupported operation: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::BackendError(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::BackendError(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
