//! Request error taxonomy
//!
//! Every failed request resolves to exactly one [`RequestError`]: a normalized
//! [`CustomError`] to branch on, plus the raw [`TransportError`] kept for
//! diagnostics.

use crate::types::{Code, RequestDescriptor, SentRequest, TransportResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REQUEST_ERROR_CODE: &str = "DEFAULT";
pub const DEFAULT_REQUEST_ERROR_MSG: &str = "Request Error";

pub const NETWORK_ERROR_CODE: &str = "NETWORK_ERROR";
pub const NETWORK_ERROR_MSG: &str = "Network Unavailable";

/// Raw transport message signalling a generic network failure
pub const NETWORK_ERROR_MESSAGE: &str = "Network Error";

pub const REQUEST_TIMEOUT_CODE: &str = "ECONNABORTED";
pub const REQUEST_TIMEOUT_MSG: &str = "Request Timeout";

/// Which layer a request failed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connectivity, timeout or request-setup failure
    Transport,
    /// The server answered with a non-2xx/304 status
    Http,
    /// HTTP success, but the payload reports a business failure
    Backend,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Http => write!(f, "http"),
            ErrorKind::Backend => write!(f, "backend"),
        }
    }
}

/// The normalized error callers branch on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomError {
    #[serde(rename = "type")]
    kind: ErrorKind,
    code: Code,
    msg: String,
}

impl CustomError {
    pub fn new(kind: ErrorKind, code: impl Into<Code>, msg: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            msg: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.code, self.msg)
    }
}

/// Transport failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportErrorCode {
    Network,
    ConnectionAborted,
    TimedOut,
    Canceled,
    TooManyRedirects,
    BadOption,
    BadOptionValue,
    InvalidUrl,
    BadRequest,
    BadResponse,
    NotSupported,
    Deprecated,
    /// No transport code, as in raw errors synthesized from a response
    Blank,
}

impl TransportErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorCode::Network => "ERR_NETWORK",
            TransportErrorCode::ConnectionAborted => REQUEST_TIMEOUT_CODE,
            TransportErrorCode::TimedOut => "ETIMEDOUT",
            TransportErrorCode::Canceled => "ERR_CANCELED",
            TransportErrorCode::TooManyRedirects => "ERR_FR_TOO_MANY_REDIRECTS",
            TransportErrorCode::BadOption => "ERR_BAD_OPTION",
            TransportErrorCode::BadOptionValue => "ERR_BAD_OPTION_VALUE",
            TransportErrorCode::InvalidUrl => "ERR_INVALID_URL",
            TransportErrorCode::BadRequest => "ERR_BAD_REQUEST",
            TransportErrorCode::BadResponse => "ERR_BAD_RESPONSE",
            TransportErrorCode::NotSupported => "ERR_NOT_SUPPORT",
            TransportErrorCode::Deprecated => "ERR_DEPRECATED",
            TransportErrorCode::Blank => "",
        }
    }

    /// Codes that mean the request was aborted or ran out of time
    pub fn is_timeout_class(&self) -> bool {
        matches!(
            self,
            TransportErrorCode::ConnectionAborted | TransportErrorCode::TimedOut
        )
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw failure as reported by the transport
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub code: TransportErrorCode,
    /// The descriptor that was being sent, if it got that far
    pub config: Option<RequestDescriptor>,
    pub request: Option<SentRequest>,
    /// A response attached to the failure, if the server answered
    pub response: Option<Box<TransportResponse>>,
}

impl TransportError {
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            config: None,
            request: None,
            response: None,
        }
    }

    pub fn with_config(mut self, config: RequestDescriptor) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_request(mut self, request: SentRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: TransportResponse) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// A raw error synthesized from a received response: blank message and
    /// code, real config/request/response
    pub fn from_response(response: &TransportResponse) -> Self {
        Self {
            message: String::new(),
            code: TransportErrorCode::Blank,
            config: Some(response.config.clone()),
            request: Some(response.request.clone()),
            response: Some(Box::new(response.clone())),
        }
    }
}

/// A failed request: the normalized error plus the raw context
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct RequestError {
    pub error: CustomError,
    pub raw_error: TransportError,
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn code(&self) -> &Code {
        self.error.code()
    }

    pub fn msg(&self) -> &str {
        self.error.msg()
    }

    /// The response behind the failure, if one was received
    pub fn response(&self) -> Option<&TransportResponse> {
        self.raw_error.response.as_deref()
    }
}
