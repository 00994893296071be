//! Error classification
//!
//! Maps a transport failure, a non-success HTTP response, or a backend
//! business failure to a single normalized [`RequestError`]. Each entry point
//! evaluates its conditions in a fixed priority order and builds a fresh
//! [`CustomError`] for the first one that holds.

use crate::http::error::{
    CustomError, ErrorKind, RequestError, TransportError, TransportErrorCode,
    DEFAULT_REQUEST_ERROR_CODE, DEFAULT_REQUEST_ERROR_MSG, NETWORK_ERROR_CODE,
    NETWORK_ERROR_MESSAGE, NETWORK_ERROR_MSG, REQUEST_TIMEOUT_CODE, REQUEST_TIMEOUT_MSG,
};
use crate::http::probe::NetworkProbe;
use crate::types::{Code, TransportResponse};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Status code to message table with a fallback entry
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTable {
    entries: HashMap<u16, String>,
    default_msg: String,
}

impl Default for StatusTable {
    fn default() -> Self {
        let entries = [
            (400, "Bad Request"),
            (401, "Unauthorized"),
            (403, "Forbidden"),
            (404, "Not Found"),
            (405, "Method Not Allowed"),
            (408, "Request Timeout"),
            (500, "Internal Server Error"),
            (501, "Not Implemented"),
            (502, "Bad Gateway"),
            (503, "Service Unavailable"),
            (504, "Gateway Timeout"),
            (505, "HTTP Version Not Supported"),
        ]
        .into_iter()
        .map(|(status, msg)| (status, msg.to_string()))
        .collect();

        Self {
            entries,
            default_msg: DEFAULT_REQUEST_ERROR_MSG.to_string(),
        }
    }
}

impl StatusTable {
    /// An empty table that answers every status with `default_msg`
    pub fn empty(default_msg: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            default_msg: default_msg.into(),
        }
    }

    /// Add or override the message for a status
    pub fn with_entry(mut self, status: u16, msg: impl Into<String>) -> Self {
        self.entries.insert(status, msg.into());
        self
    }

    /// Replace the fallback message
    pub fn with_default(mut self, msg: impl Into<String>) -> Self {
        self.default_msg = msg.into();
        self
    }

    pub fn get(&self, status: u16) -> Option<&str> {
        self.entries.get(&status).map(String::as_str)
    }

    /// Message for a status, falling back to the default entry
    pub fn message_for(&self, status: u16) -> &str {
        self.get(status).unwrap_or(&self.default_msg)
    }

    pub fn default_msg(&self) -> &str {
        &self.default_msg
    }
}

/// Which rule fired for a transport failure, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCondition {
    /// Offline host or a generic network failure
    Network,
    /// Aborted or timed-out request
    Timeout,
    /// The server answered; the transport reported the status as a failure
    Status(StatusCode),
    /// Anything else: request setup, cancellation, unsupported options
    Other,
}

/// Which rule fired for a non-success HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCondition {
    Offline,
    Status(StatusCode),
}

/// Builds normalized errors; never fails
#[derive(Clone)]
pub struct ErrorClassifier {
    table: StatusTable,
    probe: Arc<dyn NetworkProbe>,
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl ErrorClassifier {
    pub fn new(table: StatusTable, probe: Arc<dyn NetworkProbe>) -> Self {
        Self { table, probe }
    }

    pub fn table(&self) -> &StatusTable {
        &self.table
    }

    /// Decide which transport rule applies; later rules are not evaluated once one holds
    pub fn transport_condition(&self, raw: &TransportError) -> TransportCondition {
        if !self.probe.is_online()
            || raw.message == NETWORK_ERROR_MESSAGE
            || raw.code == TransportErrorCode::Network
        {
            TransportCondition::Network
        } else if raw.code.is_timeout_class() && mentions_timeout(&raw.message) {
            TransportCondition::Timeout
        } else if let Some(response) = &raw.response {
            TransportCondition::Status(response.status)
        } else {
            TransportCondition::Other
        }
    }

    /// Classify a failure reported by the transport
    pub fn from_transport_failure(&self, raw: TransportError) -> RequestError {
        let error = match self.transport_condition(&raw) {
            TransportCondition::Network => network_error(),
            TransportCondition::Timeout => CustomError::new(
                ErrorKind::Transport,
                REQUEST_TIMEOUT_CODE,
                REQUEST_TIMEOUT_MSG,
            ),
            TransportCondition::Status(status) => CustomError::new(
                ErrorKind::Transport,
                status.as_u16(),
                self.table.message_for(status.as_u16()),
            ),
            TransportCondition::Other => CustomError::new(
                ErrorKind::Transport,
                DEFAULT_REQUEST_ERROR_CODE,
                self.table.default_msg(),
            ),
        };

        RequestError {
            error,
            raw_error: raw,
        }
    }

    pub fn http_condition(&self, response: &TransportResponse) -> HttpCondition {
        if !self.probe.is_online() {
            HttpCondition::Offline
        } else {
            HttpCondition::Status(response.status)
        }
    }

    /// Classify a received response whose status is outside 2xx/304
    pub fn from_http_status(&self, response: &TransportResponse) -> RequestError {
        let error = match self.http_condition(response) {
            HttpCondition::Offline => network_error(),
            HttpCondition::Status(status) => CustomError::new(
                ErrorKind::Http,
                status.as_u16(),
                self.table.message_for(status.as_u16()),
            ),
        };

        RequestError {
            error,
            raw_error: TransportError::from_response(response),
        }
    }

    /// Classify an HTTP-successful response the backend marked as failed
    ///
    /// Code and message are taken verbatim from the payload.
    pub fn from_backend_payload(
        &self,
        response: &TransportResponse,
        code_key: &str,
        msg_key: &str,
    ) -> RequestError {
        let code = Code::from_json(response.body.get(code_key));
        let msg = match response.body.get(msg_key) {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        RequestError {
            error: CustomError::new(ErrorKind::Backend, code, msg),
            raw_error: TransportError::from_response(response),
        }
    }
}

fn network_error() -> CustomError {
    CustomError::new(ErrorKind::Transport, NETWORK_ERROR_CODE, NETWORK_ERROR_MSG)
}

fn mentions_timeout(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("timeout") || message.contains("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::probe::StaticProbe;
    use crate::testing::response;
    use serde_json::json;

    fn classifier(online: bool) -> ErrorClassifier {
        ErrorClassifier::new(StatusTable::default(), Arc::new(StaticProbe::new(online)))
    }

    #[test]
    fn test_offline_wins_over_everything() {
        let raw = TransportError::new(TransportErrorCode::TimedOut, "timeout of 1000ms exceeded")
            .with_response(response(500, json!({})));

        let err = classifier(false).from_transport_failure(raw);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.code(), &Code::from(NETWORK_ERROR_CODE));
        assert_eq!(err.msg(), NETWORK_ERROR_MSG);
    }

    #[test]
    fn test_network_error_message_while_online() {
        let raw = TransportError::new(TransportErrorCode::Blank, NETWORK_ERROR_MESSAGE);
        let err = classifier(true).from_transport_failure(raw);
        assert_eq!(err.code(), &Code::from(NETWORK_ERROR_CODE));
    }

    #[test]
    fn test_timeout_needs_code_and_message() {
        let c = classifier(true);

        let raw = TransportError::new(TransportErrorCode::ConnectionAborted, "timeout of 500ms exceeded");
        assert_eq!(c.transport_condition(&raw), TransportCondition::Timeout);
        let err = c.from_transport_failure(raw);
        assert_eq!(err.code(), &Code::from(REQUEST_TIMEOUT_CODE));
        assert_eq!(err.msg(), REQUEST_TIMEOUT_MSG);

        let raw = TransportError::new(TransportErrorCode::ConnectionAborted, "aborted by peer");
        assert_eq!(c.transport_condition(&raw), TransportCondition::Other);

        let raw = TransportError::new(TransportErrorCode::Canceled, "timeout");
        assert_eq!(c.transport_condition(&raw), TransportCondition::Other);
    }

    #[test]
    fn test_attached_response_uses_status_table() {
        let c = classifier(true);

        let raw = TransportError::new(TransportErrorCode::BadResponse, "Request failed with status code 503")
            .with_response(response(503, json!(null)));
        let err = c.from_transport_failure(raw);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.code(), &Code::Number(503));
        assert_eq!(err.msg(), "Service Unavailable");

        let raw = TransportError::new(TransportErrorCode::BadRequest, "Request failed with status code 418")
            .with_response(response(418, json!(null)));
        let err = c.from_transport_failure(raw);
        assert_eq!(err.code(), &Code::Number(418));
        assert_eq!(err.msg(), DEFAULT_REQUEST_ERROR_MSG);
    }

    #[test]
    fn test_catch_all_transport_error() {
        let raw = TransportError::new(TransportErrorCode::Canceled, "canceled");
        let err = classifier(true).from_transport_failure(raw);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.code(), &Code::from(DEFAULT_REQUEST_ERROR_CODE));
        assert_eq!(err.msg(), DEFAULT_REQUEST_ERROR_MSG);
        assert_eq!(err.raw_error.message, "canceled");
    }

    #[test]
    fn test_http_status_classification() {
        let resp = response(404, json!({"detail": "missing"}));
        let err = classifier(true).from_http_status(&resp);
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.code(), &Code::Number(404));
        assert_eq!(err.msg(), "Not Found");

        assert_eq!(err.raw_error.message, "");
        assert_eq!(err.raw_error.code, TransportErrorCode::Blank);
        assert!(err.raw_error.config.is_some());
        assert_eq!(err.response().map(|r| r.status.as_u16()), Some(404));
    }

    #[test]
    fn test_http_status_while_offline_is_network_error() {
        let err = classifier(false).from_http_status(&response(500, json!({})));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.code(), &Code::from(NETWORK_ERROR_CODE));
    }

    #[test]
    fn test_custom_table_entries() {
        let table = StatusTable::default()
            .with_entry(429, "Too Many Requests")
            .with_default("Something went wrong");
        let c = ErrorClassifier::new(table, Arc::new(StaticProbe::new(true)));

        assert_eq!(c.from_http_status(&response(429, json!({}))).msg(), "Too Many Requests");
        assert_eq!(c.from_http_status(&response(599, json!({}))).msg(), "Something went wrong");
    }

    #[test]
    fn test_backend_payload_is_verbatim() {
        let resp = response(200, json!({"code": 4001, "message": "token expired", "data": null}));
        let err = classifier(true).from_backend_payload(&resp, "code", "message");
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.code(), &Code::Number(4001));
        assert_eq!(err.msg(), "token expired");
        assert_eq!(err.raw_error.code, TransportErrorCode::Blank);

        let resp = response(200, json!({"status": "E_AUTH"}));
        let err = classifier(true).from_backend_payload(&resp, "status", "msg");
        assert_eq!(err.code(), &Code::from("E_AUTH"));
        assert_eq!(err.msg(), "");
    }
}
