//! Test helpers
//!
//! Available in this crate's tests and, with the `testing` feature, to
//! downstream crates.

use crate::http::error::{TransportError, TransportErrorCode};
use crate::http::transport::Transport;
use crate::types::{RequestDescriptor, SentRequest, TransportResponse};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub use crate::http::probe::StaticProbe;

/// Build a response as if `GET /test` had returned it
pub fn response(status: u16, body: Value) -> TransportResponse {
    let config = RequestDescriptor::get("/test");
    TransportResponse {
        status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        headers: HeaderMap::new(),
        body,
        request: SentRequest {
            method: config.method.clone(),
            url: config.url.clone(),
        },
        config,
    }
}

enum Scripted {
    Response { status: StatusCode, body: Value },
    Error(TransportError),
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Scripted>,
    requests: Vec<RequestDescriptor>,
}

/// In-process transport answering from a script
///
/// Outcomes are returned in the order they were pushed. Every descriptor the
/// transport receives is recorded. Clones share the same script.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push_response(&self, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.lock().script.push_back(Scripted::Response { status, body });
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.lock().script.push_back(Scripted::Error(error));
    }

    /// Descriptors received so far, oldest first
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let next = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            state.script.pop_front()
        };

        let sent = SentRequest {
            method: request.method.clone(),
            url: request.url.clone(),
        };

        match next {
            Some(Scripted::Response { status, body }) => Ok(TransportResponse {
                status,
                headers: HeaderMap::new(),
                body,
                config: request,
                request: sent,
            }),
            Some(Scripted::Error(error)) => Err(error.with_config(request).with_request(sent)),
            None => Err(TransportError::new(
                TransportErrorCode::Blank,
                format!("No scripted outcome for {} {}", sent.method, sent.url),
            )
            .with_config(request)
            .with_request(sent)),
        }
    }
}
