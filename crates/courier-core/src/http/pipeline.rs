//! The request pipeline
//!
//! Each call runs one request through a fixed sequence of stages:
//!
//! ```text
//! Created -> Encoding -> Sending -> Classifying -> Resolved | Rejected
//! ```
//!
//! No stage is revisited and nothing is retried. The only recovery path is the
//! caller's `on_backend_fail` hook.

use crate::config::RequestConfig;
use crate::http::classifier::ErrorClassifier;
use crate::http::codec::{self, ContentType};
use crate::http::error::{RequestError, TransportError, TransportErrorCode};
use crate::http::transport::Transport;
use crate::logging::{generate_request_id, redaction};
use crate::types::{Payload, RequestDescriptor, TransportResponse};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Lifecycle stage of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    Encoding,
    Sending,
    Classifying,
    Resolved,
    Rejected,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Created => "created",
            Stage::Encoding => "encoding",
            Stage::Sending => "sending",
            Stage::Classifying => "classifying",
            Stage::Resolved => "resolved",
            Stage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Sends requests through a [`Transport`] and normalizes every outcome
///
/// Cheap to clone; the config is shared and never changes after construction,
/// so one pipeline can serve any number of concurrent requests.
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    config: Arc<RequestConfig>,
    classifier: ErrorClassifier,
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, config: RequestConfig) -> Self {
        let classifier = config.classifier();
        Self {
            transport,
            config: Arc::new(config),
            classifier,
        }
    }

    /// The underlying transport, for sending follow-up requests directly
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Run a request; the caller's descriptor is never modified
    ///
    /// Resolves with the transport response when both the HTTP status and
    /// the backend payload report success (or `on_backend_fail` supplied a
    /// substitute). Every other outcome is exactly one [`RequestError`].
    pub async fn request(&self, descriptor: &RequestDescriptor) -> Result<TransportResponse, RequestError> {
        let span = tracing::debug_span!(
            "request",
            request_id = %generate_request_id(),
            method = %descriptor.method,
            url = %redaction::redact_url(&descriptor.url),
        );

        async {
            tracing::debug!(stage = %Stage::Created, "Request created");

            let result = self.run(descriptor).await;
            match &result {
                Ok(response) => {
                    tracing::debug!(stage = %Stage::Resolved, status = response.status.as_u16(), "Request resolved");
                }
                Err(err) => {
                    tracing::warn!(
                        stage = %Stage::Rejected,
                        kind = %err.kind(),
                        code = %err.code(),
                        msg = err.msg(),
                        "Request rejected"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, descriptor: &RequestDescriptor) -> Result<TransportResponse, RequestError> {
        let working = self
            .prepare(descriptor)
            .await
            .map_err(|raw| self.classifier.from_transport_failure(raw))?;

        tracing::debug!(
            stage = %Stage::Sending,
            headers = ?redaction::redact_headers(&working.headers),
            "Sending request"
        );

        let response = self
            .transport
            .send(working)
            .await
            .map_err(|raw| self.classifier.from_transport_failure(raw))?;

        self.classify(response).await
    }

    /// Encode the body and apply the `on_request` hook to a working copy
    ///
    /// The body is encoded only when present, using the declared content
    /// type or JSON when none is declared. Failures here are transport-setup
    /// failures.
    pub async fn prepare(&self, descriptor: &RequestDescriptor) -> Result<RequestDescriptor, TransportError> {
        let mut working = descriptor.clone();

        if !working.body.is_empty() {
            let content_type = working
                .declared_content_type()
                .map(|mime| ContentType::from_mime(&mime))
                .unwrap_or(ContentType::Json);

            tracing::debug!(stage = %Stage::Encoding, content_type = content_type.as_str(), "Encoding body");

            working.body = codec::encode(&working.body, &content_type)
                .await
                .map_err(|e| {
                    TransportError::new(TransportErrorCode::BadRequest, e.to_string())
                        .with_config(descriptor.clone())
                })?;
        }

        if let Some(hook) = self.config.on_request() {
            let patch = hook(working.clone()).await.map_err(|e| {
                TransportError::new(
                    TransportErrorCode::BadOption,
                    format!("Request hook failed: {:#}", e),
                )
                .with_config(working.clone())
            })?;
            patch.apply(&mut working);
        }

        Ok(working)
    }

    /// Decide the outcome of a received response
    pub async fn classify(&self, response: TransportResponse) -> Result<TransportResponse, RequestError> {
        tracing::debug!(stage = %Stage::Classifying, status = response.status.as_u16(), "Classifying response");

        if !response.is_http_success() {
            return Err(self.classifier.from_http_status(&response));
        }

        if self.config.is_backend_success(&response.body) {
            return Ok(response);
        }

        if let Some(hook) = self.config.on_backend_fail() {
            if let Some(substitute) = hook(response.clone(), self.transport()).await {
                tracing::debug!(status = substitute.status.as_u16(), "Backend failure recovered by hook");
                return Ok(substitute);
            }
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            let mut body = response.body.clone();
            redaction::redact_json_value(&mut body);
            tracing::trace!(body = %body, "Backend reported failure");
        }

        Err(self.classifier.from_backend_payload(
            &response,
            self.config.code_key(),
            self.config.msg_key(),
        ))
    }

    /// Run a request and return `body[data_key]` of the resolved response
    pub async fn request_data(&self, descriptor: &RequestDescriptor) -> Result<Value, RequestError> {
        let response = self.request(descriptor).await?;
        Ok(self
            .config
            .extract_data(&response.body)
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn get(&self, url: &str) -> Result<TransportResponse, RequestError> {
        self.request(&RequestDescriptor::get(url)).await
    }

    pub async fn delete(&self, url: &str) -> Result<TransportResponse, RequestError> {
        self.request(&RequestDescriptor::delete(url)).await
    }

    pub async fn post(&self, url: &str, body: impl Into<Payload>) -> Result<TransportResponse, RequestError> {
        self.request(&RequestDescriptor::post(url).body(body.into())).await
    }

    pub async fn put(&self, url: &str, body: impl Into<Payload>) -> Result<TransportResponse, RequestError> {
        self.request(&RequestDescriptor::put(url).body(body.into())).await
    }

    pub async fn patch(&self, url: &str, body: impl Into<Payload>) -> Result<TransportResponse, RequestError> {
        self.request(&RequestDescriptor::patch(url).body(body.into())).await
    }
}
