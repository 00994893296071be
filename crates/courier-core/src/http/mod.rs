//! HTTP request pipeline
//!
//! This module provides:
//! - Content-type driven body encoding (JSON, urlencoded, multipart)
//! - A transport seam with a reqwest implementation
//! - Classification of every failure into the transport/http/backend taxonomy
//! - An injectable network probe consulted during classification
//! - The per-request pipeline tying these together

pub mod classifier;
pub mod client;
pub mod codec;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod transport;

pub use classifier::{ErrorClassifier, HttpCondition, StatusTable, TransportCondition};
pub use client::{create_request, ReqwestTransport};
pub use codec::{encode, CodecError, ContentType};
pub use error::{CustomError, ErrorKind, RequestError, TransportError, TransportErrorCode};
pub use pipeline::{RequestPipeline, Stage};
pub use probe::{AssumeOnline, NetworkProbe, StaticProbe, SystemProbe};
pub use transport::Transport;

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
