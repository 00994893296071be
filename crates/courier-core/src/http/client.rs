//! reqwest-backed transport and the caller-facing factory
//!
//! [`ReqwestTransport`] turns an encoded [`RequestDescriptor`] into a reqwest
//! request and hands every response back untouched, whatever its status.
//! Only failures where no usable response exists become [`TransportError`]s.

use crate::config::{ClientOptions, RequestConfig, RequestOptions};
use crate::error::{Error, Result};
use crate::http::error::{TransportError, TransportErrorCode};
use crate::http::pipeline::RequestPipeline;
use crate::http::transport::{parse_body, Transport};
use crate::types::{FormValue, MultipartForm, PartContent, Payload, RequestDescriptor, SentRequest, TransportResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect, Client as ReqwestClient};
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

/// Production [`Transport`] over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    base_url: Option<String>,
}

impl ReqwestTransport {
    /// Build the underlying client from the options
    pub fn new(options: &ClientOptions) -> Result<Self> {
        options.validate()?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Configuration {
                message: format!("Invalid default header name: {}", name),
                source: Some(anyhow::Error::new(e)),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Configuration {
                message: format!("Invalid value for default header {}", name),
                source: Some(anyhow::Error::new(e)),
            })?;
            default_headers.insert(name, value);
        }

        let redirect_policy = if options.follow_redirects {
            redirect::Policy::limited(options.max_redirects)
        } else {
            redirect::Policy::none()
        };

        let mut builder = ReqwestClient::builder()
            .timeout(options.request_timeout())
            .connect_timeout(options.connect_timeout())
            .redirect(redirect_policy)
            .default_headers(default_headers)
            .danger_accept_invalid_certs(!options.validate_tls);

        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: options.base_url.clone(),
        })
    }

    /// Wrap an existing client
    pub fn with_client(client: ReqwestClient, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    /// Join a relative URL onto the base URL; absolute URLs pass through
    pub fn resolve_url(&self, url: &str) -> std::result::Result<Url, TransportError> {
        // `items:search` parses with an `items` scheme; only hosted URLs are absolute
        if let Some(absolute) = Url::parse(url).ok().filter(|u| u.has_host()) {
            return Ok(absolute);
        }

        let joined = match &self.base_url {
            Some(base) if !url.is_empty() => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            Some(base) => base.clone(),
            None => url.to_string(),
        };

        Url::parse(&joined).map_err(|e| {
            TransportError::new(
                TransportErrorCode::InvalidUrl,
                format!("Invalid URL '{}': {}", joined, e),
            )
        })
    }

    fn build_request(
        &self,
        request: &RequestDescriptor,
    ) -> std::result::Result<reqwest::RequestBuilder, TransportError> {
        let url = self.resolve_url(&request.url)?;
        let mut headers = request.headers.clone();

        let mut builder = self.client.request(request.method.clone(), url);

        builder = match &request.body {
            Payload::Empty => builder,
            Payload::Json(value) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                builder.body(serde_json::to_vec(value).map_err(|e| {
                    TransportError::new(TransportErrorCode::BadRequest, e.to_string())
                })?)
            }
            Payload::Form(fields) => {
                let mut object = Map::new();
                for (key, value) in fields.entries() {
                    match value {
                        FormValue::Field(value) => {
                            object.insert(key.clone(), value.clone());
                        }
                        FormValue::File(_) | FormValue::Files(_) => {
                            return Err(TransportError::new(
                                TransportErrorCode::NotSupported,
                                format!("File field '{}' requires a multipart/form-data body", key),
                            ));
                        }
                    }
                }
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                builder.body(serde_json::to_vec(&Value::Object(object)).map_err(|e| {
                    TransportError::new(TransportErrorCode::BadRequest, e.to_string())
                })?)
            }
            Payload::Text(text) => builder.body(text.clone()),
            Payload::Bytes(bytes) => builder.body(bytes.clone()),
            Payload::Multipart(form) => {
                // reqwest writes its own header with the boundary
                headers.remove(CONTENT_TYPE);
                builder.multipart(to_reqwest_form(form)?)
            }
        };

        builder = builder.headers(headers);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> std::result::Result<TransportResponse, TransportError> {
        let builder = match self.build_request(&request) {
            Ok(builder) => builder,
            Err(e) => return Err(e.with_config(request)),
        };

        let sent = SentRequest {
            method: request.method.clone(),
            url: self
                .resolve_url(&request.url)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| request.url.clone()),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(map_reqwest_error(&e)
                    .with_config(request)
                    .with_request(sent));
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let sent = SentRequest {
            method: request.method.clone(),
            url: response.url().to_string(),
        };

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(map_reqwest_error(&e)
                    .with_config(request)
                    .with_request(sent));
            }
        };

        tracing::trace!(status = status.as_u16(), bytes = bytes.len(), "Response received");

        Ok(TransportResponse {
            status,
            headers,
            body: parse_body(&bytes),
            config: request,
            request: sent,
        })
    }
}

fn to_reqwest_form(form: &MultipartForm) -> std::result::Result<reqwest::multipart::Form, TransportError> {
    let mut out = reqwest::multipart::Form::new();
    for part in form.parts() {
        out = match &part.content {
            PartContent::Text(text) => out.text(part.name.clone(), text.clone()),
            PartContent::File {
                file_name,
                mime,
                data,
            } => {
                let mut file = reqwest::multipart::Part::bytes(data.clone());
                if let Some(file_name) = file_name {
                    file = file.file_name(file_name.clone());
                }
                if let Some(mime) = mime {
                    file = file.mime_str(mime).map_err(|e| {
                        TransportError::new(
                            TransportErrorCode::BadOptionValue,
                            format!("Invalid MIME type '{}' for part '{}': {}", mime, part.name, e),
                        )
                    })?;
                }
                out.part(part.name.clone(), file)
            }
        };
    }
    Ok(out)
}

/// Map a reqwest failure onto the transport failure classes
pub fn map_reqwest_error(error: &reqwest::Error) -> TransportError {
    let code = if error.is_timeout() {
        TransportErrorCode::TimedOut
    } else if error.is_connect() {
        TransportErrorCode::Network
    } else if error.is_redirect() {
        TransportErrorCode::TooManyRedirects
    } else if error.is_builder() {
        TransportErrorCode::BadOption
    } else if error.is_body() {
        TransportErrorCode::BadRequest
    } else if error.is_decode() {
        TransportErrorCode::BadResponse
    } else {
        TransportErrorCode::Blank
    };

    TransportError::new(code, error_chain(error))
}

/// Join an error and its sources into one message
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Build a pipeline over a [`ReqwestTransport`]
///
/// `options` configures the HTTP client; `config` is the partial pipeline
/// policy, merged over the defaults.
pub fn create_request(options: ClientOptions, config: RequestOptions) -> Result<RequestPipeline> {
    let transport = ReqwestTransport::new(&options)?;
    tracing::debug!(base_url = ?options.base_url, timeout_ms = options.timeout_ms, "Created request pipeline");
    Ok(RequestPipeline::new(
        Arc::new(transport),
        RequestConfig::from_options(config),
    ))
}
