//! Configuration for Courier
//!
//! Two records are configured by the caller:
//! - [`ClientOptions`]: how the reqwest transport is built (base URL,
//!   timeouts, default headers, redirects, TLS)
//! - [`RequestOptions`]: the partial pipeline policy (backend field names,
//!   success code, hooks), merged over the defaults into an immutable
//!   [`RequestConfig`]
//!
//! Both data parts can be loaded from YAML, TOML or JSON files.

use crate::error::{Error, Result};
use crate::http::classifier::{ErrorClassifier, StatusTable};
use crate::http::probe::{NetworkProbe, SystemProbe};
use crate::http::transport::Transport;
use crate::types::{Code, Payload, RequestDescriptor, TransportResponse};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Transforms the encoded request before it is sent
pub type RequestHook =
    Arc<dyn Fn(RequestDescriptor) -> BoxFuture<'static, anyhow::Result<RequestPatch>> + Send + Sync>;

/// Decides whether a payload reports business success
pub type SuccessPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Gets a chance to recover from a backend failure; `Some` resolves the request
pub type BackendFailHook = Arc<
    dyn Fn(TransportResponse, Arc<dyn Transport>) -> BoxFuture<'static, Option<TransportResponse>>
        + Send
        + Sync,
>;

/// Changes an `on_request` hook wants applied to the working request
///
/// Only the fields that are set override the request. Headers are merged
/// name by name.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Payload>,
    pub timeout: Option<Duration>,
}

impl RequestPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header; invalid names or values are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Skipping invalid header in request patch"),
        }
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn body(mut self, body: Payload) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Merge this patch into a request
    pub fn apply(self, request: &mut RequestDescriptor) {
        if let Some(method) = self.method {
            request.method = method;
        }
        if let Some(url) = self.url {
            request.url = url;
        }
        request.headers.extend(self.headers);
        if let Some(body) = self.body {
            request.body = body;
        }
        if let Some(timeout) = self.timeout {
            request.timeout = Some(timeout);
        }
    }
}

/// Caller-supplied, partial pipeline policy
///
/// Every field left as `None` falls back to the [`RequestConfig`] default.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Payload field holding the backend code
    #[serde(alias = "codeKey")]
    pub code_key: Option<String>,

    /// Payload field holding the backend data
    #[serde(alias = "dataKey")]
    pub data_key: Option<String>,

    /// Payload field holding the backend message
    #[serde(alias = "msgKey")]
    pub msg_key: Option<String>,

    /// Code the backend uses for business success
    #[serde(alias = "successCode")]
    pub success_code: Option<Code>,

    /// Extra or overridden status messages
    #[serde(alias = "statusMessages")]
    pub status_messages: Option<HashMap<u16, String>>,

    #[serde(skip)]
    pub on_request: Option<RequestHook>,

    #[serde(skip)]
    pub on_backend_success: Option<SuccessPredicate>,

    #[serde(skip)]
    pub on_backend_fail: Option<BackendFailHook>,

    #[serde(skip)]
    pub status_table: Option<StatusTable>,

    #[serde(skip)]
    pub probe: Option<Arc<dyn NetworkProbe>>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("code_key", &self.code_key)
            .field("data_key", &self.data_key)
            .field("msg_key", &self.msg_key)
            .field("success_code", &self.success_code)
            .field("status_messages", &self.status_messages)
            .field("on_request", &self.on_request.is_some())
            .field("on_backend_success", &self.on_backend_success.is_some())
            .field("on_backend_fail", &self.on_backend_fail.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the data fields from a YAML, TOML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        load_file(path)
    }

    pub fn code_key(mut self, key: impl Into<String>) -> Self {
        self.code_key = Some(key.into());
        self
    }

    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    pub fn msg_key(mut self, key: impl Into<String>) -> Self {
        self.msg_key = Some(key.into());
        self
    }

    pub fn success_code(mut self, code: impl Into<Code>) -> Self {
        self.success_code = Some(code.into());
        self
    }

    pub fn status_table(mut self, table: StatusTable) -> Self {
        self.status_table = Some(table);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn NetworkProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Install the request hook
    pub fn on_request<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestDescriptor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RequestPatch>> + Send + 'static,
    {
        self.on_request = Some(Arc::new(move |request| hook(request).boxed()));
        self
    }

    /// Replace the default backend-success check
    pub fn on_backend_success<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.on_backend_success = Some(Arc::new(predicate));
        self
    }

    /// Install the backend-failure recovery hook
    pub fn on_backend_fail<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(TransportResponse, Arc<dyn Transport>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<TransportResponse>> + Send + 'static,
    {
        self.on_backend_fail = Some(Arc::new(move |response, transport| {
            hook(response, transport).boxed()
        }));
        self
    }
}

/// The merged pipeline policy; immutable once built
#[derive(Clone)]
pub struct RequestConfig {
    code_key: String,
    data_key: String,
    msg_key: String,
    success_code: Code,
    on_request: Option<RequestHook>,
    on_backend_success: Option<SuccessPredicate>,
    on_backend_fail: Option<BackendFailHook>,
    status_table: StatusTable,
    probe: Arc<dyn NetworkProbe>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            code_key: "code".to_string(),
            data_key: "data".to_string(),
            msg_key: "message".to_string(),
            success_code: Code::Number(200),
            on_request: None,
            on_backend_success: None,
            on_backend_fail: None,
            status_table: StatusTable::default(),
            probe: Arc::new(SystemProbe::new()),
        }
    }
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("code_key", &self.code_key)
            .field("data_key", &self.data_key)
            .field("msg_key", &self.msg_key)
            .field("success_code", &self.success_code)
            .field("on_request", &self.on_request.is_some())
            .field("on_backend_success", &self.on_backend_success.is_some())
            .field("on_backend_fail", &self.on_backend_fail.is_some())
            .field("status_table", &self.status_table)
            .finish_non_exhaustive()
    }
}

impl RequestConfig {
    /// Merge caller options over the defaults, field by field
    pub fn from_options(options: RequestOptions) -> Self {
        let defaults = Self::default();

        let mut status_table = options.status_table.unwrap_or(defaults.status_table);
        for (status, msg) in options.status_messages.unwrap_or_default() {
            status_table = status_table.with_entry(status, msg);
        }

        Self {
            code_key: options.code_key.unwrap_or(defaults.code_key),
            data_key: options.data_key.unwrap_or(defaults.data_key),
            msg_key: options.msg_key.unwrap_or(defaults.msg_key),
            success_code: options.success_code.unwrap_or(defaults.success_code),
            on_request: options.on_request,
            on_backend_success: options.on_backend_success,
            on_backend_fail: options.on_backend_fail,
            status_table,
            probe: options.probe.unwrap_or(defaults.probe),
        }
    }

    pub fn code_key(&self) -> &str {
        &self.code_key
    }

    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    pub fn msg_key(&self) -> &str {
        &self.msg_key
    }

    pub fn success_code(&self) -> &Code {
        &self.success_code
    }

    pub fn on_request(&self) -> Option<&RequestHook> {
        self.on_request.as_ref()
    }

    pub fn on_backend_fail(&self) -> Option<&BackendFailHook> {
        self.on_backend_fail.as_ref()
    }

    pub fn status_table(&self) -> &StatusTable {
        &self.status_table
    }

    pub fn probe(&self) -> Arc<dyn NetworkProbe> {
        Arc::clone(&self.probe)
    }

    /// Run the caller's predicate, or compare `payload[code_key]` with the success code
    pub fn is_backend_success(&self, payload: &Value) -> bool {
        match &self.on_backend_success {
            Some(predicate) => predicate(payload),
            None => payload
                .get(&self.code_key)
                .is_some_and(|code| self.success_code.matches(code)),
        }
    }

    /// `payload[data_key]`
    pub fn extract_data<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        payload.get(&self.data_key)
    }

    /// `payload[msg_key]`, when it is a string
    pub fn extract_message<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        payload.get(&self.msg_key).and_then(Value::as_str)
    }

    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::new(self.status_table.clone(), self.probe())
    }
}

/// Options for building the reqwest transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Base URL that relative request URLs are joined onto
    pub base_url: Option<String>,

    /// Total request timeout in milliseconds
    pub timeout_ms: u64,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Headers sent with every request
    pub headers: HashMap<String, String>,

    pub follow_redirects: bool,

    pub max_redirects: usize,

    /// Whether to validate TLS certificates
    pub validate_tls: bool,

    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 60_000,
            connect_timeout_ms: 10_000,
            headers: HashMap::new(),
            follow_redirects: true,
            max_redirects: 10,
            validate_tls: true,
            user_agent: None,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a YAML, TOML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        load_file(path)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Apply `COURIER_BASE_URL` and `COURIER_TIMEOUT_MS` overrides
    pub fn merge_with_env(&mut self) {
        if let Ok(base_url) = std::env::var("COURIER_BASE_URL") {
            self.base_url = Some(base_url);
        }

        if let Ok(timeout) = std::env::var("COURIER_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => tracing::warn!("Invalid COURIER_TIMEOUT_MS: {}, keeping {}", timeout, self.timeout_ms),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::configuration("timeout_ms cannot be zero"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::configuration("connect_timeout_ms cannot be zero"));
        }
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url).map_err(|e| Error::Configuration {
                message: format!("Invalid base URL: {}", base_url),
                source: Some(anyhow::Error::new(e)),
            })?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;

    let value = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };

    Ok(value)
}
