//! Core data types for Courier
//!
//! Request descriptors, payloads (before and after content-type encoding),
//! multipart bodies, transport responses and backend codes.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A request as described by the caller
///
/// The pipeline clones this before encoding, so the caller's copy is never
/// touched by body encoding or the `on_request` hook.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Absolute URL, or a path relative to the transport's base URL
    pub url: String,
    /// Request headers (names are case-insensitive)
    pub headers: HeaderMap,
    /// Request body
    pub body: Payload,
    /// Per-request timeout override handed to the transport
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Create a descriptor with no headers and no body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Payload::Empty,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header, replacing any previous value for the same name
    ///
    /// Names or values that are not valid HTTP tokens are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Skipping invalid header"),
        }
        self
    }

    /// Declare the body's content type
    pub fn content_type(self, content_type: &str) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Set a JSON body
    pub fn json(mut self, value: Value) -> Self {
        self.body = Payload::Json(value);
        self
    }

    /// Set a form body (encoded according to the declared content type)
    pub fn form(mut self, fields: FormFields) -> Self {
        self.body = Payload::Form(fields);
        self
    }

    /// Set an arbitrary payload
    pub fn body(mut self, payload: Payload) -> Self {
        self.body = payload;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The MIME essence of the `Content-Type` header, lowercased, without parameters
    pub fn declared_content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase())
            .filter(|v| !v.is_empty())
    }
}

/// Request body, both as supplied by the caller and as handed to the transport
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Form(FormFields),
    Text(String),
    Bytes(Vec<u8>),
    Multipart(MultipartForm),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Insertion-ordered form fields, possibly carrying files
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormFields {
    entries: Vec<(String, FormValue)>,
}

/// A single form value
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Plain value, stringified on encoding
    Field(Value),
    /// One file part
    File(FilePart),
    /// Several file parts under the same key, kept in order
    Files(Vec<FilePart>),
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), FormValue::Field(value.into())));
        self
    }

    /// Append a single file
    pub fn file(mut self, key: impl Into<String>, file: FilePart) -> Self {
        self.entries.push((key.into(), FormValue::File(file)));
        self
    }

    /// Append several files under one key
    pub fn files(mut self, key: impl Into<String>, files: Vec<FilePart>) -> Self {
        self.entries.push((key.into(), FormValue::Files(files)));
        self
    }

    pub fn entries(&self) -> &[(String, FormValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a file part's bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    Bytes(Vec<u8>),
    /// Read asynchronously when the body is encoded
    Path(PathBuf),
}

/// A file-like value destined for a multipart body
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub source: FileSource,
    pub file_name: Option<String>,
    pub mime: Option<String>,
}

impl FilePart {
    /// In-memory file contents
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: FileSource::Bytes(data.into()),
            file_name: Some(file_name.into()),
            mime: None,
        }
    }

    /// A file on disk; the file name defaults to the path's last component
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string());
        Self {
            source: FileSource::Path(path),
            file_name,
            mime: None,
        }
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Load the file contents into a multipart part content
    pub async fn load(&self) -> std::io::Result<PartContent> {
        let data = match &self.source {
            FileSource::Bytes(data) => data.clone(),
            FileSource::Path(path) => tokio::fs::read(path).await?,
        };
        Ok(PartContent::File {
            file_name: self.file_name.clone(),
            mime: self.mime.clone(),
            data,
        })
    }
}

/// A transport-neutral multipart body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

/// One named multipart part
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartContent {
    Text(String),
    File {
        file_name: Option<String>,
        mime: Option<String>,
        data: Vec<u8>,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, content: PartContent) {
        self.parts.push(Part {
            name: name.into(),
            content,
        });
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, PartContent::Text(value.into()));
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// All parts with the given name, in insertion order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts.iter().filter(move |p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// The request as the transport actually sent it
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method: Method,
    /// Final URL, after base-URL joining and redirects
    pub url: String,
}

/// A response returned by the transport, whatever its status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body; plain text becomes a JSON string, an empty body `Null`
    pub body: Value,
    /// The descriptor the transport was given
    pub config: RequestDescriptor,
    pub request: SentRequest,
}

impl TransportResponse {
    /// Whether the status counts as HTTP success (2xx or 304)
    pub fn is_http_success(&self) -> bool {
        is_http_success(self.status)
    }
}

/// 2xx statuses and 304 Not Modified count as HTTP success
pub fn is_http_success(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_MODIFIED
}

/// A code that is either numeric or textual
///
/// Used for the backend's success code and for normalized error codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Number(i64),
    Text(String),
}

impl Code {
    /// Strict comparison against a JSON value: numbers only match numbers
    /// (`200.0` equals `200`), strings only match strings
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Code::Number(n), Value::Number(v)) => match v.as_i64() {
                Some(v) => v == *n,
                None => v.as_f64().is_some_and(|f| is_whole(f) && f as i64 == *n),
            },
            (Code::Text(s), Value::String(v)) => s == v,
            _ => false,
        }
    }

    /// Read a code out of a backend payload field
    ///
    /// Integers and strings are kept verbatim, whole floats read as integers.
    /// A missing field reads as an empty text code; any other JSON value is
    /// kept as its JSON text.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(n), _) => Code::Number(n),
                (None, Some(f)) if is_whole(f) => Code::Number(f as i64),
                _ => Code::Text(n.to_string()),
            },
            Some(Value::String(s)) => Code::Text(s.clone()),
            None | Some(Value::Null) => Code::Text(String::new()),
            Some(other) => Code::Text(other.to_string()),
        }
    }
}

/// Whole numbers within `i64` range, as JSON floats like `200.0` carry them
fn is_whole(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Number(n) => write!(f, "{}", n),
            Code::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Code {
    fn from(n: i64) -> Self {
        Code::Number(n)
    }
}

impl From<u16> for Code {
    fn from(n: u16) -> Self {
        Code::Number(n as i64)
    }
}

impl From<&str> for Code {
    fn from(s: &str) -> Self {
        Code::Text(s.to_string())
    }
}

impl From<String> for Code {
    fn from(s: String) -> Self {
        Code::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declared_content_type_ignores_case_and_params() {
        let req = RequestDescriptor::post("/upload")
            .header("content-TYPE", "Multipart/Form-Data; boundary=xyz");
        assert_eq!(
            req.declared_content_type().as_deref(),
            Some("multipart/form-data")
        );

        assert_eq!(RequestDescriptor::get("/").declared_content_type(), None);
    }

    #[test]
    fn test_invalid_header_is_skipped() {
        let req = RequestDescriptor::get("/").header("bad header", "v");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_http_success_range() {
        assert!(is_http_success(StatusCode::OK));
        assert!(is_http_success(StatusCode::NO_CONTENT));
        assert!(is_http_success(StatusCode::NOT_MODIFIED));
        assert!(!is_http_success(StatusCode::FOUND));
        assert!(!is_http_success(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_code_matching_is_strict() {
        assert!(Code::Number(200).matches(&json!(200)));
        assert!(!Code::Number(200).matches(&json!("200")));
        assert!(Code::from("0000").matches(&json!("0000")));
        assert!(!Code::from("0000").matches(&json!(0)));
        assert!(!Code::Number(200).matches(&Value::Null));
        assert!(Code::Number(200).matches(&json!(200.0)));
        assert!(!Code::Number(200).matches(&json!(200.5)));
    }

    #[test]
    fn test_code_from_json() {
        assert_eq!(Code::from_json(Some(&json!(4001))), Code::Number(4001));
        assert_eq!(Code::from_json(Some(&json!("E42"))), Code::from("E42"));
        assert_eq!(Code::from_json(None), Code::from(""));
        assert_eq!(Code::from_json(Some(&json!(1.5))), Code::from("1.5"));
        assert_eq!(Code::from_json(Some(&json!(4001.0))), Code::Number(4001));
    }

    #[test]
    fn test_code_deserializes_untagged() {
        let n: Code = serde_json::from_value(json!(200)).unwrap();
        let s: Code = serde_json::from_value(json!("0000")).unwrap();
        assert_eq!(n, Code::Number(200));
        assert_eq!(s, Code::from("0000"));
    }

    #[tokio::test]
    async fn test_file_part_from_bytes_loads() {
        let part = FilePart::from_bytes("a.txt", b"hello".to_vec()).mime("text/plain");
        let content = part.load().await.unwrap();
        assert_eq!(
            content,
            PartContent::File {
                file_name: Some("a.txt".to_string()),
                mime: Some("text/plain".to_string()),
                data: b"hello".to_vec(),
            }
        );
    }
}
