//! Content-type driven body encoding
//!
//! Turns a caller payload into what the transport sends, based on the declared
//! content type:
//! - `application/json`: unchanged
//! - `application/x-www-form-urlencoded`: a query string
//! - `multipart/form-data`: a [`MultipartForm`], with file parts read
//!   asynchronously; JSON arrays and scalars are rejected
//! - anything else: unchanged

use crate::types::{FilePart, FileSource, FormValue, MultipartForm, PartContent, Payload};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_FORM_DATA: &str = "multipart/form-data";

/// Content types the codec knows how to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Json,
    FormUrlencoded,
    FormData,
    Other(String),
}

impl ContentType {
    /// Parse a MIME string; parameters and case are ignored
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            CONTENT_TYPE_JSON => ContentType::Json,
            CONTENT_TYPE_FORM_URLENCODED => ContentType::FormUrlencoded,
            CONTENT_TYPE_FORM_DATA => ContentType::FormData,
            _ => ContentType::Other(essence),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => CONTENT_TYPE_JSON,
            ContentType::FormUrlencoded => CONTENT_TYPE_FORM_URLENCODED,
            ContentType::FormData => CONTENT_TYPE_FORM_DATA,
            ContentType::Other(mime) => mime,
        }
    }
}

/// Body encoding failures
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to read file part '{field}' ({file}): {source}")]
    FileRead {
        field: String,
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("multipart/form-data needs an object or form fields, got {found}")]
    UnsupportedMultipart { found: &'static str },
}

/// Encode a payload for the given content type
///
/// Deterministic for identical input; the only side effect is reading file
/// parts from disk.
pub async fn encode(payload: &Payload, content_type: &ContentType) -> Result<Payload, CodecError> {
    match content_type {
        ContentType::FormUrlencoded => Ok(encode_form_urlencoded(payload)),
        ContentType::FormData => encode_multipart(payload).await,
        ContentType::Json | ContentType::Other(_) => Ok(payload.clone()),
    }
}

fn encode_form_urlencoded(payload: &Payload) -> Payload {
    let mut pairs = Vec::new();
    match payload {
        Payload::Json(value @ (Value::Object(_) | Value::Array(_))) => {
            flatten_value(None, value, &mut pairs);
        }
        Payload::Form(fields) => {
            for (key, value) in fields.entries() {
                match value {
                    FormValue::Field(value) => flatten_value(Some(key.as_str()), value, &mut pairs),
                    FormValue::File(_) | FormValue::Files(_) => {
                        tracing::warn!(field = %key, "File values cannot be url-encoded, skipping");
                    }
                }
            }
        }
        other => return other.clone(),
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    Payload::Text(serializer.finish())
}

/// Flatten nested values into bracketed keys: `a[b]=c`, `a[0]=x`
fn flatten_value(prefix: Option<&str>, value: &Value, out: &mut Vec<(String, String)>) {
    let child_key = |key: &str| match prefix {
        Some(prefix) => format!("{}[{}]", prefix, key),
        None => key.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_value(Some(&child_key(key)), value, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_value(Some(&child_key(&index.to_string())), value, out);
            }
        }
        scalar => {
            if let Some(prefix) = prefix {
                out.push((prefix.to_string(), stringify_field(scalar)));
            }
        }
    }
}

/// Plain field stringification shared by both form encodings
pub fn stringify_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

type PartFuture<'a> = BoxFuture<'a, Result<(String, PartContent), CodecError>>;

async fn encode_multipart(payload: &Payload) -> Result<Payload, CodecError> {
    let mut pending: Vec<PartFuture<'_>> = Vec::new();

    match payload {
        Payload::Json(Value::Object(map)) => {
            for (key, value) in map {
                pending.push(ready_text(key, value));
            }
        }
        Payload::Form(fields) => {
            for (key, value) in fields.entries() {
                match value {
                    FormValue::Field(value) => pending.push(ready_text(key, value)),
                    FormValue::File(file) => pending.push(load_file(key, file)),
                    FormValue::Files(files) => {
                        pending.extend(files.iter().map(|file| load_file(key, file)));
                    }
                }
            }
        }
        // Arrays and scalars have no field names to split into parts
        Payload::Json(value) => {
            return Err(CodecError::UnsupportedMultipart {
                found: json_kind(value),
            })
        }
        other => return Ok(other.clone()),
    }

    // Every part is awaited before the form is assembled; order follows input order.
    let parts = future::try_join_all(pending).await?;

    let mut form = MultipartForm::new();
    for (name, content) in parts {
        form.push(name, content);
    }
    Ok(Payload::Multipart(form))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn ready_text<'a>(key: &'a str, value: &'a Value) -> PartFuture<'a> {
    future::ready(Ok((key.to_string(), PartContent::Text(stringify_field(value))))).boxed()
}

fn load_file<'a>(key: &'a str, file: &'a FilePart) -> PartFuture<'a> {
    async move {
        let content = file.load().await.map_err(|source| CodecError::FileRead {
            field: key.to_string(),
            file: match &file.source {
                FileSource::Path(path) => path.display().to_string(),
                FileSource::Bytes(_) => file.file_name.clone().unwrap_or_default(),
            },
            source,
        })?;
        Ok((key.to_string(), content))
    }
    .boxed()
}
