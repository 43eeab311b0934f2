//! Response body decoding.
//!
//! The decode mode is picked from the `content-type` header alone by
//! [`ContentKind::classify`], a pure function, so the ladder can be tested
//! without a transport.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;
use crate::http::HttpResponse;

/// How a successful response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Binary,
    Text,
}

impl ContentKind {
    /// `application/json` and `+json` suffixes decode as JSON; `image/*`,
    /// `video/*`, `audio/*` and every other `application/*` as binary;
    /// anything else, including a missing header, as text.
    pub fn classify(content_type: Option<&str>) -> Self {
        let Some(raw) = content_type else {
            return ContentKind::Text;
        };
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/json" || essence.ends_with("+json") {
            ContentKind::Json
        } else if ["image/", "video/", "audio/", "application/"]
            .iter()
            .any(|prefix| essence.starts_with(prefix))
        {
            ContentKind::Binary
        } else {
            ContentKind::Text
        }
    }
}

/// A decoded success payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Json(Value),
    Binary(Bytes),
    Text(String),
    /// The body had no bytes at all.
    Empty,
}

impl Decoded {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Decoded::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Decoded::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Decoded::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Decoded::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize a JSON payload into `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self {
            Decoded::Json(v) => {
                serde_json::from_value(v).map_err(|e| ClientError::Decode(e.to_string()))
            }
            other => Err(ClientError::Decode(format!(
                "expected a JSON payload, got {}",
                other.kind_name()
            ))),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Decoded::Json(_) => "json",
            Decoded::Binary(_) => "binary",
            Decoded::Text(_) => "text",
            Decoded::Empty => "an empty body",
        }
    }
}

/// Decode a response body according to its declared content type.
pub fn decode(response: &HttpResponse) -> Result<Decoded, ClientError> {
    if response.body.is_empty() {
        return Ok(Decoded::Empty);
    }
    match ContentKind::classify(response.header("content-type")) {
        ContentKind::Json => serde_json::from_slice(&response.body)
            .map(Decoded::Json)
            .map_err(|e| ClientError::Decode(e.to_string())),
        ContentKind::Binary => Ok(Decoded::Binary(response.body.clone())),
        ContentKind::Text => Ok(Decoded::Text(response.text())),
    }
}

static FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*("[^"]*"|[^;]*)"#).expect("filename pattern is valid")
});

/// Filename suggested by a `content-disposition` header, quotes stripped.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let captures = FILENAME.captures(header)?;
    let raw = captures.get(1)?.as_str().trim();
    let name = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
