//! Per-request options.

use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;
use crate::form::FormData;
use crate::http::HttpMethod;

/// What a request carries, decided by the caller before the pipeline runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON text with `content-type: application/json`.
    Json(Value),
    /// Sent as `multipart/form-data`, unchanged.
    Multipart(FormData),
}

impl RequestBody {
    /// Serialize any `Serialize` value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ClientError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// `Json(null)` counts as empty, like any other falsy body.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Json(v) => v.is_null(),
            RequestBody::Multipart(_) => false,
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        RequestBody::Multipart(form)
    }
}

/// Options for a single `ApiClient::request` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    /// Overrides the inferred method (`POST` with a body, `GET` without).
    pub method: Option<HttpMethod>,
    /// Extra headers. These win over generated ones with the same name.
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Method to use: the explicit one, else inferred from the body.
    pub fn resolved_method(&self) -> HttpMethod {
        match self.method {
            Some(method) => method,
            None if self.body.is_empty() => HttpMethod::Get,
            None => HttpMethod::Post,
        }
    }
}
