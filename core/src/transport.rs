//! The network seam.
//!
//! [`Transport`] executes one [`HttpRequest`] and returns a fully buffered
//! [`HttpResponse`]. The pipeline suspends on it exactly once per request.
//! With the `reqwest` feature (on by default) [`ReqwestTransport`] provides an
//! implementation over `reqwest::Client`.

use std::future::Future;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

pub trait Transport: Send + Sync {
    /// Execute `request`. Non-2xx statuses are responses, not errors.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use reqwest::multipart::{Form, Part};
    use reqwest::Method;

    use super::Transport;
    use crate::error::TransportError;
    use crate::form::{FormData, FormValue};
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// `Transport` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl From<reqwest::Error> for TransportError {
        fn from(err: reqwest::Error) -> Self {
            if err.is_connect() || err.is_timeout() {
                TransportError::Connection(err.to_string())
            } else {
                TransportError::Other(err.to_string())
            }
        }
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
        }
    }

    fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// Rebuild `form` as a reqwest multipart form. Blob defaults match
    /// `FormData::encode_multipart`.
    fn multipart_form(form: &FormData) -> Result<Form, TransportError> {
        let mut out = Form::new();
        for (name, value) in form.entries() {
            let part = match value {
                FormValue::Text(text) => Part::text(text.clone()),
                FormValue::Blob(blob) => Part::bytes(blob.bytes.to_vec())
                    .file_name(blob.filename.clone().unwrap_or_else(|| "blob".to_string()))
                    .mime_str(
                        blob.content_type
                            .as_deref()
                            .unwrap_or("application/octet-stream"),
                    )?,
            };
            out = out.part(name.clone(), part);
        }
        Ok(out)
    }

    /// Response headers as owned pairs. Values that are not visible ASCII are
    /// kept, decoded lossily as UTF-8.
    fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    impl Transport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let form = request.form.as_ref().map(multipart_form).transpose()?;
            // reqwest writes its own multipart content-type and boundary
            let headers: Vec<(String, String)> = match form {
                Some(_) => request
                    .headers
                    .into_iter()
                    .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                    .collect(),
                None => request.headers,
            };
            let mut builder = self
                .client
                .request(method(request.method), &request.url)
                .headers(header_map(&headers)?);
            match (form, request.body) {
                (Some(form), _) => builder = builder.multipart(form),
                (None, Some(body)) => builder = builder.body(body),
                (None, None) => {}
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = header_pairs(response.headers());
            let body = response.bytes().await?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

}
