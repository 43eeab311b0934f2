//! The request pipeline.
//!
//! # Design
//! `ApiClient` owns everything a browser helper would keep in module-level
//! globals: the token store, the status-handler table, the interceptor list and
//! the last response. Several clients can therefore live side by side.
//!
//! A request moves Building -> InFlight -> Succeeded | Failed. The two halves
//! around the network call are exposed on their own (`build_request`,
//! `handle_response`) so a host can run the round-trip with any transport;
//! `request` glues them together over the client's [`Transport`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::body::{RequestBody, RequestConfig};
use crate::config::{ClientConfig, UnauthorizedPolicy};
use crate::decode::{self, filename_from_disposition, Decoded};
use crate::error::ClientError;
use crate::http::{find_header, HttpRequest, HttpResponse};
use crate::router::{ResponseInterceptor, ResponseRouter};
use crate::token::{KeyValueStore, TokenStore};
use crate::transport::Transport;

const UNAUTHORIZED: u16 = 401;

/// Full-page reinitialization, triggered after a 401 clears the token.
pub trait Navigator: Send + Sync {
    fn reload(&self);
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync,
{
    fn reload(&self) {
        self()
    }
}

/// Navigator that does nothing; the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn reload(&self) {}
}

/// Result of a request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The response was 2xx and this is the decoded, intercepted payload.
    Completed(Decoded),
    /// The response was 401; the token was cleared and a reload triggered.
    Unauthorized,
}

impl Outcome {
    pub fn into_decoded(self) -> Option<Decoded> {
        match self {
            Outcome::Completed(data) => Some(data),
            Outcome::Unauthorized => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Outcome::Unauthorized)
    }
}

/// Status and headers of the most recently handled response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseMeta {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Filename from the `content-disposition` header, if any.
    pub fn suggested_filename(&self) -> Option<String> {
        self.header("content-disposition")
            .and_then(filename_from_disposition)
    }
}

pub struct ApiClient<T> {
    config: ClientConfig,
    base_url: String,
    tokens: TokenStore,
    transport: T,
    router: RwLock<ResponseRouter>,
    navigator: Arc<dyn Navigator>,
    last_response: Mutex<Option<ResponseMeta>>,
}

impl<T> fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "reqwest")]
impl ApiClient<crate::transport::ReqwestTransport> {
    /// Client over a default `reqwest::Client`.
    pub fn reqwest(config: ClientConfig) -> Self {
        Self::new(config, crate::transport::ReqwestTransport::new())
    }
}

impl ApiClient<()> {
    /// Client without a transport, for hosts that execute requests
    /// themselves via `build_request` / `handle_response`.
    pub fn detached(config: ClientConfig) -> Self {
        Self::new(config, ())
    }
}

impl<T> ApiClient<T> {
    /// New client with an in-memory token store and no navigator.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let tokens = TokenStore::in_memory(&config.token_key);
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            tokens,
            transport,
            router: RwLock::new(ResponseRouter::new()),
            navigator: Arc::new(NoopNavigator),
            last_response: Mutex::new(None),
        }
    }

    /// Keep the token in `store` under the configured key.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.tokens = TokenStore::new(store, &self.config.token_key);
        self
    }

    pub fn with_navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Arc::new(navigator);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn login(&self, token: &str) {
        self.tokens.set(token);
    }

    pub fn logout(&self) {
        self.tokens.clear();
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens.is_set()
    }

    pub fn add_status_handler<F>(&self, status: u16, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.router_mut().add_status_handler(status, handler);
    }

    pub fn remove_status_handler(&self, status: u16) {
        self.router_mut().remove_status_handler(status);
    }

    pub fn add_response_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.router_mut().add_response_interceptor(interceptor);
    }

    pub fn remove_response_interceptor(&self, interceptor: &Arc<dyn ResponseInterceptor>) -> bool {
        self.router_mut().remove_response_interceptor(interceptor)
    }

    /// Status and headers of the last response this client handled.
    ///
    /// With concurrent requests in flight this is whichever finished last.
    pub fn last_response(&self) -> Option<ResponseMeta> {
        self.last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn suggested_filename(&self) -> Option<String> {
        self.last_response()
            .and_then(|meta| meta.suggested_filename())
    }

    /// `base_url` and `endpoint` joined by exactly one slash.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Building: assemble the request for `endpoint` without sending it.
    pub fn build_request(
        &self,
        endpoint: &str,
        config: &RequestConfig,
    ) -> Result<HttpRequest, ClientError> {
        let method = config.resolved_method();
        debug!(%endpoint, %method, "building request");

        let mut generated: Vec<(String, String)> = Vec::new();
        if let Some(token) = self.tokens.get() {
            generated.push((
                "authorization".to_string(),
                format!("{} {token}", self.config.auth_scheme),
            ));
        }

        let mut form_source = None;
        let body = match &config.body {
            RequestBody::Multipart(form) => {
                form_source = Some(form.clone());
                let boundary = format!("----FormBoundary{}", Uuid::new_v4().simple());
                generated.push((
                    "content-type".to_string(),
                    format!("multipart/form-data; boundary={boundary}"),
                ));
                Some(form.encode_multipart(&boundary))
            }
            RequestBody::Json(value) if !value.is_null() => {
                let raw = serde_json::to_vec(value)
                    .map_err(|e| ClientError::Serialization(e.to_string()))?;
                generated.push(("content-type".to_string(), "application/json".to_string()));
                Some(raw.into())
            }
            RequestBody::Json(_) | RequestBody::Empty => None,
        };

        let mut headers: Vec<(String, String)> = generated
            .into_iter()
            .filter(|(name, _)| find_header(&config.headers, name).is_none())
            .collect();
        headers.extend(config.headers.iter().cloned());

        Ok(HttpRequest {
            method,
            url: self.url_for(endpoint),
            headers,
            body,
            form: form_source,
        })
    }

    /// Everything after the response arrives: 401 short-circuit, status
    /// handler, decoding and interceptors.
    pub fn handle_response(
        &self,
        endpoint: &str,
        response: HttpResponse,
    ) -> Result<Outcome, ClientError> {
        let status = response.status;
        *self
            .last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ResponseMeta {
            status,
            headers: response.headers.clone(),
        });

        if status == UNAUTHORIZED
            && self.config.unauthorized_policy == UnauthorizedPolicy::ClearAndReload
        {
            info!(%endpoint, "unauthorized response, clearing token and reloading");
            self.tokens.clear();
            self.navigator.reload();
            return Ok(Outcome::Unauthorized);
        }

        // Clone out of the lock so a handler may touch the router itself.
        let handler = self.router_ref().status_handler(status);
        if let Some(handler) = handler {
            debug!(%endpoint, status, "running status handler");
            handler();
        }

        if !response.is_success() {
            let body = response.text();
            debug!(%endpoint, status, "request failed");
            return Err(ClientError::Http { status, body });
        }

        let data = decode::decode(&response)?;
        // Snapshot, so an interceptor may touch the router too.
        let router = self.router_ref().clone();
        let data = router.intercept(data, endpoint);
        debug!(%endpoint, status, "request succeeded");
        Ok(Outcome::Completed(data))
    }

    fn router_ref(&self) -> RwLockReadGuard<'_, ResponseRouter> {
        self.router.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn router_mut(&self) -> RwLockWriteGuard<'_, ResponseRouter> {
        self.router.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> ApiClient<T> {
    /// Run one request end to end.
    pub async fn request(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<Outcome, ClientError> {
        let request = self.build_request(endpoint, &config)?;
        debug!(%endpoint, method = %request.method, url = %request.url, "request in flight");

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(%endpoint, error = %e, "transport failed");
            e.into_client_error(endpoint)
        })?;

        self.handle_response(endpoint, response)
    }

    /// `GET` with no body.
    pub async fn get(&self, endpoint: &str) -> Result<Outcome, ClientError> {
        self.request(endpoint, RequestConfig::new()).await
    }

    /// Run a request and deserialize its JSON payload.
    pub async fn request_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<R, ClientError> {
        match self.request(endpoint, config).await? {
            Outcome::Completed(data) => data.deserialize(),
            Outcome::Unauthorized => Err(ClientError::Unauthorized),
        }
    }
}
