//! Status handlers and response interceptors.
//!
//! A status handler is a zero-argument callback run whenever a response with
//! its status arrives, before the body is looked at. An interceptor sees every
//! successfully decoded payload, in registration order, and may replace it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::decode::Decoded;

/// Callback run when a response with a registered status arrives.
pub type StatusHandler = Arc<dyn Fn() + Send + Sync>;

/// Transforms a decoded payload. Receives the endpoint it came from.
pub trait ResponseInterceptor: Send + Sync {
    fn intercept(&self, data: Decoded, endpoint: &str) -> Decoded;
}

impl<F> ResponseInterceptor for F
where
    F: Fn(Decoded, &str) -> Decoded + Send + Sync,
{
    fn intercept(&self, data: Decoded, endpoint: &str) -> Decoded {
        self(data, endpoint)
    }
}

#[derive(Default, Clone)]
pub struct ResponseRouter {
    handlers: HashMap<u16, StatusHandler>,
    interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl fmt::Debug for ResponseRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<&u16> = self.handlers.keys().collect();
        codes.sort();
        f.debug_struct("ResponseRouter")
            .field("handlers", &codes)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `status`, replacing any previous one.
    pub fn add_status_handler<F>(&mut self, status: u16, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.insert(status, Arc::new(handler));
    }

    /// Remove the handler for `status`. No-op if none is registered.
    pub fn remove_status_handler(&mut self, status: u16) {
        self.handlers.remove(&status);
    }

    pub fn status_handler(&self, status: u16) -> Option<StatusHandler> {
        self.handlers.get(&status).cloned()
    }

    /// Append an interceptor. The same `Arc` may be registered more than once.
    pub fn add_response_interceptor(&mut self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Remove the first registration of `interceptor` (by identity).
    /// Returns whether anything was removed.
    pub fn remove_response_interceptor(&mut self, interceptor: &Arc<dyn ResponseInterceptor>) -> bool {
        match self
            .interceptors
            .iter()
            .position(|i| Arc::ptr_eq(i, interceptor))
        {
            Some(index) => {
                self.interceptors.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn interceptors(&self) -> &[Arc<dyn ResponseInterceptor>] {
        &self.interceptors
    }

    /// Run the handler registered for `status`, if any.
    pub fn run_status_handler(&self, status: u16) {
        if let Some(handler) = self.handlers.get(&status) {
            handler();
        }
    }

    /// Thread `data` through every interceptor in order.
    pub fn intercept(&self, data: Decoded, endpoint: &str) -> Decoded {
        self.interceptors
            .iter()
            .fold(data, |acc, interceptor| interceptor.intercept(acc, endpoint))
    }

    /// Status handler first, then the interceptor chain.
    ///
    /// Standalone form for callers that decode responses themselves.
    /// `ApiClient::handle_response` runs the same two steps on router
    /// snapshots, with the non-2xx check and decoding in between.
    pub fn dispatch(&self, status: u16, data: Decoded, endpoint: &str) -> Decoded {
        self.run_status_handler(status);
        self.intercept(data, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn append(suffix: &'static str) -> Arc<dyn ResponseInterceptor> {
        Arc::new(move |data: Decoded, _endpoint: &str| match data {
            Decoded::Text(s) => Decoded::Text(format!("{s}{suffix}")),
            other => other,
        })
    }

    #[test]
    fn handler_runs_once_for_its_status() {
        let (count, handler) = counter();
        let mut router = ResponseRouter::new();
        router.add_status_handler(500, handler);

        router.dispatch(200, Decoded::Empty, "x");
        assert_eq!(count.load(Ordering::SeqCst), 0);

        router.dispatch(500, Decoded::Empty, "x");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_handler_replaces_first() {
        let (first, h1) = counter();
        let (second, h2) = counter();
        let mut router = ResponseRouter::new();
        router.add_status_handler(403, h1);
        router.add_status_handler(403, h2);
        router.run_status_handler(403);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removing_absent_handler_is_noop() {
        let mut router = ResponseRouter::new();
        router.remove_status_handler(404);
        assert!(router.status_handler(404).is_none());
    }

    #[test]
    fn interceptors_apply_in_order() {
        let mut router = ResponseRouter::new();
        router.add_response_interceptor(append("-a"));
        router.add_response_interceptor(append("-b"));
        let out = router.intercept(Decoded::Text("x".to_string()), "x");
        assert_eq!(out, Decoded::Text("x-a-b".to_string()));
    }

    #[test]
    fn interceptor_sees_endpoint() {
        let mut router = ResponseRouter::new();
        router.add_response_interceptor(Arc::new(|data: Decoded, endpoint: &str| match data {
            Decoded::Json(mut v) => {
                v["source"] = json!(endpoint);
                Decoded::Json(v)
            }
            other => other,
        }));
        let out = router.dispatch(200, Decoded::Json(json!({"ok": true})), "users/1");
        assert_eq!(out, Decoded::Json(json!({"ok": true, "source": "users/1"})));
    }

    #[test]
    fn remove_interceptor_removes_first_occurrence_only() {
        let a = append("-a");
        let mut router = ResponseRouter::new();
        router.add_response_interceptor(a.clone());
        router.add_response_interceptor(append("-b"));
        router.add_response_interceptor(a.clone());

        assert!(router.remove_response_interceptor(&a));
        let out = router.intercept(Decoded::Text("x".to_string()), "x");
        assert_eq!(out, Decoded::Text("x-b-a".to_string()));
    }

    #[test]
    fn removing_unregistered_interceptor_is_noop() {
        let mut router = ResponseRouter::new();
        router.add_response_interceptor(append("-a"));
        assert!(!router.remove_response_interceptor(&append("-a")));
        assert_eq!(router.interceptors().len(), 1);
    }
}
