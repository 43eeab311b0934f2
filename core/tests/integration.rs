//! End-to-end pipeline tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `ApiClient` over real
//! HTTP with the reqwest transport: token injection, body normalization,
//! the 401 short-circuit, status handlers, interceptors and decoding.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fetch_core::{
    ApiClient, Blob, ClientConfig, ClientError, Decoded, FileStore, FormData, FormObject,
    HttpMethod, Outcome, ReqwestTransport, RequestBody, RequestConfig, ResponseInterceptor,
};
use mock_server::{fake_api_data, Echo, Session, User, DOWNLOAD_BYTES, DOWNLOAD_FILENAME, PASSWORD};
use serde_json::{json, Value};

/// Start the mock server on its own runtime thread and return its address.
fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn client(addr: SocketAddr) -> ApiClient<ReqwestTransport> {
    ApiClient::reqwest(ClientConfig::new(&format!("http://{addr}")))
}

#[tokio::test]
async fn success_resolves_to_payload() {
    let client = client(spawn_server());
    let outcome = client.get("success").await.unwrap();
    assert_eq!(outcome, Outcome::Completed(Decoded::Json(fake_api_data())));
}

#[tokio::test]
async fn failure_rejects_with_body_text() {
    let client = client(spawn_server());
    let err = client.get("failure").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Page not found."));
}

#[tokio::test]
async fn unauthorized_clears_token() {
    let reloads = Arc::new(AtomicUsize::new(0));
    let r = reloads.clone();
    let client = client(spawn_server()).with_navigator(move || {
        r.fetch_add(1, Ordering::SeqCst);
    });
    client.login("expired");

    let outcome = client.get("unauthorized").await.unwrap();
    assert!(outcome.is_unauthorized());
    assert!(!client.is_logged_in());
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_handler_fires_for_server_error() {
    let client = client(spawn_server());
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    client.add_status_handler(500, move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let err = client.get("status/500").await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 500, ref body } if body == "status 500"));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    client.get("status/204").await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn login_me_logout_lifecycle() {
    let addr = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path().join("storage.json")).unwrap());
    let client = client(addr).with_store(store);

    // /me needs a token
    assert!(client.get("me").await.unwrap().is_unauthorized());

    let session: Session = client
        .request_json(
            "login",
            RequestConfig::new().body(json!({"username": "john", "password": PASSWORD})),
        )
        .await
        .unwrap();
    client.login(&session.token.to_string());

    let me: User = client.request_json("me", RequestConfig::new()).await.unwrap();
    assert_eq!(me.username, "john");

    // a second client over the same file sees the persisted token
    let reopened = ApiClient::reqwest(ClientConfig::new(&format!("http://{addr}")))
        .with_store(Arc::new(FileStore::open(dir.path().join("storage.json")).unwrap()));
    assert!(reopened.is_logged_in());

    let outcome = client.request("logout", RequestConfig::new().method(HttpMethod::Post)).await.unwrap();
    assert_eq!(outcome, Outcome::Completed(Decoded::Empty));
    client.logout();
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn wrong_password_is_http_error() {
    let client = client(spawn_server());
    let err = client
        .request(
            "login",
            RequestConfig::new().body(json!({"username": "john", "password": "nope"})),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(err.to_string().contains("invalid credentials"));
}

#[tokio::test]
async fn echo_sees_token_and_json_body() {
    let client = client(spawn_server());
    client.login("abc123");

    let echo: Echo = client
        .request_json("echo", RequestConfig::new().body(json!({"title": "x"})))
        .await
        .unwrap();
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.authorization.as_deref(), Some("Bearer abc123"));
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(serde_json::from_str::<Value>(&echo.body).unwrap(), json!({"title": "x"}));
}

#[tokio::test]
async fn echo_respects_overrides() {
    let client = client(spawn_server());
    client.login("abc123");

    let config = RequestConfig::new()
        .method(HttpMethod::Put)
        .header("Authorization", "Basic dXNlcg==")
        .header("Content-Type", "text/plain")
        .body(RequestBody::Json(json!("raw")));
    let echo: Echo = client.request_json("echo", config).await.unwrap();
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.authorization.as_deref(), Some("Basic dXNlcg=="));
    assert_eq!(echo.content_type.as_deref(), Some("text/plain"));
    assert_eq!(echo.body, "\"raw\"");
}

#[tokio::test]
async fn multipart_upload_round_trips_form_object() {
    let client = client(spawn_server());

    let object = FormObject::new()
        .with("user", "john")
        .with("password", "1234")
        .with("options", vec!["option 1", "option 2"])
        .with(
            "avatar",
            Blob::new(&b"PNG"[..])
                .with_filename("me.png")
                .with_content_type("image/png"),
        );
    let form = FormData::from_object(&object);

    let outcome = client
        .request("upload", RequestConfig::new().body(form))
        .await
        .unwrap();
    let echoed = outcome.into_decoded().and_then(Decoded::into_json).unwrap();
    assert_eq!(echoed, object.to_json());
}

#[tokio::test]
async fn binary_download_and_suggested_filename() {
    let client = client(spawn_server());
    let outcome = client.get("download").await.unwrap();
    let bytes = outcome.into_decoded().unwrap();
    assert_eq!(bytes.as_bytes().map(|b| b.as_ref()), Some(DOWNLOAD_BYTES));
    assert_eq!(client.suggested_filename().as_deref(), Some(DOWNLOAD_FILENAME));
}

#[tokio::test]
async fn text_payload_and_interceptors() {
    let client = client(spawn_server());
    let upper: Arc<dyn ResponseInterceptor> = Arc::new(|data: Decoded, _: &str| match data {
        Decoded::Text(s) => Decoded::Text(s.to_uppercase()),
        other => other,
    });
    let exclaim: Arc<dyn ResponseInterceptor> = Arc::new(|data: Decoded, endpoint: &str| match data {
        Decoded::Text(s) => Decoded::Text(format!("{s}! ({endpoint})")),
        other => other,
    });
    client.add_response_interceptor(upper.clone());
    client.add_response_interceptor(exclaim);

    let outcome = client.get("text").await.unwrap();
    assert_eq!(outcome, Outcome::Completed(Decoded::Text("PLAIN TEXT! (text)".to_string())));

    client.remove_response_interceptor(&upper);
    let outcome = client.get("text").await.unwrap();
    assert_eq!(outcome, Outcome::Completed(Decoded::Text("plain text! (text)".to_string())));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).get("success").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { ref endpoint, .. } if endpoint == "success"));
}
