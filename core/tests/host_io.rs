//! Host-does-IO path: the client only builds requests and interprets
//! responses, a blocking ureq agent does the round-trip in between.

use fetch_core::{
    ApiClient, ClientConfig, ClientError, Decoded, HttpMethod, HttpRequest, HttpResponse, Outcome,
    RequestConfig,
};
use mock_server::{fake_api_data, Echo};
use serde_json::json;

/// Execute an `HttpRequest` using ureq and return an `HttpResponse`.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses come back as data for the client to classify.
fn execute(req: HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let body = req.body.clone().unwrap_or_default();
    let result = match req.method {
        HttpMethod::Get | HttpMethod::Delete | HttpMethod::Head => {
            let mut builder = match req.method {
                HttpMethod::Delete => agent.delete(&req.url),
                HttpMethod::Head => agent.head(&req.url),
                _ => agent.get(&req.url),
            };
            for (name, value) in &req.headers {
                builder = builder.header(name, value);
            }
            builder.call()
        }
        HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
            let mut builder = match req.method {
                HttpMethod::Put => agent.put(&req.url),
                HttpMethod::Patch => agent.patch(&req.url),
                _ => agent.post(&req.url),
            };
            for (name, value) in &req.headers {
                builder = builder.header(name, value);
            }
            builder.send(&body[..])
        }
    };
    let mut response = result.expect("HTTP transport error");

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    let body = response.body_mut().read_to_vec().unwrap_or_default();

    HttpResponse {
        status,
        headers,
        body: body.into(),
    }
}

fn start_server() -> std::net::SocketAddr {
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

#[test]
fn blocking_round_trips() {
    let addr = start_server();
    let client = ApiClient::detached(ClientConfig::new(&format!("http://{addr}")));

    // success
    let req = client.build_request("success", &RequestConfig::new()).unwrap();
    let outcome = client.handle_response("success", execute(req)).unwrap();
    assert_eq!(outcome, Outcome::Completed(Decoded::Json(fake_api_data())));

    // failure
    let req = client.build_request("failure", &RequestConfig::new()).unwrap();
    let err = client.handle_response("failure", execute(req)).unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 404, .. }));
    assert!(err.to_string().contains("Page not found."));

    // token and JSON body reach the server
    client.login("abc123");
    let config = RequestConfig::new()
        .method(HttpMethod::Patch)
        .body(json!({"completed": true}));
    let req = client.build_request("echo", &config).unwrap();
    let echo: Echo = client
        .handle_response("echo", execute(req))
        .unwrap()
        .into_decoded()
        .unwrap()
        .deserialize()
        .unwrap();
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.authorization.as_deref(), Some("Bearer abc123"));
    assert_eq!(echo.body, r#"{"completed":true}"#);

    // 401 short-circuits and clears the token
    let req = client.build_request("unauthorized", &RequestConfig::new()).unwrap();
    let outcome = client.handle_response("unauthorized", execute(req)).unwrap();
    assert_eq!(outcome, Outcome::Unauthorized);
    assert!(!client.is_logged_in());
}
