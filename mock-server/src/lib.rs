use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Password accepted by `/login` for any username.
pub const PASSWORD: &str = "1234";

pub const DOWNLOAD_FILENAME: &str = "report.png";
pub const DOWNLOAD_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user: User,
}

/// What `/echo` saw of the incoming request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

pub fn fake_api_data() -> Value {
    json!({"name": "Joni Baez", "age": "32", "address": "123, Charming Avenue"})
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/success", get(success))
        .route("/failure", get(failure))
        .route("/unauthorized", get(unauthorized))
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
        .route("/download", get(download))
        .route("/text", get(text))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/upload", post(upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn success() -> Json<Value> {
    Json(fake_api_data())
}

async fn failure() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Page not found.")
}

async fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let get_header = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        authorization: get_header(header::AUTHORIZATION),
        content_type: get_header(header::CONTENT_TYPE),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn download() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
            ),
        ],
        DOWNLOAD_BYTES,
    )
}

async fn text() -> &'static str {
    "plain text"
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<Session>, (StatusCode, &'static str)> {
    if input.username.is_empty() || input.password != PASSWORD {
        return Err((StatusCode::FORBIDDEN, "invalid credentials"));
    }
    let session = Session {
        token: Uuid::new_v4(),
        user: User {
            username: input.username,
        },
    };
    db.write().await.insert(session.token, session.user.clone());
    tracing::info!(username = %session.user.username, "session created");
    Ok(Json(session))
}

fn bearer(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .parse()
        .ok()
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> Result<Json<User>, StatusCode> {
    let token = bearer(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let sessions = db.read().await;
    sessions
        .get(&token)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::UNAUTHORIZED)
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer(&headers) {
        if db.write().await.remove(&token).is_some() {
            tracing::info!(%token, "session removed");
        }
    }
    StatusCode::NO_CONTENT
}

/// Collapse a multipart upload into a flat object: repeated names become
/// arrays, files are represented by their filename.
async fn upload(mut multipart: Multipart) -> Result<Json<Value>, (StatusCode, String)> {
    let bad_request =
        |e: axum::extract::multipart::MultipartError| (StatusCode::BAD_REQUEST, e.to_string());

    let mut fields: Map<String, Value> = Map::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let value = match filename {
            Some(filename) => Value::String(filename),
            None => Value::String(field.text().await.map_err(bad_request)?),
        };
        match fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(name, value);
            }
        }
    }
    Ok(Json(Value::Object(fields)))
}
