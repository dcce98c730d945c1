//! In-process harness: a migrated in-memory database, a throwaway upload
//! directory, and helpers that drive the router with `oneshot`.

#![allow(dead_code)]

use std::sync::OnceLock;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use clubhouse::{
    auth, db,
    users::{self, NewUser, Role, User},
    AppState, Config,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";

/// argon2 is slow on purpose; hash the shared test password once.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| auth::hash_password(PASSWORD).expect("hash test password"))
        .clone()
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub uploads: tempfile::TempDir,
}

/// A seeded account with a ready bearer token.
#[derive(Clone)]
pub struct Member {
    pub user: User,
    pub token: String,
}

impl Member {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let uploads = tempfile::tempdir().expect("temp upload dir");
        let mut config = Config {
            jwt_secret: b"integration-test-secret".to_vec(),
            upload_dir: uploads.path().to_owned(),
            ..Config::default()
        };
        tweak(&mut config);

        let db_pool = db::memory().await.expect("in-memory database");
        let state = AppState::new(db_pool, config).expect("app state");
        let router = clubhouse::app(state.clone());
        TestApp { state, router, uploads }
    }

    pub async fn member(&self, username: &str, role: Role) -> Member {
        let user = users::insert(
            &self.state.db_pool,
            &NewUser {
                username: username.to_owned(),
                password_hash: password_hash(),
                email: format!("{username}@club.org"),
                role,
                department: Some("CS".to_owned()),
                year: Some(2),
            },
        )
        .await
        .expect("seed user");
        let token = self.state.keys.issue(&user).expect("issue token");
        Member { user, token }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.expect("read body").to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply { status, headers, body }
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("build request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, who: &Member) -> Reply {
        self.call(Method::GET, uri, Some(&who.token), None).await
    }

    pub async fn post(&self, uri: &str, who: &Member, body: Value) -> Reply {
        self.call(Method::POST, uri, Some(&who.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, who: &Member, body: Value) -> Reply {
        self.call(Method::PUT, uri, Some(&who.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, who: &Member) -> Reply {
        self.call(Method::DELETE, uri, Some(&who.token), None).await
    }

    pub async fn multipart(&self, uri: &str, who: &Member, parts: &[Part<'_>]) -> Reply {
        const BOUNDARY: &str = "clubhouse-test-boundary";
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                    );
                }
                Part::File { name, filename, content_type, bytes } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", who.token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .expect("build multipart request");
        self.send(request).await
    }

    /// Makes `a` and `b` friends through the public endpoints.
    pub async fn befriend(&self, a: &Member, b: &Member) {
        let sent = self
            .post("/api/friends/request", a, serde_json::json!({ "receiver_id": b.id() }))
            .await;
        assert_eq!(sent.status, StatusCode::CREATED, "{}", sent.body);
        let id = sent.body["id"].as_str().expect("request id").to_owned();
        let accepted = self
            .put(&format!("/api/friends/request/{id}/accept"), b, Value::Null)
            .await;
        assert_eq!(accepted.status, StatusCode::OK, "{}", accepted.body);
    }
}

pub enum Part<'a> {
    Text { name: &'a str, value: &'a str },
    File { name: &'a str, filename: &'a str, content_type: &'a str, bytes: &'a [u8] },
}
