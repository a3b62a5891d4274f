/// Common test utilities for API tests
///
/// Each [`TestApp`] runs the full router over a fresh in-memory store with a
/// private upload directory, so tests are independent and need no database.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use dtask_api::app::{build_router, AppState};
use dtask_api::config::Config;
use dtask_shared::auth::password::HashParams;
use dtask_shared::store::memory::MemoryStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub app: Router,
    pub upload_dir: PathBuf,
}

/// A registered account
pub struct Account {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let upload_dir = std::env::temp_dir().join(format!("dtask-api-test-{}", Uuid::new_v4()));

        let vars: HashMap<&str, String> = HashMap::from([
            ("JWT_SECRET", "integration-test-secret-0123456789abcdef".to_string()),
            ("UPLOAD_DIR", upload_dir.display().to_string()),
            ("STORE_BACKEND", "memory".to_string()),
        ]);
        let mut config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        config.password = HashParams::insecure_fast();

        let state = AppState::new(Arc::new(MemoryStore::new()), config);

        Self {
            app: build_router(state),
            upload_dir,
        }
    }

    /// Sends a request; the response body is parsed as JSON, or returned as
    /// a JSON string when it is not JSON
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn register(&self, name: &str, email: &str, role: &str, wallet: &str) -> Account {
        let (status, body) = self
            .post("/api/users/register", None, registration(name, email, role, wallet))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        Account {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn client(&self, name: &str) -> Account {
        let email = format!("{}@client.test", name.to_lowercase());
        let wallet = format!("0x{}", name.to_lowercase());
        self.register(name, &email, "Client", &wallet).await
    }

    pub async fn freelancer(&self, name: &str) -> Account {
        let email = format!("{}@freelancer.test", name.to_lowercase());
        let wallet = format!("0x{}", name.to_lowercase());
        self.register(name, &email, "Freelancer", &wallet).await
    }

    /// Posts a task as JSON and returns its ID
    pub async fn post_task(&self, token: &str, title: &str, budget: f64) -> String {
        let (status, body) = self
            .post(
                "/api/tasks",
                Some(token),
                json!({
                    "title": title,
                    "description": "Details",
                    "budget": budget,
                    "deadline": "2026-12-31",
                    "skills": "rust, axum"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "post task failed: {}", body);

        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

pub fn registration(name: &str, email: &str, role: &str, wallet: &str) -> Value {
    json!({
        "fullName": name,
        "email": email,
        "phone": "555-0100",
        "location": "Remote",
        "password": PASSWORD,
        "confirmPassword": PASSWORD,
        "role": role,
        "wallet": wallet
    })
}
