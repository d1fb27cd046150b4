#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tenant_todo_api::config::AppConfig;
use tenant_todo_api::database::models::Tenant;
use tenant_todo_api::database::{MemoryStore, Store};
use tenant_todo_api::services::tenant_service::CreateTenantInput;
use tenant_todo_api::services::{TenantService, UserService};
use tenant_todo_api::{app, AppState};

pub const PASSWORD: &str = "Secret123!";

/// Main domain of `AppConfig::in_memory()`
pub const MAIN_HOST: &str = "todo.test";

/// The router driven in-process against a fresh memory store
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub struct Response {
    pub status: StatusCode,
    pub body: Value,
}

impl Response {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// A registered user and its access token
pub struct Session {
    pub host: String,
    pub token: String,
    pub refresh_token: String,
    pub user_id: String,
}

pub fn host(subdomain: &str) -> String {
    format!("{}.todo.test", subdomain)
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::in_memory())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store).expect("state");
        let router = app(state.clone());
        Self { state, router }
    }

    pub async fn tenant(&self, name: &str, subdomain: &str) -> Tenant {
        TenantService::new(&self.state)
            .create(CreateTenantInput {
                name: name.to_string(),
                subdomain: subdomain.to_string(),
                primary_color: Some("#336699".to_string()),
                logo_url: None,
            })
            .await
            .expect("create tenant")
    }

    pub async fn request(
        &self,
        method: Method,
        host: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path).header(header::HOST, host);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self.router.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }))
        };
        Response { status, body }
    }

    pub async fn get(&self, host: &str, path: &str, token: Option<&str>) -> Response {
        self.request(Method::GET, host, path, token, None).await
    }

    pub async fn post(&self, host: &str, path: &str, token: Option<&str>, body: Value) -> Response {
        self.request(Method::POST, host, path, token, Some(body)).await
    }

    pub async fn patch(&self, host: &str, path: &str, token: Option<&str>, body: Value) -> Response {
        self.request(Method::PATCH, host, path, token, Some(body)).await
    }

    pub async fn delete(&self, host: &str, path: &str, token: Option<&str>) -> Response {
        self.request(Method::DELETE, host, path, token, None).await
    }

    pub async fn register(&self, subdomain: &str, email: &str) -> Session {
        let host = host(subdomain);
        let res = self
            .post(&host, "/auth/register", None, json!({ "email": email, "password": PASSWORD, "name": "Test User" }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
        Session {
            token: res.data()["access_token"].as_str().expect("access token").to_string(),
            refresh_token: res.data()["refresh_token"].as_str().expect("refresh token").to_string(),
            user_id: res.data()["user"]["id"].as_str().expect("user id").to_string(),
            host,
        }
    }

    /// Registers a user and grants ADMIN the way the operator CLI does
    pub async fn register_admin(&self, tenant: &Tenant, email: &str) -> Session {
        let session = self.register(&tenant.subdomain, email).await;
        UserService::new(&self.state)
            .promote_by_email(tenant.id, email)
            .await
            .expect("promote");
        session
    }
}

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// The real binary, started once per test process in memory mode
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tenant-todo-api"));
        cmd.env("APP_ENV", "development")
            .env("APP_PORT", port.to_string())
            .env("DATABASE_BACKEND", "memory")
            .env("SERVER_MAIN_DOMAIN", "localhost")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}
