//! Mock appliance API for testing
//!
//! Serves the metrics, docker, dongle, settings and users endpoints from
//! in-memory state. Individual paths can be made to fail or to respond
//! slowly, and every request is counted per path.

#![allow(dead_code)]

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Mock backend state
struct MockPiState {
    summary: Value,
    health: Value,
    disk: Value,
    usb: Value,
    containers: Value,
    dongle: Value,
    history: Value,
    settings: Value,
    users: Vec<Value>,
    smtp_status: Value,
    token: Option<String>,
    current_password: String,
    failures: HashMap<String, u16>,
    latency: HashMap<String, Duration>,
    requests: HashMap<String, usize>,
    container_actions: Vec<(String, String)>,
    next_link_id: usize,
}

type Shared = Arc<RwLock<MockPiState>>;

pub fn summary(cpu: f64) -> Value {
    json!({
        "cpu": {
            "overall_usage": cpu,
            "per_core_usage": [cpu, cpu, cpu, cpu],
            "current_frequency": 1500.0,
            "load_average": { "1_min": 0.5, "5_min": 0.4, "15_min": 0.3 }
        },
        "memory": { "total": 4096, "used": 1024, "available": 3072, "percent": 25.0 },
        "temperature": { "cpu_temp": 48.5, "unit": "C" },
        "disk": { "filesystems": [{ "device": "/dev/mmcblk0p2", "mountpoint": "/", "percent": 40.0 }] },
        "network": { "interfaces": [], "stats": {} }
    })
}

pub fn link(id: &str, name: &str, url: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "url": url,
        "icon": "🔗",
        "enabled": true,
        "show_on_dashboard": true
    })
}

impl Default for MockPiState {
    fn default() -> Self {
        Self {
            summary: summary(12.5),
            health: json!({ "status": "healthy", "timestamp": "2024-05-01T09:00:00" }),
            disk: json!({
                "filesystems": [{ "device": "/dev/mmcblk0p2", "mountpoint": "/", "fstype": "ext4", "percent": 40.0 }],
                "io_stats": {}
            }),
            usb: json!({ "devices": [{ "bus": "001", "device": "003", "description": "Huawei E3372" }] }),
            containers: json!({
                "containers": [
                    { "id": "abc123", "name": "jellyfin", "image": "jellyfin/jellyfin", "status": "running" },
                    { "id": "def456", "name": "backup", "image": "restic/restic", "status": "exited" }
                ]
            }),
            dongle: json!({
                "connected": true,
                "signal": { "strength": 3, "color": "yellow", "status": {} },
                "sms_messages": [
                    { "index": "40001", "from": "+61400000000", "message": "hello", "unread": true },
                    { "index": "40002", "from": "Telstra", "message": "usage alert", "unread": false }
                ]
            }),
            history: json!([
                { "ts": "2024-05-01T08:59:56", "time": "08:59:56", "cpu": 10.0, "memory": 25.0, "temp": 47.0 },
                { "ts": "2024-05-01T08:59:58", "time": "08:59:58", "cpu": 11.0, "memory": 25.0, "temp": 47.5 },
                { "ts": "2024-05-01T09:00:00", "time": "09:00:00", "cpu": 12.0, "memory": 25.0, "temp": 48.0 }
            ]),
            settings: json!({
                "refresh_rate": 2,
                "service_links": [
                    link("a", "Jellyfin", "http://localhost:8096"),
                    link("b", "Home Assistant", "http://127.0.0.1:8123"),
                    link("c", "Wiki", "https://wiki.example.com")
                ]
            }),
            users: vec![json!({ "username": "admin", "role": "admin", "is_active": true })],
            smtp_status: json!({ "active": true, "configured": true, "last_error": null }),
            token: None,
            current_password: "changeme".to_string(),
            failures: HashMap::new(),
            latency: HashMap::new(),
            requests: HashMap::new(),
            container_actions: Vec::new(),
            next_link_id: 1,
        }
    }
}

/// Mock appliance API server
pub struct MockPiApi {
    addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockPiApi {
    /// Start a mock API on a random port
    pub async fn start() -> Self {
        let state: Shared = Arc::new(RwLock::new(MockPiState::default()));

        let app = Router::new()
            .route("/api/metrics/summary", get(metrics_summary))
            .route("/api/metrics/disk", get(metrics_disk))
            .route("/api/metrics/history", get(metrics_history))
            .route("/api/health", get(health))
            .route("/api/usb/devices", get(usb_devices))
            .route("/api/docker/containers", get(containers))
            .route("/api/docker/containers/{id}/{action}", post(container_action))
            .route("/api/dongle/status", get(dongle_status))
            .route("/api/dongle/sms/{index}/delete", post(delete_sms))
            .route("/api/settings/", get(get_settings).put(put_settings))
            .route("/api/settings/service-links", post(add_link))
            .route(
                "/api/settings/service-links/{id}",
                put(update_link).delete(delete_link),
            )
            .route("/api/settings/smtp", put(put_smtp))
            .route("/api/settings/smtp/status", get(smtp_status))
            .route("/api/settings/smtp/test", post(smtp_test))
            .route("/api/settings/api-keys", put(put_api_keys))
            .route("/api/settings/resolved/{hostname}", get(resolved_links))
            .route("/api/users", get(list_users).post(create_user))
            .route("/api/users/me/change-password", post(change_password))
            .route("/api/users/{username}", axum::routing::patch(update_user))
            .route("/api/users/{username}/reset-password", post(reset_password))
            .layer(middleware::from_fn_with_state(state.clone(), gate))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Require `Authorization: Bearer <token>` on every request
    pub async fn require_token(&self, token: &str) {
        self.state.write().await.token = Some(token.to_string());
    }

    /// Answer `path` with `status` until cleared
    pub async fn fail(&self, path: &str, status: u16) {
        self.state
            .write()
            .await
            .failures
            .insert(path.to_string(), status);
    }

    pub async fn clear_failure(&self, path: &str) {
        self.state.write().await.failures.remove(path);
    }

    /// Delay responses for `path`
    pub async fn set_latency(&self, path: &str, delay: Duration) {
        self.state
            .write()
            .await
            .latency
            .insert(path.to_string(), delay);
    }

    pub async fn requests(&self, path: &str) -> usize {
        self.state
            .read()
            .await
            .requests
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_requests(&self) -> usize {
        self.state.read().await.requests.values().sum()
    }

    pub async fn set_summary(&self, value: Value) {
        self.state.write().await.summary = value;
    }

    /// Serve the health payload as `{"data": null}` (not collected yet)
    pub async fn set_health_empty(&self) {
        self.state.write().await.health = Value::Null;
    }

    pub async fn set_history(&self, value: Value) {
        self.state.write().await.history = value;
    }

    pub async fn container_actions(&self) -> Vec<(String, String)> {
        self.state.read().await.container_actions.clone()
    }

    pub async fn sms_indexes(&self) -> Vec<String> {
        self.state.read().await.dongle["sms_messages"]
            .as_array()
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| m["index"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stored copy of link `id`
    pub async fn stored_link(&self, id: &str) -> Option<Value> {
        self.state.read().await.settings["service_links"]
            .as_array()?
            .iter()
            .find(|l| l["id"] == id)
            .cloned()
    }

    pub async fn settings(&self) -> Value {
        self.state.read().await.settings.clone()
    }

    pub async fn users(&self) -> Vec<Value> {
        self.state.read().await.users.clone()
    }

    pub async fn current_password(&self) -> String {
        self.state.read().await.current_password.clone()
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

/// Auth check, request counting, injected latency and failures
async fn gate(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let (token, failure, latency) = {
        let mut state = state.write().await;
        *state.requests.entry(path.clone()).or_insert(0) += 1;
        (
            state.token.clone(),
            state.failures.get(&path).copied(),
            state.latency.get(&path).copied(),
        )
    };

    if let Some(delay) = latency {
        tokio::time::sleep(delay).await;
    }

    if let Some(token) = token {
        let expected = format!("Bearer {}", token);
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })))
                .into_response();
        }
    }

    if let Some(status) = failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "detail": "injected failure" }))).into_response();
    }

    next.run(request).await
}

/// The backend wraps cached streams in `{data, meta}`
fn envelope(data: Value) -> Json<Value> {
    Json(json!({ "data": data, "meta": { "stale": false, "expired": false, "age": 1.0 } }))
}

async fn metrics_summary(State(state): State<Shared>) -> Json<Value> {
    envelope(state.read().await.summary.clone())
}

async fn metrics_disk(State(state): State<Shared>) -> Json<Value> {
    envelope(state.read().await.disk.clone())
}

async fn metrics_history(State(state): State<Shared>) -> Json<Value> {
    envelope(state.read().await.history.clone())
}

async fn health(State(state): State<Shared>) -> Json<Value> {
    let health = state.read().await.health.clone();
    if health.is_null() {
        envelope(Value::Null)
    } else {
        // Bare payload
        Json(health)
    }
}

async fn usb_devices(State(state): State<Shared>) -> Json<Value> {
    Json(state.read().await.usb.clone())
}

async fn containers(State(state): State<Shared>) -> Json<Value> {
    Json(state.read().await.containers.clone())
}

async fn container_action(
    State(state): State<Shared>,
    Path((id, action)): Path<(String, String)>,
) -> Response {
    if !matches!(action.as_str(), "start" | "stop" | "restart") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Unknown action" }))).into_response();
    }

    let mut state = state.write().await;
    state.container_actions.push((id.clone(), action.clone()));

    let status = if action == "stop" { "exited" } else { "running" };
    if let Some(list) = state.containers["containers"].as_array_mut() {
        for container in list.iter_mut().filter(|c| c["id"] == id.as_str()) {
            container["status"] = json!(status);
        }
    }

    Json(json!({ "message": format!("Container {} {}ed", id, action) })).into_response()
}

async fn dongle_status(State(state): State<Shared>) -> Json<Value> {
    envelope(state.read().await.dongle.clone())
}

async fn delete_sms(State(state): State<Shared>, Path(index): Path<String>) -> Json<Value> {
    let mut state = state.write().await;
    if let Some(msgs) = state.dongle["sms_messages"].as_array_mut() {
        msgs.retain(|m| m["index"] != index.as_str());
    }
    Json(json!({ "message": "SMS deleted" }))
}

async fn get_settings(State(state): State<Shared>) -> Json<Value> {
    Json(state.read().await.settings.clone())
}

async fn put_settings(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.write().await.settings = body;
    Json(json!({ "message": "Settings updated successfully" }))
}

async fn add_link(State(state): State<Shared>, Json(mut body): Json<Value>) -> Json<Value> {
    let mut state = state.write().await;
    let id = format!("new-{}", state.next_link_id);
    state.next_link_id += 1;
    body["id"] = json!(id);
    if let Some(links) = state.settings["service_links"].as_array_mut() {
        links.push(body);
    }
    Json(json!({ "message": "Service link added successfully" }))
}

async fn update_link(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.write().await;
    let Some(links) = state.settings["service_links"].as_array_mut() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match links.iter_mut().find(|l| l["id"] == id.as_str()) {
        Some(existing) => {
            *existing = body;
            existing["id"] = json!(id);
            Json(json!({ "message": "Service link updated successfully" })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Service link not found" })))
            .into_response(),
    }
}

async fn delete_link(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let mut state = state.write().await;
    if let Some(links) = state.settings["service_links"].as_array_mut() {
        links.retain(|l| l["id"] != id.as_str());
    }
    Json(json!({ "message": "Service link deleted successfully" }))
}

async fn put_smtp(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.write().await.settings["smtp_settings"] = body;
    Json(json!({ "message": "SMTP settings updated successfully" }))
}

async fn smtp_status(State(state): State<Shared>) -> Json<Value> {
    Json(state.read().await.smtp_status.clone())
}

async fn smtp_test() -> Json<Value> {
    Json(json!({ "message": "Test email sent" }))
}

async fn put_api_keys(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.write().await.settings["api_keys"] = body;
    Json(json!({ "message": "API keys updated successfully" }))
}

async fn resolved_links(State(state): State<Shared>, Path(hostname): Path<String>) -> Json<Value> {
    let state = state.read().await;
    let links: Vec<Value> = state.settings["service_links"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|mut l| {
            if let Some(url) = l["url"].as_str() {
                let resolved = url
                    .replace("localhost", &hostname)
                    .replace("127.0.0.1", &hostname);
                l["url"] = json!(resolved);
            }
            l
        })
        .collect();
    Json(json!({ "service_links": links }))
}

async fn list_users(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "users": state.read().await.users.clone() }))
}

async fn create_user(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.write().await;
    if state.users.iter().any(|u| u["username"] == body["username"]) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Username already exists" })),
        )
            .into_response();
    }
    state.users.push(json!({
        "username": body["username"],
        "role": body["role"],
        "is_active": body["is_active"]
    }));
    Json(json!({ "message": "User created" })).into_response()
}

async fn update_user(
    State(state): State<Shared>,
    Path(username): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.write().await;
    match state
        .users
        .iter_mut()
        .find(|u| u["username"] == username.as_str())
    {
        Some(user) => {
            if let Some(role) = body.get("role") {
                user["role"] = role.clone();
            }
            if let Some(active) = body.get("is_active") {
                user["is_active"] = active.clone();
            }
            Json(json!({ "message": "User updated" })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "User not found" }))).into_response(),
    }
}

async fn reset_password(
    State(state): State<Shared>,
    Path(username): Path<String>,
    Json(_body): Json<Value>,
) -> Response {
    let state = state.read().await;
    if state.users.iter().any(|u| u["username"] == username.as_str()) {
        Json(json!({ "message": "Password reset" })).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "detail": "User not found" }))).into_response()
    }
}

async fn change_password(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.write().await;
    if body["current_password"] != state.current_password.as_str() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Current password incorrect" })),
        )
            .into_response();
    }
    if let Some(new_password) = body["new_password"].as_str() {
        state.current_password = new_password.to_string();
    }
    Json(json!({ "message": "Password changed" })).into_response()
}
