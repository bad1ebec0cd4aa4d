// ABOUTME: Shared builders for integration tests: in-memory resources and a stub LLM gateway
// ABOUTME: The stub gateway is a real axum server on an ephemeral port speaking the upstream wire format

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use parley_chat_server::{
    broadcast::ConversationBroadcaster,
    config::environment::{DatabaseConfig, GatewayConfig, ServerConfig, SessionConfig},
    database::Database,
    gateway::GatewayClient,
    resources::ServerResources,
    session::SessionManager,
};

// ============================================================================
// Test Resources
// ============================================================================

/// Build server resources over an in-memory database, pointed at the given
/// gateway base URL.
pub async fn create_test_resources(gateway_base_url: &str) -> Arc<ServerResources> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    let database = Database::from_pool(pool);
    database.migrate().await.expect("failed to migrate");

    let config = ServerConfig {
        http_port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
        },
        gateway: GatewayConfig {
            base_url: gateway_base_url.trim_end_matches('/').to_owned(),
            request_timeout_secs: 5,
        },
        session: SessionConfig { capacity: 64 },
    };

    let gateway = GatewayClient::new(&config.gateway).expect("failed to build gateway client");
    let sessions = SessionManager::new(config.session.capacity);
    let broadcaster = ConversationBroadcaster::new();

    Arc::new(ServerResources::new(
        database,
        gateway,
        sessions,
        broadcaster,
        config,
    ))
}

/// Encode a bearer token with the given subject, expiring one hour from now
pub fn make_bearer(subject: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({ "sub": subject, "exp": exp }),
        &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
    )
    .expect("failed to encode test token")
}

// ============================================================================
// Stub LLM Gateway
// ============================================================================

/// How the stub answers chat submissions
#[derive(Clone)]
pub enum SubmitBehavior {
    /// 200 with `{"response": {"message": <text>}}`
    Reply(String),
    /// 200 with a `response` object missing the message field
    EmptyResponse,
    /// The given non-success status
    Status(u16),
    /// 200 with a body that is not JSON
    MalformedBody,
}

/// One recorded chat submission
#[derive(Clone, Debug)]
pub struct SubmitRecord {
    pub provider: String,
    pub model: String,
    pub authorization: Option<String>,
    pub prompt: Value,
}

/// Mutable stub state shared with the running server
pub struct StubGatewayState {
    pub llms_body: Value,
    pub llms_status: u16,
    pub api_keys_body: Value,
    pub api_keys_status: u16,
    pub submit_behavior: SubmitBehavior,
    pub submits: Vec<SubmitRecord>,
}

impl Default for StubGatewayState {
    fn default() -> Self {
        Self {
            llms_body: json!({ "llms": [] }),
            llms_status: 200,
            api_keys_body: json!({ "llm_api_keys": [] }),
            api_keys_status: 200,
            submit_behavior: SubmitBehavior::Reply("stub reply".to_owned()),
            submits: Vec::new(),
        }
    }
}

/// Handle to a running stub gateway
#[derive(Clone)]
pub struct StubGateway {
    pub base_url: String,
    state: Arc<Mutex<StubGatewayState>>,
}

impl StubGateway {
    pub fn set_llms(&self, body: Value) {
        self.lock().llms_body = body;
    }

    pub fn set_llms_status(&self, status: u16) {
        self.lock().llms_status = status;
    }

    pub fn set_api_keys(&self, body: Value) {
        self.lock().api_keys_body = body;
    }

    pub fn set_api_keys_status(&self, status: u16) {
        self.lock().api_keys_status = status;
    }

    pub fn set_submit(&self, behavior: SubmitBehavior) {
        self.lock().submit_behavior = behavior;
    }

    pub fn submits(&self) -> Vec<SubmitRecord> {
        self.lock().submits.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubGatewayState> {
        self.state.lock().expect("stub gateway state poisoned")
    }
}

/// Spawn a stub gateway speaking the upstream wire format on an ephemeral
/// local port. The server lives until the test process exits.
pub async fn spawn_stub_gateway() -> StubGateway {
    let state = Arc::new(Mutex::new(StubGatewayState::default()));

    let app = Router::new()
        .route("/api/llms", get(llms_handler))
        .route("/api/llm_api_keys", get(api_keys_handler))
        .route(
            "/api/llm_api_keys/:provider/models/:model/chats",
            post(submit_handler),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub gateway");
    let addr = listener.local_addr().expect("no local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub gateway died");
    });

    StubGateway {
        base_url: format!("http://{addr}"),
        state,
    }
}

async fn llms_handler(State(state): State<Arc<Mutex<StubGatewayState>>>) -> Response {
    let state = state.lock().expect("stub gateway state poisoned");
    let status = StatusCode::from_u16(state.llms_status).expect("bad status");
    (status, Json(state.llms_body.clone())).into_response()
}

async fn api_keys_handler(State(state): State<Arc<Mutex<StubGatewayState>>>) -> Response {
    let state = state.lock().expect("stub gateway state poisoned");
    let status = StatusCode::from_u16(state.api_keys_status).expect("bad status");
    (status, Json(state.api_keys_body.clone())).into_response()
}

async fn submit_handler(
    State(state): State<Arc<Mutex<StubGatewayState>>>,
    Path((provider, model)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("stub gateway state poisoned");
    state.submits.push(SubmitRecord {
        provider,
        model,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned),
        prompt: body["prompt"].clone(),
    });

    match state.submit_behavior.clone() {
        SubmitBehavior::Reply(text) => (
            StatusCode::OK,
            Json(json!({ "response": { "message": text } })),
        )
            .into_response(),
        SubmitBehavior::EmptyResponse => {
            (StatusCode::OK, Json(json!({ "response": {} }))).into_response()
        }
        SubmitBehavior::Status(code) => (
            StatusCode::from_u16(code).expect("bad status"),
            "stub gateway error",
        )
            .into_response(),
        SubmitBehavior::MalformedBody => {
            let mut response = (StatusCode::OK, "{not-json").into_response();
            response.headers_mut().insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
            response
        }
    }
}
