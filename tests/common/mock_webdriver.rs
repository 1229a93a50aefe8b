// Scripted WebDriver server for driving pageshot without a browser.
// Serves the W3C endpoints fantoccini uses, simulates the login form and a
// page of configurable size, and records every command that changes state.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{MOCK_EMAIL, MOCK_PASSWORD};

pub const SESSION_ID: &str = "mock-session";

// 1x1 PNG
const PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// What the simulated page looks like
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Reported by the content width script
    pub page_width: i64,
    /// Reported by the content height script
    pub page_height: i64,
    /// Selectors present on every page; ids are written as `#id`
    pub elements: Vec<String>,
    /// Selectors that only appear after being looked up this many times
    pub late_elements: Vec<(String, usize)>,
    /// 1-based page screenshot that fails with "unable to capture screen"
    pub fail_screenshot: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            page_width: 1920,
            page_height: 4000,
            elements: [
                "#email_id",
                "#password",
                "#submitBtn",
                "body",
                "#main-content",
                ".card .title",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            late_elements: Vec::new(),
            fail_screenshot: None,
        }
    }
}

#[derive(Debug)]
struct DriverState {
    config: DriverConfig,
    capabilities: Value,
    current_url: String,
    window: (u64, u64),
    element_ids: Vec<String>,
    values: HashMap<String, String>,
    lookups: HashMap<String, usize>,
    screenshots: usize,
    commands: Vec<String>,
}

impl DriverState {
    fn new(config: DriverConfig) -> Self {
        let mut values = HashMap::new();
        values.insert("#email_id".to_string(), "prefilled@example.com".to_string());
        Self {
            config,
            capabilities: Value::Null,
            current_url: "about:blank".to_string(),
            window: (800, 600),
            element_ids: Vec::new(),
            values,
            lookups: HashMap::new(),
            screenshots: 0,
            commands: Vec::new(),
        }
    }

    fn record(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    /// Element id for a selector, allocating one on first use
    fn element_id(&mut self, selector: &str) -> String {
        let index = match self.element_ids.iter().position(|s| s == selector) {
            Some(index) => index,
            None => {
                self.element_ids.push(selector.to_string());
                self.element_ids.len() - 1
            }
        };
        format!("el-{index}")
    }

    fn selector(&self, element_id: &str) -> Option<String> {
        let index: usize = element_id.strip_prefix("el-")?.parse().ok()?;
        self.element_ids.get(index).cloned()
    }

    fn is_present(&mut self, selector: &str) -> bool {
        if self.config.elements.iter().any(|s| s == selector) {
            return true;
        }
        let Some(after) = self
            .config
            .late_elements
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, after)| *after)
        else {
            return false;
        };
        let seen = self.lookups.entry(selector.to_string()).or_insert(0);
        *seen += 1;
        *seen > after
    }

    fn submit_login(&mut self) {
        let base = self
            .current_url
            .split("/HRSmart/")
            .next()
            .unwrap_or_default()
            .to_string();
        let email = self.values.get("#email_id").map(String::as_str);
        let password = self.values.get("#password").map(String::as_str);
        self.current_url = if email == Some(MOCK_EMAIL) && password == Some(MOCK_PASSWORD) {
            format!("{base}/dashboard")
        } else {
            format!("{base}/HRSmart/index.php?err=1")
        };
    }
}

type SharedState = Arc<Mutex<DriverState>>;

/// Handle to a running mock WebDriver server
pub struct MockWebDriver {
    pub url: String,
    state: SharedState,
}

impl MockWebDriver {
    /// Serve a mock driver on a free local port from its own thread and runtime
    pub fn start(config: DriverConfig) -> Self {
        let state = Arc::new(Mutex::new(DriverState::new(config)));

        let std_listener =
            std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind mock WebDriver");
        let addr: SocketAddr = std_listener.local_addr().unwrap();
        std_listener
            .set_nonblocking(true)
            .expect("Failed to set non-blocking");

        let app = create_driver_app(state.clone());
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
            runtime.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener)
                    .expect("Failed to adopt listener");
                axum::serve(listener, app)
                    .await
                    .expect("Mock WebDriver failed");
            });
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap()
    }

    /// State-changing commands in the order they arrived
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Commands starting at the first one equal to `first`
    pub fn commands_from(&self, first: &str) -> Vec<String> {
        let commands = self.commands();
        match commands.iter().position(|c| c == first) {
            Some(start) => commands[start..].to_vec(),
            None => panic!("{:?} never sent, commands: {:?}", first, commands),
        }
    }

    pub fn window(&self) -> (u64, u64) {
        self.state().window
    }

    pub fn current_url(&self) -> String {
        self.state().current_url.clone()
    }

    pub fn field_value(&self, selector: &str) -> Option<String> {
        self.state().values.get(selector).cloned()
    }

    /// `alwaysMatch` capabilities of the new session request
    pub fn capabilities(&self) -> Value {
        self.state().capabilities.clone()
    }
}

fn create_driver_app(state: SharedState) -> Router {
    Router::new()
        .route("/session", post(new_session))
        .route("/session/:session", delete(delete_session))
        .route("/session/:session/url", get(current_url).post(navigate))
        .route("/session/:session/element", post(find_element))
        .route(
            "/session/:session/element/:element/displayed",
            get(is_displayed),
        )
        .route("/session/:session/element/:element/clear", post(clear))
        .route("/session/:session/element/:element/value", post(send_keys))
        .route("/session/:session/element/:element/click", post(click))
        .route(
            "/session/:session/element/:element/screenshot",
            get(element_screenshot),
        )
        .route("/session/:session/execute/sync", post(execute))
        .route(
            "/session/:session/window/rect",
            get(window_rect).post(set_window_rect),
        )
        .route("/session/:session/screenshot", get(screenshot))
        .with_state(state)
}

fn ok(value: Value) -> Response {
    Json(json!({ "value": value })).into_response()
}

fn error(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "value": { "error": error, "message": message, "stacktrace": "" }
        })),
    )
        .into_response()
}

fn stale(element: &str) -> Response {
    error(
        StatusCode::NOT_FOUND,
        "no such element",
        &format!("unknown element {element}"),
    )
}

async fn new_session(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    state.capabilities = body["capabilities"]["alwaysMatch"].clone();
    state.record("new session");
    ok(json!({ "sessionId": SESSION_ID, "capabilities": {} }))
}

async fn delete_session(State(state): State<SharedState>) -> Response {
    state.lock().unwrap().record("delete session");
    ok(Value::Null)
}

async fn current_url(State(state): State<SharedState>) -> Response {
    ok(json!(state.lock().unwrap().current_url))
}

#[derive(Deserialize)]
struct NavigateRequest {
    url: String,
}

async fn navigate(
    State(state): State<SharedState>,
    Json(request): Json<NavigateRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record(format!("navigate {}", request.url));
    state.current_url = request.url;
    ok(Value::Null)
}

#[derive(Deserialize)]
struct FindRequest {
    using: String,
    value: String,
}

/// `Locator::Id` arrives as an XPath; map it back to `#id`
fn locator_selector(request: &FindRequest) -> String {
    if request.using == "xpath" {
        if let Some(id) = request
            .value
            .strip_prefix("//*[@id=\"")
            .and_then(|rest| rest.strip_suffix("\"]"))
        {
            return format!("#{id}");
        }
    }
    request.value.clone()
}

async fn find_element(
    State(state): State<SharedState>,
    Json(request): Json<FindRequest>,
) -> Response {
    let selector = locator_selector(&request);
    let mut state = state.lock().unwrap();
    if !state.is_present(&selector) {
        return error(
            StatusCode::NOT_FOUND,
            "no such element",
            &format!("no element matches {selector}"),
        );
    }
    let id = state.element_id(&selector);
    ok(json!({ "element-6066-11e4-a52e-4f735466cecf": id }))
}

async fn is_displayed(
    State(state): State<SharedState>,
    Path((_, element)): Path<(String, String)>,
) -> Response {
    match state.lock().unwrap().selector(&element) {
        Some(_) => ok(json!(true)),
        None => stale(&element),
    }
}

async fn clear(
    State(state): State<SharedState>,
    Path((_, element)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock().unwrap();
    let Some(selector) = state.selector(&element) else {
        return stale(&element);
    };
    state.values.insert(selector, String::new());
    ok(Value::Null)
}

#[derive(Deserialize)]
struct SendKeysRequest {
    text: String,
}

async fn send_keys(
    State(state): State<SharedState>,
    Path((_, element)): Path<(String, String)>,
    Json(request): Json<SendKeysRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    let Some(selector) = state.selector(&element) else {
        return stale(&element);
    };
    state.record(format!("type {} {}", selector, request.text));
    state
        .values
        .entry(selector)
        .or_default()
        .push_str(&request.text);
    ok(Value::Null)
}

async fn click(
    State(state): State<SharedState>,
    Path((_, element)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock().unwrap();
    let Some(selector) = state.selector(&element) else {
        return stale(&element);
    };
    state.record(format!("click {selector}"));
    if selector == "#submitBtn" {
        state.submit_login();
    }
    ok(Value::Null)
}

async fn element_screenshot(
    State(state): State<SharedState>,
    Path((_, element)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock().unwrap();
    let Some(selector) = state.selector(&element) else {
        return stale(&element);
    };
    state.record(format!("element screenshot {selector}"));
    ok(json!(PNG_BASE64))
}

#[derive(Deserialize)]
struct ExecuteRequest {
    script: String,
}

async fn execute(
    State(state): State<SharedState>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    if request.script.contains("scrollTo") {
        state.record("scroll to top");
        ok(Value::Null)
    } else if request.script.contains("Height") {
        ok(json!(state.config.page_height))
    } else if request.script.contains("Width") {
        ok(json!(state.config.page_width))
    } else {
        ok(Value::Null)
    }
}

async fn window_rect(State(state): State<SharedState>) -> Response {
    let (width, height) = state.lock().unwrap().window;
    ok(json!({ "x": 0, "y": 0, "width": width, "height": height }))
}

async fn set_window_rect(
    State(state): State<SharedState>,
    Json(request): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let width = request["width"].as_u64().unwrap_or(state.window.0);
    let height = request["height"].as_u64().unwrap_or(state.window.1);
    state.window = (width, height);
    state.record(format!("resize {width}x{height}"));
    ok(json!({ "x": 0, "y": 0, "width": width, "height": height }))
}

async fn screenshot(State(state): State<SharedState>) -> Response {
    let mut state = state.lock().unwrap();
    state.screenshots += 1;
    if state.config.fail_screenshot == Some(state.screenshots) {
        state.record("screenshot failed");
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unable to capture screen",
            "mock screenshot failure",
        );
    }
    state.record("screenshot");
    ok(json!(PNG_BASE64))
}
