//! HTTP routes for the server.

use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use devpilot_core::{ApplyOptions, CoreError, ProposedEdit};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // ===================
        // Repository endpoints
        // ===================
        .route("/repo/scan", post(repo_scan))
        .route("/repo/rescan", post(repo_rescan))
        .route("/repo/tree", get(repo_tree))
        .route("/repo/snapshot", get(repo_snapshot))
        .route("/repo/metadata", get(repo_metadata))
        // ===================
        // Edit endpoints
        // ===================
        .route("/plan", post(plan))
        .route("/three-way", post(three_way))
        .route("/apply", post(apply))
        .route("/revert", post(revert))
        // ===================
        // Ignore endpoints
        // ===================
        .route("/ignore", get(ignore_get).post(ignore_set))
        .route("/ignore/repo", get(repo_ignore_get).post(repo_ignore_set))
        // ===================
        // Settings and backups
        // ===================
        .route("/settings", get(settings_get).post(settings_update))
        .route("/backups", get(backups_list))
        .route("/backups/clear", post(backups_clear))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

impl ApiError {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(msg, "BAD_REQUEST")))
    }

    fn from_core(err: CoreError) -> (StatusCode, Json<Self>) {
        let (status, code) = match &err {
            CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            CoreError::PathEscape(_) => (StatusCode::BAD_REQUEST, "PATH_ESCAPE"),
            CoreError::NoRepo => (StatusCode::CONFLICT, "NO_REPO"),
            CoreError::RootNotFound(_) | CoreError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            _ => {
                warn!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        (status, Json(Self::new(err.to_string(), code)))
    }
}

/// Unwrap a JSON body, reporting malformed bodies in the API error shape.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, (StatusCode, Json<ApiError>)> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    #[serde(default)]
    repo_root: String,
}

#[derive(Debug, Deserialize)]
struct EditsRequest {
    files: Vec<ProposedEdit>,
}

#[derive(Debug, Deserialize)]
struct ApplyRequest {
    files: Vec<ProposedEdit>,
    #[serde(default, rename = "dryRun", alias = "dry_run")]
    dry_run: bool,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
struct RevertRequest {
    paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PatternsBody {
    patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataQuery {
    path: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "engine": "devpilot",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn repo_scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body(payload)?;
    let summary = state
        .session
        .scan(&req.repo_root)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(json!({ "ok": true, "root": summary.root, "files": summary.files })))
}

async fn repo_rescan(State(state): State<AppState>) -> ApiResult<Value> {
    let summary = state.session.rescan().await.map_err(ApiError::from_core)?;
    Ok(Json(json!({ "ok": true, "root": summary.root, "files": summary.files })))
}

async fn repo_tree(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "root": state.session.tree().await }))
}

async fn repo_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let root = state.session.root().await.map(|r| r.display().to_string());
    let snapshot = state.session.snapshot().await;
    Json(json!({ "root": root, "files": &*snapshot }))
}

async fn repo_metadata(
    State(state): State<AppState>,
    query: Result<Query<MetadataQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let file = state
        .session
        .read_file(&query.path)
        .await
        .map_err(ApiError::from_core)?;
    let snapshot = state.session.snapshot().await;
    Ok(Json(json!({
        "repo": file.repo,
        "file": file.file,
        "code": file.code,
        "snapshot": &*snapshot,
    })))
}

async fn plan(
    State(state): State<AppState>,
    payload: Result<Json<EditsRequest>, JsonRejection>,
) -> ApiResult<devpilot_core::PlanReport> {
    let req = body(payload)?;
    let report = state
        .session
        .plan(&req.files)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(report))
}

async fn three_way(
    State(state): State<AppState>,
    payload: Result<Json<EditsRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body(payload)?;
    let views = state
        .session
        .three_way(&req.files)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(json!({ "files": views })))
}

async fn apply(
    State(state): State<AppState>,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> ApiResult<devpilot_core::ApplyReport> {
    let req = body(payload)?;
    let options = ApplyOptions {
        dry_run: req.dry_run,
        force: req.force,
    };
    let report = state
        .session
        .apply(&req.files, options)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(report))
}

async fn revert(
    State(state): State<AppState>,
    payload: Result<Json<RevertRequest>, JsonRejection>,
) -> ApiResult<devpilot_core::RevertReport> {
    let req = body(payload)?;
    let report = state
        .session
        .revert(&req.paths)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(report))
}

async fn ignore_get(State(state): State<AppState>) -> impl IntoResponse {
    Json(PatternsBody {
        patterns: state.session.ignore_patterns().await,
    })
}

async fn ignore_set(
    State(state): State<AppState>,
    payload: Result<Json<PatternsBody>, JsonRejection>,
) -> ApiResult<PatternsBody> {
    let req = body(payload)?;
    let patterns = state
        .session
        .set_ignore_patterns(&req.patterns)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(PatternsBody { patterns }))
}

async fn repo_ignore_get(State(state): State<AppState>) -> ApiResult<PatternsBody> {
    let patterns = state
        .session
        .repo_ignore_patterns()
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(PatternsBody { patterns }))
}

async fn repo_ignore_set(
    State(state): State<AppState>,
    payload: Result<Json<PatternsBody>, JsonRejection>,
) -> ApiResult<PatternsBody> {
    let req = body(payload)?;
    let patterns = state
        .session
        .set_repo_ignore_patterns(&req.patterns)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(PatternsBody { patterns }))
}

async fn settings_get(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.settings().await)
}

async fn settings_update(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<devpilot_core::Settings> {
    let patch = body(payload)?;
    let settings = state
        .session
        .update_settings(patch)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(settings))
}

async fn backups_list(State(state): State<AppState>) -> ApiResult<Value> {
    let paths = state
        .session
        .list_backups()
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(json!({ "paths": paths })))
}

async fn backups_clear(State(state): State<AppState>) -> ApiResult<Value> {
    let cleared = state
        .session
        .clear_backups()
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(json!({ "ok": true, "cleared": cleared })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use devpilot_core::{RepoSession, SettingsStore};
    use devpilot_test_utils::{edit_json, BuiltTestProject, TestProject};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app() -> (TempDir, Router) {
        let config = TempDir::new().unwrap();
        let session = RepoSession::open(SettingsStore::new(config.path())).await;
        (config, create_router(AppState::new(session)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn scanned(project: &BuiltTestProject) -> (TempDir, Router) {
        let (config, app) = app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/repo/scan",
            Some(json!({ "repo_root": project.root_str() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (config, app)
    }

    #[tokio::test]
    async fn test_health() {
        let (_config, app) = app().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["engine"], "devpilot");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_scan_and_tree() {
        let project = TestProject::new()
            .with_file("src/app.js", "x")
            .with_file("README.md", "y")
            .build();
        let (_config, app) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/repo/scan",
            Some(json!({ "repo_root": project.root_str() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["files"], 2);

        let (_, body) = send(&app, "GET", "/repo/tree", None).await;
        let root = &body["root"];
        assert_eq!(root["name"], "/");
        assert_eq!(root["isDir"], true);
        assert_eq!(root["children"][0]["name"], "README.md");
        assert_eq!(root["children"][0]["children"], Value::Null);
        assert_eq!(root["children"][1]["children"][0]["path"], "src/app.js");

        let (_, body) = send(&app, "GET", "/repo/snapshot", None).await;
        assert_eq!(body["files"]["src/app.js"]["ext"], ".js");
    }

    #[tokio::test]
    async fn test_scan_errors() {
        let (_config, app) = app().await;

        let (status, body) = send(&app, "POST", "/repo/scan", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("repo_root"));

        let (status, _) = send(
            &app,
            "POST",
            "/repo/scan",
            Some(json!({ "repo_root": "/definitely/not/here" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_state_reads() {
        let (_config, app) = app().await;

        let (status, body) = send(&app, "GET", "/repo/tree", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["root"],
            json!({"name": "/", "path": "", "isDir": true, "children": []})
        );

        let (status, body) = send(&app, "GET", "/repo/metadata?path=a.txt", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "NO_REPO");
    }

    #[tokio::test]
    async fn test_metadata() {
        let project = TestProject::new().with_file("a.txt", "hello").build();
        let (_config, app) = scanned(&project).await;

        let (status, body) = send(&app, "GET", "/repo/metadata?path=a.txt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["file"], "a.txt");
        assert_eq!(body["code"], "hello");
        assert_eq!(body["snapshot"]["a.txt"]["size"], 5);

        let (status, _) = send(&app, "GET", "/repo/metadata?path=missing.txt", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/repo/metadata", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_plan_apply_revert_flow() {
        let project = TestProject::new().with_file("a.txt", "hello").build();
        let (_config, app) = scanned(&project).await;
        let files = json!([edit_json("a.txt", "world", Some("hello"))]);

        let (status, body) = send(&app, "POST", "/plan", Some(json!({ "files": files }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["update"], 1);
        assert!(body["update"][0]["diff"]
            .as_str()
            .unwrap()
            .contains("+world"));

        let (status, body) = send(&app, "POST", "/apply", Some(json!({ "files": files }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["written"], json!(["a.txt"]));
        assert_eq!(body["dry_run"], false);
        assert_eq!(project.read_file("a.txt"), "world");

        let (_, body) = send(&app, "GET", "/backups", None).await;
        assert_eq!(body["paths"], json!(["a.txt"]));

        let (status, body) = send(
            &app,
            "POST",
            "/revert",
            Some(json!({ "paths": ["a.txt"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["restored"], json!(["a.txt"]));
        assert_eq!(project.read_file("a.txt"), "hello");
    }

    #[tokio::test]
    async fn test_apply_conflict_and_force() {
        let project = TestProject::new().with_file("a.txt", "world").build();
        let (_config, app) = scanned(&project).await;
        let files = json!([edit_json("a.txt", "world2", Some("wrongguess"))]);

        let (_, body) = send(&app, "POST", "/apply", Some(json!({ "files": files }))).await;
        assert_eq!(body["conflicts"], json!(["a.txt"]));
        assert_eq!(project.read_file("a.txt"), "world");

        let (_, body) = send(
            &app,
            "POST",
            "/apply",
            Some(json!({ "files": files, "force": true })),
        )
        .await;
        assert_eq!(body["written"], json!(["a.txt"]));
        assert_eq!(project.read_file("a.txt"), "world2");
    }

    #[tokio::test]
    async fn test_apply_dry_run() {
        let project = TestProject::new().build();
        let (_config, app) = scanned(&project).await;
        let files = json!([{ "path": "new.txt", "code": "x" }]);

        let (_, body) = send(
            &app,
            "POST",
            "/apply",
            Some(json!({ "files": files, "dryRun": true })),
        )
        .await;
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["written"], json!(["new.txt"]));
        assert!(!project.file_exists("new.txt"));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let project = TestProject::new().build();
        let (_config, app) = scanned(&project).await;
        let files = json!([edit_json("../escape.txt", "x", None)]);

        let (status, body) = send(&app, "POST", "/apply", Some(json!({ "files": files }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PATH_ESCAPE");

        let (status, _) = send(&app, "POST", "/plan", Some(json!({ "files": files }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (_config, app) = app().await;
        let (status, body) = send(&app, "POST", "/plan", Some(json!({ "nope": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_three_way() {
        let project = TestProject::new().with_file("a.txt", "disk").build();
        let (_config, app) = scanned(&project).await;
        let files = json!([edit_json("a.txt", "mine", None)]);

        let (status, body) = send(&app, "POST", "/three-way", Some(json!({ "files": files }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"][0]["expected"], "disk");
        assert_eq!(body["files"][0]["proposed"], "mine");
    }

    #[tokio::test]
    async fn test_ignore_routes() {
        let project = TestProject::new()
            .with_file("build/out.js", "x")
            .with_file("src/app.js", "y")
            .build();
        let (_config, app) = scanned(&project).await;

        let (_, body) = send(&app, "GET", "/ignore", None).await;
        assert!(body["patterns"]
            .as_array()
            .unwrap()
            .contains(&json!("build/**")));

        let (status, body) = send(
            &app,
            "POST",
            "/ignore/repo",
            Some(json!({ "patterns": ["src/**"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patterns"], json!(["src/**"]));

        let (_, body) = send(&app, "GET", "/repo/snapshot", None).await;
        assert_eq!(body["files"].as_object().unwrap().len(), 1);
        assert!(body["files"].get(".devpilotignore").is_some());

        let (_, body) = send(&app, "POST", "/ignore", Some(json!({ "patterns": [] }))).await;
        assert_eq!(body["patterns"], json!([]));
        let (_, body) = send(&app, "GET", "/repo/snapshot", None).await;
        assert!(body["files"].get("build/out.js").is_some());
    }

    #[tokio::test]
    async fn test_settings_routes() {
        let (_config, app) = app().await;

        let (_, body) = send(&app, "GET", "/settings", None).await;
        assert_eq!(body["_schema"], 1);

        let (status, body) = send(
            &app,
            "POST",
            "/settings",
            Some(json!({ "clear_backups_on_scan": false, "theme": "dark" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clear_backups_on_scan"], false);
        assert_eq!(body["theme"], "dark");

        let (status, _) = send(&app, "POST", "/settings", Some(json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backups_clear() {
        let project = TestProject::new().with_file("a.txt", "v1").build();
        let (_config, app) = scanned(&project).await;
        let files = json!([edit_json("a.txt", "v2", None)]);
        send(&app, "POST", "/apply", Some(json!({ "files": files }))).await;

        let (status, body) = send(&app, "POST", "/backups/clear", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 1);
        assert!(project.read_backup("a.txt").is_none());
    }
}
