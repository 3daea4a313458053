//! HTTP 接口（axum）
//!
//! `/health`、`/chat`、`/agents` 与学科数据 `/subjects/...`、`/materials/search`。
//! 错误统一映射为 `(StatusCode, String)`。

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::agents::AgentInfo;
use crate::core::{ChatError, DataError};
use crate::data::{Material, Quiz, Syllabus, SubjectCatalog};
use crate::service::{ChatRequest, ChatResponse, ChatService};

const UNEXPECTED: &str = "An unexpected error occurred.";

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub struct AppState {
    pub service: ChatService,
    pub catalog: SubjectCatalog,
}

impl AppState {
    pub fn new(service: ChatService) -> Self {
        let catalog = SubjectCatalog::new(service.config().app.data_path.clone());
        Self { service, catalog }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/agents", get(agents))
        .route("/subjects", get(subjects))
        .route("/subjects/:subject/syllabus", get(syllabus))
        .route("/subjects/:subject/materials", get(materials))
        .route("/subjects/:subject/quizzes", get(quizzes))
        .route("/materials/search", get(search))
        .with_state(state)
}

fn chat_error(e: ChatError) -> (StatusCode, String) {
    match e {
        ChatError::EmptyMessage => (StatusCode::BAD_REQUEST, "message is required".to_string()),
        ChatError::Configuration(e) => {
            error!(error = %e, "configuration error");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        other => {
            error!(error = %other, "chat failed");
            (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED.to_string())
        }
    }
}

fn data_error(e: DataError) -> (StatusCode, String) {
    match e {
        DataError::UnknownSubject(s) => (StatusCode::NOT_FOUND, format!("Subject not found: {s}")),
        other => {
            error!(error = %other, "subject data error");
            (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED.to_string())
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    state.service.run_chat(&req).await.map(Json).map_err(chat_error)
}

async fn agents(State(state): State<Arc<AppState>>) -> ApiResult<Vec<AgentInfo>> {
    state
        .service
        .list_agents_info()
        .await
        .map(Json)
        .map_err(|e| chat_error(e.into()))
}

async fn subjects(State(state): State<Arc<AppState>>) -> Json<Vec<&'static str>> {
    Json(state.catalog.subjects().to_vec())
}

async fn syllabus(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> ApiResult<Syllabus> {
    state.catalog.load_syllabus(&subject).map(Json).map_err(data_error)
}

#[derive(Debug, Deserialize)]
struct MaterialsQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn materials(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(q): Query<MaterialsQuery>,
) -> ApiResult<Vec<Material>> {
    state
        .catalog
        .load_materials(&subject, q.kind.as_deref())
        .map(Json)
        .map_err(data_error)
}

#[derive(Debug, Deserialize)]
struct QuizQuery {
    topic: Option<String>,
}

async fn quizzes(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(q): Query<QuizQuery>,
) -> ApiResult<Vec<Quiz>> {
    state
        .catalog
        .load_quizzes(&subject, q.topic.as_deref())
        .map(Json)
        .map_err(data_error)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    subject: Option<String>,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Vec<Material>> {
    state
        .catalog
        .search_materials(&q.q, q.subject.as_deref())
        .map(Json)
        .map_err(data_error)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::llm::MockLlmClient;
    use crate::service::SharedClientFactory;

    fn app(mock: Arc<MockLlmClient>, data: &std::path::Path, api_key: Option<&str>) -> Router {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = api_key.map(String::from);
        cfg.app.data_path = data.to_path_buf();
        let service = ChatService::with_factory(cfg, Arc::new(SharedClientFactory(mock)));
        router(Arc::new(AppState::new(service)))
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(app(Arc::new(MockLlmClient::new()), dir.path(), None), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_chat_returns_result() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_replies([
            "Physics_Expert",
            "Gia tốc a = F/m = 2 m/s². TERMINATE",
        ]));
        let (status, body) = call(
            app(mock, dir.path(), Some("sk-test")),
            post_chat(r#"{"message":"F = 10N, m = 5kg, a = ?"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.result, "Gia tốc a = F/m = 2 m/s².");
    }

    #[tokio::test]
    async fn test_chat_error_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = call(
            app(Arc::new(MockLlmClient::new()), dir.path(), Some("sk-test")),
            post_chat(r#"{"message":"   "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // 缺少 API Key 属于配置错误，原样返回信息
        let (status, body) = call(
            app(Arc::new(MockLlmClient::new()), dir.path(), None),
            post_chat(r#"{"message":"hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(String::from_utf8(body).unwrap().contains("No API key"));

        // 选择失败会回退到默认 Agent，再让 Agent 调用也失败
        let mock = Arc::new(MockLlmClient::failing(crate::core::LlmError::Api("boom".into())));
        mock.push_reply(Err(crate::core::LlmError::Api("boom".into())));
        let (status, body) = call(app(mock, dir.path(), Some("sk-test")), post_chat(r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(String::from_utf8(body).unwrap(), UNEXPECTED);
    }

    #[tokio::test]
    async fn test_agents_listed() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(Arc::new(MockLlmClient::new()), dir.path(), Some("sk-test")),
            get_req("/agents"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list: Vec<AgentInfo> = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.len(), 8);
        assert_eq!(list[0].name, "Info_Agent");
    }

    #[tokio::test]
    async fn test_subject_routes() {
        let dir = tempfile::tempdir().unwrap();
        SubjectCatalog::new(dir.path()).ensure_layout().unwrap();
        let mock = Arc::new(MockLlmClient::new());

        let (status, body) = call(app(mock.clone(), dir.path(), None), get_req("/subjects")).await;
        assert_eq!(status, StatusCode::OK);
        let subjects: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert!(subjects.contains(&"cs".to_string()));

        let (status, body) = call(app(mock.clone(), dir.path(), None), get_req("/subjects/physics/syllabus")).await;
        assert_eq!(status, StatusCode::OK);
        let s: Syllabus = serde_json::from_slice(&body).unwrap();
        assert_eq!(s.modules[0].name, "Mechanics");

        let (status, _) = call(app(mock.clone(), dir.path(), None), get_req("/subjects/alchemy/syllabus")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(
            app(mock.clone(), dir.path(), None),
            get_req("/subjects/math/materials?type=document"),
        )
        .await;
        let m: Vec<Material> = serde_json::from_slice(&body).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].id, "math_001");

        let (_, body) = call(
            app(mock.clone(), dir.path(), None),
            get_req("/subjects/math/quizzes?topic=algebra"),
        )
        .await;
        let q: Vec<Quiz> = serde_json::from_slice(&body).unwrap();
        assert_eq!(q[0].id, "quiz_math_001");

        let (_, body) = call(app(mock, dir.path(), None), get_req("/materials/search?q=motion")).await;
        let hits: Vec<Material> = serde_json::from_slice(&body).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject.as_deref(), Some("physics"));
    }
}
