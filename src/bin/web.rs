//! Tutor Hive HTTP 服务
//!
//! 环境变量:
//! - FCI_API_KEY 或 OPENAI_API_KEY: LLM API Key
//! - LLM_BASE_URL / LLM_BASE_MODEL: 模型端点与默认模型
//! - MAX_ROUNDS: 请求未指定轮数时的默认值
//! - MAX_CHAT_ROUNDS: 每次群聊的最少轮数
//! - DATA_PATH: 学科数据目录
//! - TUTOR_WEB_PORT: 监听端口（默认取配置 web.port，即 8000）
//!
//! 启动: cargo run --bin tutor-hive-web --features web

use std::sync::Arc;

use anyhow::Context;
use tutor_hive::config::load_config;
use tutor_hive::observability;
use tutor_hive::service::ChatService;
use tutor_hive::web::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let port = std::env::var("TUTOR_WEB_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = format!("{}:{}", cfg.web.host, port);

    let service = ChatService::new(cfg);
    tracing::info!("{}", service.models().debug_summary());

    let state = Arc::new(AppState::new(service));
    if let Err(e) = state.catalog.ensure_layout() {
        tracing::warn!(error = %e, "could not prepare data directory");
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Tutor Hive web listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
