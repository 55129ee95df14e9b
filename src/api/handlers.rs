use crate::config::AppConfig;
use crate::models::{LineItem, MatchResult, MatchStats};
use crate::service::{build_matcher, MatcherService};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatcherService>,
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

/// 请求体: 一张发票的供应商与明细
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub supplier_key: String,
    pub items: Vec<LineItem>,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub success: bool,
    pub message: String,
    pub matched_at: DateTime<Utc>,
    pub stats: Option<MatchStats>,
    pub results: Vec<MatchResult>,
}

#[derive(Debug, Serialize)]
pub struct SimpleResponse {
    pub success: bool,
    pub message: String,
}

fn failure(message: String) -> Response {
    let response = SimpleResponse {
        success: false,
        message,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 批量匹配接口 (匹配在阻塞线程池上执行)
pub async fn match_items(State(state): State<AppState>, Json(req): Json<MatchRequest>) -> Response {
    let service = Arc::clone(&state.service);
    let MatchRequest { supplier_key, items } = req;

    let batch = tokio::task::spawn_blocking(move || service.match_batch(&supplier_key, &items)).await;

    match batch {
        Ok(batch) => {
            let response = MatchResponse {
                success: true,
                message: format!(
                    "Matched {}/{} items for supplier {}",
                    batch.stats.matched, batch.stats.total, batch.supplier_key
                ),
                matched_at: Utc::now(),
                stats: Some(batch.stats),
                results: batch.results,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("匹配任务失败: {}", e);
            failure(format!("Error: {}", e))
        }
    }
}

/// 清空供应商历史缓存
pub async fn invalidate_cache(State(state): State<AppState>) -> Response {
    state.service.invalidate_history();
    let response = SimpleResponse {
        success: true,
        message: "Supplier history cache cleared".to_string(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// 重新加载目录并替换快照
pub async fn reload_catalog(State(state): State<AppState>) -> Response {
    match build_matcher(&state.pool, &state.config).await {
        Ok(matcher) => {
            let products = matcher.index().len();
            state.service.replace_matcher(matcher);
            let response = SimpleResponse {
                success: true,
                message: format!("Catalog reloaded: {} products", products),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("目录重新加载失败: {}", e);
            failure(format!("Error: {}", e))
        }
    }
}
