use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Deserialize;

use pricewatch_core::errors::PricewatchError;
use pricewatch_core::models::{JobSource, ProductScraper, QueueJob, ScraperRun};
use pricewatch_core::traits::{ProductScraperRepository, ScraperRunRepository};

use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::AppState;

/// POST /api/scrapers/{id}/trigger - 手动触发一次抓取
///
/// 手动触发绕过队列去重并强制刷新；结果通过队列状态与
/// 运行记录查询可见。
pub async fn trigger_scraper(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ApiResponse<QueueJob>> {
    let scraper = state
        .scrapers
        .get_by_id(id)
        .await?
        .ok_or(PricewatchError::ScraperNotFound { id })?;

    let job = state
        .queue
        .enqueue_scraper(&scraper, JobSource::Manual)
        .ok_or_else(|| ApiError::BadRequest("手动任务入队失败".to_string()))?;
    Ok(ApiResponse::success(job))
}

/// POST /api/products/{id}/trigger - 批量触发商品下全部抓取器
pub async fn trigger_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<ApiResponse<Vec<QueueJob>>> {
    let scrapers = state.scrapers.get_by_product_id(product_id).await?;
    if scrapers.is_empty() {
        return Err(ApiError::NotFound);
    }
    let enabled: Vec<ProductScraper> = scrapers.into_iter().filter(|s| s.enabled).collect();
    let jobs = state.queue.enqueue_batch(&enabled, JobSource::Group);
    Ok(ApiResponse::success(jobs))
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
}

/// GET /api/scrapers/{id}/runs - 运行历史（新的在前）
pub async fn get_scraper_runs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<ApiResponse<Vec<ScraperRun>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let runs = state.runs.get_recent_runs(id, limit).await?;
    Ok(ApiResponse::success(runs))
}

/// GET /api/runs/{id} - 单次运行详情（含执行日志）
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ApiResponse<ScraperRun>> {
    let run = state.runs.get_by_id(id).await?.ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(run))
}

/// GET /api/scrapers/issues - 问题视图
pub async fn get_issues(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<ProductScraper>>> {
    let issues = state.scrapers.get_scrapers_with_issues().await?;
    Ok(ApiResponse::success(issues))
}

/// POST /api/scrapers/{id}/dismiss-issue - 忽略当前问题
pub async fn dismiss_issue(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    state.scrapers.dismiss_issue(id, Utc::now()).await?;
    Ok(ApiResponse::success_empty_with_message(
        "问题已忽略".to_string(),
    ))
}
