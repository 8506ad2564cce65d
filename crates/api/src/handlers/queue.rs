use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use pricewatch_core::config::setting_keys;
use pricewatch_core::traits::SettingsRepository;
use pricewatch_dispatcher::QueueStateSnapshot;

use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::AppState;

/// GET /api/queue - 队列实时状态
pub async fn get_queue_state(State(state): State<AppState>) -> ApiResult<ApiResponse<QueueStateSnapshot>> {
    Ok(ApiResponse::success(state.queue.get_state()))
}

/// POST /api/queue/pause
pub async fn pause_queue(State(state): State<AppState>) -> ApiResult<ApiResponse<()>> {
    state.queue.pause();
    Ok(ApiResponse::success_empty_with_message("队列已暂停".to_string()))
}

/// POST /api/queue/resume
pub async fn resume_queue(State(state): State<AppState>) -> ApiResult<ApiResponse<()>> {
    state.queue.resume();
    Ok(ApiResponse::success_empty_with_message("队列已恢复".to_string()))
}

/// POST /api/queue/clear - 丢弃等待中的任务
pub async fn clear_queue(State(state): State<AppState>) -> ApiResult<ApiResponse<()>> {
    state.queue.clear();
    Ok(ApiResponse::success_empty_with_message(
        "已清空等待任务".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIntervalRequest {
    pub interval_ms: u64,
}

/// POST /api/queue/interval - 调整节流间隔（仅空闲时允许）
pub async fn update_interval(
    State(state): State<AppState>,
    Json(request): Json<UpdateIntervalRequest>,
) -> ApiResult<ApiResponse<()>> {
    // 队列先校验空闲；通过后把新值持久化到设置
    state.queue.set_interval(request.interval_ms)?;
    state
        .settings
        .set(setting_keys::QUEUE_INTERVAL_MS, &request.interval_ms.to_string())
        .await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "队列间隔已调整为 {}ms",
        request.interval_ms
    )))
}
