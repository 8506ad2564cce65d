use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use pricewatch_core::errors::PricewatchError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("核心错误: {0}")]
    Core(#[from] PricewatchError),

    #[error("未找到资源")]
    NotFound,

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::Core(PricewatchError::ScraperNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "SCRAPER_NOT_FOUND",
                format!("抓取器 {id} 不存在"),
            ),
            ApiError::Core(PricewatchError::QueueBusy(msg)) => {
                (StatusCode::CONFLICT, "QUEUE_BUSY", msg.clone())
            }
            ApiError::Core(PricewatchError::Configuration(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION", msg.clone())
            }
            ApiError::Core(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "未找到资源".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = Json(json!({
            "success": false,
            "error_type": error_type,
            "message": message,
            "timestamp": chrono::Utc::now(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
