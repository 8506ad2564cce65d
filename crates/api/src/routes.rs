use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{queue, scrapers};
use crate::response::ApiResponse;
use crate::AppState;

/// 构建API路由
pub fn create_routes(state: AppState, cors_enabled: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        // 队列控制与观察
        .route("/api/queue", get(queue::get_queue_state))
        .route("/api/queue/pause", post(queue::pause_queue))
        .route("/api/queue/resume", post(queue::resume_queue))
        .route("/api/queue/clear", post(queue::clear_queue))
        .route("/api/queue/interval", post(queue::update_interval))
        // 抓取触发与运行历史
        .route("/api/scrapers/issues", get(scrapers::get_issues))
        .route("/api/scrapers/{id}/trigger", post(scrapers::trigger_scraper))
        .route("/api/scrapers/{id}/runs", get(scrapers::get_scraper_runs))
        .route("/api/scrapers/{id}/dismiss-issue", post(scrapers::dismiss_issue))
        .route("/api/products/{id}/trigger", post(scrapers::trigger_product))
        .route("/api/runs/{id}", get(scrapers::get_run))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

/// GET /health - 存活检查
async fn health_check() -> ApiResponse<&'static str> {
    ApiResponse::success("ok")
}
