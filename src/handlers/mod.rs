pub mod health;
pub mod kelly;
pub mod stats;

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use forecast_kelly::error::AppError;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::ValidationError(err.to_string()).into()
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/health", web::get().to(health::health_check))
        .route("/kelly/fraction", web::post().to(kelly::kelly_fraction))
        .route("/kelly/recommend", web::post().to(kelly::recommend_bets))
        .route("/kelly/portfolio", web::post().to(kelly::portfolio_allocation))
        .route("/stats/sharpe", web::post().to(stats::sharpe_ratio))
        .route("/stats/drawdown", web::post().to(stats::max_drawdown));
}
