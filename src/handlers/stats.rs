use actix_web::{web, HttpResponse};

use forecast_kelly::error::AppError;
use forecast_kelly::models::{DrawdownRequest, DrawdownResponse, SharpeRequest, SharpeResponse};
use forecast_kelly::{calculate_maximum_drawdown, calculate_sharpe_ratio};

/// Sharpe ratio of a return series
pub async fn sharpe_ratio(req: web::Json<SharpeRequest>) -> Result<HttpResponse, AppError> {
    let sharpe_ratio = calculate_sharpe_ratio(&req.returns, req.risk_free_rate);
    Ok(HttpResponse::Ok().json(SharpeResponse { sharpe_ratio }))
}

/// Maximum drawdown of a value series
pub async fn max_drawdown(req: web::Json<DrawdownRequest>) -> Result<HttpResponse, AppError> {
    let max_drawdown = calculate_maximum_drawdown(&req.portfolio_values);
    Ok(HttpResponse::Ok().json(DrawdownResponse { max_drawdown }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::configure;
    use actix_web::{test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_sharpe_endpoint() {
        let app = test::init_service(App::new().configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/stats/sharpe")
            .set_json(json!({"returns": [0.1]}))
            .to_request();
        let body: SharpeResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.sharpe_ratio, 0.0);

        let req = test::TestRequest::post()
            .uri("/stats/sharpe")
            .set_json(json!({"returns": [7.0, -1.0, 9.0], "risk_free_rate": 1.0}))
            .to_request();
        let body: SharpeResponse = test::call_and_read_body_json(&app, req).await;
        assert!((body.sharpe_ratio - 4.0 / 28.0_f64.sqrt()).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_drawdown_endpoint() {
        let app = test::init_service(App::new().configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/stats/drawdown")
            .set_json(json!({"portfolio_values": [100.0, 50.0, 80.0]}))
            .to_request();
        let body: DrawdownResponse = test::call_and_read_body_json(&app, req).await;
        assert!((body.max_drawdown - 0.5).abs() < 1e-12);
    }
}
