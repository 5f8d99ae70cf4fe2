use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::AppState;
use forecast_kelly::models::HealthResponse;

/// Health check endpoint
pub async fn health_check(state: web::Data<Arc<AppState>>) -> impl Responder {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_kelly_fraction: state.calculator.max_kelly_fraction,
        min_edge: state.calculator.min_edge,
    };

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use forecast_kelly::KellyCriterionCalculator;

    #[actix_web::test]
    async fn test_health_reports_calculator() {
        let state = Arc::new(AppState {
            calculator: KellyCriterionCalculator::new(0.1, 0.02),
        });
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.status, "ok");
        assert_eq!(body.max_kelly_fraction, 0.1);
        assert_eq!(body.min_edge, 0.02);
    }
}
