use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::warn;

use crate::AppState;
use forecast_kelly::error::{
    validate_balance, validate_limits, validate_outcome, validate_probability, AppError,
};
use forecast_kelly::models::{
    KellyFractionRequest, KellyFractionResponse, MarketWithPrediction, PortfolioRequest,
    RecommendRequest,
};

fn validate_markets(markets: &[MarketWithPrediction]) -> Result<(), AppError> {
    for entry in markets {
        validate_probability("market.probability", entry.market.probability)?;
        validate_probability("prediction.probability", entry.prediction.probability)?;
    }
    Ok(())
}

/// Kelly fraction for a single side
pub async fn kelly_fraction(
    state: web::Data<Arc<AppState>>,
    req: web::Json<KellyFractionRequest>,
) -> Result<HttpResponse, AppError> {
    validate_probability("model_probability", req.model_probability)?;
    validate_probability("market_probability", req.market_probability)?;
    let outcome = validate_outcome(&req.outcome)?;

    let calculator = &state.calculator;
    let kelly_fraction =
        calculator.calculate_kelly_fraction(req.model_probability, req.market_probability, outcome);
    let expected_value_per_unit =
        calculator.calculate_expected_value(req.model_probability, req.market_probability, 1.0, outcome);
    let (p_win, market_p) = outcome.side_probabilities(req.model_probability, req.market_probability);

    Ok(HttpResponse::Ok().json(KellyFractionResponse {
        outcome,
        kelly_fraction,
        edge: p_win - market_p,
        expected_value_per_unit,
    }))
}

/// Ranked bet recommendations
pub async fn recommend_bets(
    state: web::Data<Arc<AppState>>,
    req: web::Json<RecommendRequest>,
) -> Result<HttpResponse, AppError> {
    validate_balance(req.current_balance)?;
    validate_limits(&req.limits)?;
    validate_markets(&req.markets)?;

    let bets = state
        .calculator
        .recommend_bets(&req.markets, req.current_balance, &req.limits);

    Ok(HttpResponse::Ok().json(bets))
}

/// Portfolio allocation under the exposure cap
pub async fn portfolio_allocation(
    state: web::Data<Arc<AppState>>,
    req: web::Json<PortfolioRequest>,
) -> Result<HttpResponse, AppError> {
    validate_balance(req.current_balance)?;
    validate_markets(&req.new_opportunities)?;

    let allocation = state.calculator.calculate_portfolio_kelly(
        &req.current_positions,
        &req.new_opportunities,
        req.current_balance,
    );

    if let Some(ref error) = allocation.risk_metrics.error {
        warn!("Portfolio allocation failed: {}", error);
        return Err(AppError::ValidationError(error.clone()));
    }

    Ok(HttpResponse::Ok().json(allocation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::configure;
    use actix_web::{http::StatusCode, test, App};
    use forecast_kelly::models::{ErrorResponse, PortfolioResponse};
    use forecast_kelly::{KellyBet, KellyCriterionCalculator, Outcome, RiskLevel};
    use serde_json::json;

    fn state() -> web::Data<Arc<AppState>> {
        web::Data::new(Arc::new(AppState {
            calculator: KellyCriterionCalculator::default(),
        }))
    }

    #[actix_web::test]
    async fn test_kelly_fraction() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/fraction")
            .set_json(json!({"model_probability": 0.7, "market_probability": 0.5}))
            .to_request();
        let body: KellyFractionResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.outcome, Outcome::Yes);
        assert!((body.kelly_fraction - 0.25).abs() < 1e-9);
        assert!((body.edge - 0.2).abs() < 1e-9);
        assert!((body.expected_value_per_unit - 0.4).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_kelly_fraction_no_side() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/fraction")
            .set_json(json!({"model_probability": 0.3, "market_probability": 0.5, "outcome": "no"}))
            .to_request();
        let body: KellyFractionResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.outcome, Outcome::No);
        assert!((body.kelly_fraction - 0.25).abs() < 1e-9);
        assert!((body.edge - 0.2).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_kelly_fraction_rejects_bad_input() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/fraction")
            .set_json(json!({"model_probability": 1.2, "market_probability": 0.5}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "validation_error");

        let req = test::TestRequest::post()
            .uri("/kelly/fraction")
            .set_json(json!({"model_probability": 0.6, "market_probability": 0.5, "outcome": "MAYBE"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_malformed_json_is_validation_error() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/fraction")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"model_probability\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "validation_error");
    }

    #[actix_web::test]
    async fn test_recommend_bets() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/recommend")
            .set_json(json!({
                "markets": [
                    {"market": {"id": "m1", "question": "Q1", "probability": 0.4},
                     "prediction": {"probability": 0.6, "confidence": 0.8, "reasoning": "r"}},
                    {"market": {"id": "m2", "probability": 0.5},
                     "prediction": {"probability": 0.51}}
                ],
                "current_balance": 1000.0
            }))
            .to_request();
        let bets: Vec<KellyBet> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].market_id, "m1");
        assert_eq!(bets[0].outcome, Outcome::Yes);
        // 0.25 * 1000 clamped to the default max of 100
        assert!((bets[0].bet_amount - 100.0).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_recommend_rejects_negative_balance() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/recommend")
            .set_json(json!({"markets": [], "current_balance": -5.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_recommend_rejects_bad_market_probability() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/recommend")
            .set_json(json!({
                "markets": [{"market": {"id": "m1", "probability": 1.5}}],
                "current_balance": 100.0
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_portfolio_allocation() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/kelly/portfolio")
            .set_json(json!({
                "current_positions": [{"payout": 50.0}],
                "new_opportunities": [
                    {"market": {"id": "m1", "probability": 0.4},
                     "prediction": {"probability": 0.6}}
                ],
                "current_balance": 1000.0
            }))
            .to_request();
        let body: PortfolioResponse = test::call_and_read_body_json(&app, req).await;

        assert!((body.total_value - 1050.0).abs() < 1e-9);
        assert_eq!(body.recommended_bets.len(), 1);
        assert!((body.risk_metrics.portfolio_concentration - 0.1).abs() < 1e-9);
        assert_eq!(body.risk_metrics.risk_level, RiskLevel::Low);
        assert!(body.risk_metrics.error.is_none());
    }

    #[actix_web::test]
    async fn test_portfolio_zero_balance_with_bets() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        // Minimum stake still yields a bet, so concentration is undefined
        let req = test::TestRequest::post()
            .uri("/kelly/portfolio")
            .set_json(json!({
                "new_opportunities": [
                    {"market": {"id": "m1", "probability": 0.4},
                     "prediction": {"probability": 0.6}}
                ],
                "current_balance": 0.0
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
