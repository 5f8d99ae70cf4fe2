use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod handlers;

use forecast_kelly::config::ServerConfig;
use forecast_kelly::KellyCriterionCalculator;

/// Application state shared across handlers
pub struct AppState {
    pub calculator: KellyCriterionCalculator,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };
    let addr = config.addr();

    let app_state = Arc::new(AppState {
        calculator: config.calculator(),
    });

    info!(
        "Kelly calculator: max fraction {}, min edge {}",
        config.max_kelly_fraction, config.min_edge
    );
    info!("Starting Forecast Kelly API server at http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&addr)?
    .run()
    .await
}
