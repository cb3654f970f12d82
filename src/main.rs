use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use quizhub_server::{app_state::AppState, config::Config, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.is_production() {
        if let Err(e) = config.validate_for_production() {
            log::error!("Refusing to start in production: {}", e);
            std::process::exit(1);
        }
    }

    let host = config.web_server_host.clone();
    let port = config.web_server_port;
    let base_path = config.api_base_path.clone();

    let state = match AppState::new(config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Starting HTTP server on {}:{} (base path '{}')",
        host,
        port,
        base_path
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .configure(handlers::configure(state.clone()))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
