pub mod auth_handler;
pub mod quiz_handler;
pub mod user_handler;

use actix_web::{web, Scope};

use crate::{app_state::AppState, errors::AppError};

pub use auth_handler::{login, register};
pub use quiz_handler::{create_quiz, delete_quiz, get_public_quiz, toggle_quiz_public};
pub use user_handler::{dashboard, get_user, health_check, health_check_ready};

/// Malformed JSON bodies are reported like any other validation failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

/// All API routes, mounted under `base_path` (may be empty).
pub fn api_scope(base_path: &str) -> Scope {
    web::scope(base_path)
        .service(register)
        .service(login)
        .service(dashboard)
        .service(get_user)
        .service(create_quiz)
        .service(toggle_quiz_public)
        .service(get_public_quiz)
        .service(delete_quiz)
}

/// Registers shared state, health probes and the API scope. Health probes
/// go first because an empty base path makes the scope match every path.
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let base_path = state.config.api_base_path.clone();
        cfg.app_data(state)
            .app_data(json_config())
            .service(health_check)
            .service(health_check_ready)
            .service(api_scope(&base_path));
    }
}
