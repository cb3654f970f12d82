use actix_web::{get, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{AuthMiddleware, AuthenticatedUser},
    db::validate_document_id,
    errors::AppError,
    models::dto::response::{DashboardResponse, UserOverviewResponse},
};

#[get("/dashboard", wrap = "AuthMiddleware")]
pub async fn dashboard(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let user = state.user_service.get_profile(auth.user_id()).await?;
    let quizzes = state.quiz_service.list_for_owner(auth.user_id()).await?;

    Ok(HttpResponse::Ok().json(DashboardResponse {
        message: "Welcome to the dashboard".to_string(),
        user,
        quizzes,
    }))
}

/// Any signed-in user may look up a profile; private quizzes are only listed
/// for their owner.
#[get("/user/{user_id}", wrap = "AuthMiddleware")]
pub async fn get_user(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let user_id = user_id.into_inner();
    validate_document_id(&user_id)?;

    let user = state.user_service.get_profile(&user_id).await?;
    let quizzes = if auth.user_id() == user_id {
        state.quiz_service.list_for_owner(&user_id).await?
    } else {
        state.quiz_service.list_public_for_owner(&user_id).await?
    };

    Ok(HttpResponse::Ok().json(UserOverviewResponse { user, quizzes }))
}

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/health/ready")]
pub async fn health_check_ready(state: web::Data<AppState>) -> HttpResponse {
    let store_health = state.store.health_check().await;
    if let Err(err) = &store_health {
        log::warn!("Readiness check failed: {}", err);
    }

    let response = serde_json::json!({
        "status": if store_health.is_ok() { "ready" } else { "not_ready" },
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "documentStore": if store_health.is_ok() { "ok" } else { "error" }
        }
    });

    if store_health.is_ok() {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_check() {
        let app = test::init_service(App::new().service(health_check)).await;

        let req = test::TestRequest::get().uri("/health").to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
