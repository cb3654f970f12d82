use actix_web::{post, web, HttpResponse};

use crate::{
    app_state::AppState,
    errors::AppError,
    models::dto::{
        request::{LoginRequest, RegisterRequest},
        response::MessageResponse,
    },
};

#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    state.user_service.register(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(MessageResponse::new("User registered successfully")))
}

#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.user_service.login(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}
