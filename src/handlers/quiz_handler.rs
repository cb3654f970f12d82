use actix_web::{delete, get, post, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{AuthMiddleware, AuthenticatedUser},
    errors::AppError,
    models::dto::{
        request::{CreateQuizRequest, ToggleQuizRequest},
        response::{CreateQuizResponse, MessageResponse, PublicQuizResponse, TogglePublicResponse},
    },
};
use validator::Validate;

#[post("/create-quiz", wrap = "AuthMiddleware")]
pub async fn create_quiz(
    state: web::Data<AppState>,
    request: web::Json<CreateQuizRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let quiz_id = state
        .quiz_service
        .create(auth.user_id(), request.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(CreateQuizResponse {
        message: "Quiz created successfully".to_string(),
        quiz_id,
    }))
}

#[post("/toggle-quiz-public", wrap = "AuthMiddleware")]
pub async fn toggle_quiz_public(
    state: web::Data<AppState>,
    request: web::Json<ToggleQuizRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    request.validate()?;

    let is_public = state
        .quiz_service
        .toggle_public(auth.user_id(), &request.quiz_id)
        .await?;

    Ok(HttpResponse::Ok().json(TogglePublicResponse {
        message: "Quiz visibility updated".to_string(),
        is_public,
    }))
}

#[get("/public-quiz/{quiz_id}")]
pub async fn get_public_quiz(
    state: web::Data<AppState>,
    quiz_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let quiz = state.quiz_service.get_public(&quiz_id).await?;
    Ok(HttpResponse::Ok().json(PublicQuizResponse { quiz }))
}

#[delete("/api/quizzes/{quiz_id}", wrap = "AuthMiddleware")]
pub async fn delete_quiz(
    state: web::Data<AppState>,
    quiz_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.quiz_service.delete(auth.user_id(), &quiz_id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Quiz deleted successfully")))
}
