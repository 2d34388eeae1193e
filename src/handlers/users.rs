// src/handlers/users.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::{AuthenticatedUser, RequireAdmin},
        i18n::Locale,
    },
    models::auth::User,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveUserPayload {
    /// `false` revoga o acesso
    #[serde(default = "default_approved")]
    pub approved: bool,
}

fn default_approved() -> bool {
    true
}

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Usuário autenticado", body = User),
        (status = 401, description = "Não autorizado"),
        (status = 403, description = "Usuário não aprovado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "Todos os usuários, pendentes primeiro", body = Vec<User>),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let users = app_state
        .auth_service
        .list_users()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/approve",
    tag = "Users",
    request_body(content = ApproveUserPayload, description = "Padrão: aprovar"),
    params(("id" = Uuid, Path, description = "ID do usuário")),
    responses(
        (status = 200, description = "Aprovação atualizada", body = User),
        (status = 403, description = "Apenas administradores"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_user(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<Uuid>,
    payload: Option<Json<ApproveUserPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let approved = payload.map(|Json(p)| p.approved).unwrap_or(true);

    let user = app_state
        .auth_service
        .set_approval(user_id, approved)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    tracing::info!("Admin {} alterou a aprovação de {}", admin.email, user.email);
    Ok((StatusCode::OK, Json(user)))
}
