// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    // Importamos os models para referenciar no Swagger
    models::dashboard::{MonthlyExpenseEntry, PartidaExpenseEntry, SupplierPayableEntry, TreasurySummary},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct YearQuery {
    /// Ano (ex.: 2025). Sem filtro, todos os meses.
    pub year: Option<i32>,
}

// GET /api/dashboard/treasury-summary
#[utoipa::path(
    get,
    path = "/api/dashboard/treasury-summary",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Cards da tesouraria: referências, transações e saldos", body = TreasurySummary),
        (status = 401, description = "Não autorizado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_treasury_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .dashboard_service
        .treasury_summary(user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/dashboard/expenses-by-month
#[utoipa::path(
    get,
    path = "/api/dashboard/expenses-by-month",
    tag = "Dashboard",
    params(YearQuery),
    responses(
        (status = 200, description = "Gastos pagos por mês (YYYY-MM)", body = Vec<MonthlyExpenseEntry>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_expenses_by_month(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chart = app_state
        .dashboard_service
        .expenses_by_month(user.0.id, query.year)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(chart)))
}

// GET /api/dashboard/expenses-by-partida
#[utoipa::path(
    get,
    path = "/api/dashboard/expenses-by-partida",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Gastos pagos por partida, com percentual", body = Vec<PartidaExpenseEntry>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_expenses_by_partida(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .dashboard_service
        .expenses_by_partida(user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(entries)))
}

// GET /api/dashboard/payables-by-supplier
#[utoipa::path(
    get,
    path = "/api/dashboard/payables-by-supplier",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Referências pendentes por fornecedor", body = Vec<SupplierPayableEntry>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_payables_by_supplier(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let payables = app_state
        .dashboard_service
        .payables_by_supplier(user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(payables)))
}
