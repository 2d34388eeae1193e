// src/handlers/material_payments.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::treasury::validate_amount,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::treasury::{AccountType, MaterialPaymentDetail, MaterialPaymentStatus, TreasuryMaterialPayment},
    services::material_payment_service::{NewMaterialPaymentItem, ProcessedMaterialPayment},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialPaymentItemPayload {
    pub material_request_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, message = "La descripción es obligatoria."))]
    pub description: String,

    pub partida: Option<String>,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "1500.00")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialPaymentPayload {
    pub supplier_id: Uuid,
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "El pago necesita al menos una partida."), nested)]
    pub items: Vec<MaterialPaymentItemPayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMaterialPaymentPayload {
    pub account_type: AccountType,
    pub account_id: Uuid,
    #[schema(value_type = String, format = Date, example = "2025-03-20")]
    pub payment_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialPaymentStatusQuery {
    pub status: Option<MaterialPaymentStatus>,
}

#[utoipa::path(
    post,
    path = "/api/treasury/material-payments",
    tag = "Material Payments",
    request_body = CreateMaterialPaymentPayload,
    responses(
        (status = 201, description = "Pagamento de materiais registrado", body = MaterialPaymentDetail),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_material_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Json(payload): Json<CreateMaterialPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let items = payload
        .items
        .into_iter()
        .map(|i| NewMaterialPaymentItem {
            material_request_id: i.material_request_id,
            client_id: i.client_id,
            project_id: i.project_id,
            description: i.description,
            partida: i.partida,
            amount: i.amount,
        })
        .collect();

    let detail = app_state
        .material_payment_service
        .create_payment(user.0.id, payload.supplier_id, payload.notes.as_deref(), items)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/api/treasury/material-payments",
    tag = "Material Payments",
    params(MaterialPaymentStatusQuery),
    responses(
        (status = 200, description = "Pagamentos de materiais", body = Vec<TreasuryMaterialPayment>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_material_payments(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Query(query): Query<MaterialPaymentStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = app_state
        .material_payment_service
        .list_payments(user.0.id, query.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(payments)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/material-payments/{id}/process",
    tag = "Material Payments",
    request_body = ProcessMaterialPaymentPayload,
    params(("id" = Uuid, Path, description = "ID do pagamento")),
    responses(
        (status = 200, description = "Uma transação concluída por item", body = ProcessedMaterialPayment),
        (status = 404, description = "Pagamento ou conta não encontrada"),
        (status = 409, description = "Já processado, conta inativa ou solicitação já exportada")
    ),
    security(("api_jwt" = []))
)]
pub async fn process_material_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessMaterialPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let processed = app_state
        .material_payment_service
        .process_payment(user.0.id, id, payload.account_type, payload.account_id, payload.payment_date)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(processed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(description: &str, amount: Decimal) -> MaterialPaymentItemPayload {
        MaterialPaymentItemPayload {
            material_request_id: None,
            client_id: None,
            project_id: None,
            description: description.into(),
            partida: None,
            amount,
        }
    }

    #[test]
    fn payment_needs_at_least_one_item() {
        let payload = CreateMaterialPaymentPayload { supplier_id: Uuid::new_v4(), notes: None, items: vec![] };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn invalid_items_fail_validation() {
        let payload = CreateMaterialPaymentPayload {
            supplier_id: Uuid::new_v4(),
            notes: None,
            items: vec![item("Varilla 3/8", dec!(1500.00)), item("", dec!(0))],
        };
        assert!(payload.validate().is_err());

        let ok = CreateMaterialPaymentPayload {
            supplier_id: Uuid::new_v4(),
            notes: None,
            items: vec![item("Varilla 3/8", dec!(1500.00))],
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn item_amounts_must_fit_in_cents_and_in_the_column() {
        for amount in [dec!(0.001), dec!(1000000000000), dec!(100000000000000000000)] {
            let payload = CreateMaterialPaymentPayload {
                supplier_id: Uuid::new_v4(),
                notes: None,
                items: vec![item("Cemento gris", amount)],
            };
            assert!(payload.validate().is_err(), "{} deveria ser recusado", amount);
        }
    }
}
