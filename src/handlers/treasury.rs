// src/handlers/treasury.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{
        error::{ApiError, AppError},
        money,
    },
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::treasury::{
        AccountType, FundingAccount, MaterialFinanceRequest, MaterialRequestStatus, PaymentReference,
        PaymentReferenceDetail, PaymentReferenceListItem, PaymentReferenceStatus, ResolvedMaterialRequest,
        TransactionStatus, TreasuryTransaction,
    },
    services::{
        payment_grouping::PaymentInstruction,
        treasury_service::{ExportResult, NewMaterialRequest, ProcessedReference},
    },
};

// ---
// Validações de valores
// ---
fn range_error(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new("range");
    err.add_param("min".into(), &0.0);
    err.message = Some(message.into());
    err
}

pub(crate) fn validate_quantity(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        return Err(range_error("El valor debe ser mayor que cero."));
    }
    if !money::fits_quantity(*val) {
        return Err(range_error("La cantidad es demasiado grande."));
    }
    Ok(())
}

pub(crate) fn validate_unit_cost(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        return Err(range_error("El valor no puede ser negativo."));
    }
    if !money::fits_amount(*val) {
        return Err(range_error("El importe es demasiado grande."));
    }
    Ok(())
}

/// Importe em pesos: precisa sobrar algo depois de arredondar para centavos.
pub(crate) fn validate_amount(val: &Decimal) -> Result<(), ValidationError> {
    if money::round_cents(*val) <= Decimal::ZERO {
        return Err(range_error("El valor debe ser mayor que cero."));
    }
    if !money::fits_amount(*val) {
        return Err(range_error("El importe es demasiado grande."));
    }
    Ok(())
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialRequestPayload {
    pub material_requirement_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,

    #[validate(custom(function = "validate_quantity"))]
    #[schema(example = "10")]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_unit_cost"))]
    #[schema(example = "150.05")]
    pub unit_cost: Decimal,

    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestStatusPayload {
    pub status: MaterialRequestStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportToTreasuryPayload {
    #[validate(length(min = 1, message = "Selecciona al menos una solicitud."))]
    pub material_request_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReferencePayload {
    pub account_type: AccountType,
    pub account_id: Uuid,
    #[schema(value_type = String, format = Date, example = "2025-03-20")]
    pub payment_date: NaiveDate,
    #[validate(length(max = 500, message = "La nota es demasiado larga."))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelReferencePayload {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestStatusQuery {
    pub status: Option<MaterialRequestStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReferenceStatusQuery {
    pub status: Option<PaymentReferenceStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionStatusQuery {
    pub status: Option<TransactionStatus>,
}

// =========================================================================
//  SOLICITAÇÕES DE MATERIAL
// =========================================================================

#[utoipa::path(
    get,
    path = "/api/treasury/material-requests",
    tag = "Material Requests",
    params(RequestStatusQuery),
    responses(
        (status = 200, description = "Solicitações com fornecedor, cliente, obra e material resolvidos", body = Vec<ResolvedMaterialRequest>),
        (status = 401, description = "Não autorizado")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_material_requests(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Query(query): Query<RequestStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .treasury_service
        .list_requests(user.0.id, query.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/material-requests",
    tag = "Material Requests",
    request_body = CreateMaterialRequestPayload,
    responses(
        (status = 201, description = "Solicitação criada como pendente", body = MaterialFinanceRequest),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_material_request(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Json(payload): Json<CreateMaterialRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let input = NewMaterialRequest {
        material_requirement_id: payload.material_requirement_id,
        supplier_id: payload.supplier_id,
        client_id: payload.client_id,
        project_id: payload.project_id,
        quantity: payload.quantity,
        unit_cost: payload.unit_cost,
        notes: payload.notes,
    };

    let request = app_state
        .treasury_service
        .create_request(user.0.id, input)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/material-requests/{id}/status",
    tag = "Material Requests",
    request_body = UpdateRequestStatusPayload,
    params(("id" = Uuid, Path, description = "ID da solicitação")),
    responses(
        (status = 200, description = "Status alterado", body = MaterialFinanceRequest),
        (status = 404, description = "Solicitação não encontrada"),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_material_request_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequestStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let request = app_state
        .treasury_service
        .change_request_status(user.0.id, id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(request)))
}

// =========================================================================
//  EXPORTAÇÃO
// =========================================================================

#[utoipa::path(
    post,
    path = "/api/treasury/export",
    tag = "Treasury",
    request_body = ExportToTreasuryPayload,
    responses(
        (status = 201, description = "Uma referência de pagamento por fornecedor", body = ExportResult),
        (status = 400, description = "Seleção vazia"),
        (status = 422, description = "Nada exportável na seleção")
    ),
    security(("api_jwt" = []))
)]
pub async fn export_to_treasury(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Json(payload): Json<ExportToTreasuryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let result = app_state
        .treasury_service
        .export_to_treasury(user.0.id, &payload.material_request_ids)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(result)))
}

// =========================================================================
//  REFERÊNCIAS DE PAGAMENTO
// =========================================================================

#[utoipa::path(
    get,
    path = "/api/treasury/payment-references",
    tag = "Treasury",
    params(ReferenceStatusQuery),
    responses(
        (status = 200, description = "Referências, mais recentes primeiro", body = Vec<PaymentReferenceListItem>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_payment_references(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Query(query): Query<ReferenceStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state
        .treasury_service
        .list_references(user.0.id, query.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(items)))
}

#[utoipa::path(
    get,
    path = "/api/treasury/payment-references/{id}",
    tag = "Treasury",
    params(("id" = Uuid, Path, description = "ID da referência")),
    responses(
        (status = 200, description = "Referência com suas transações", body = PaymentReferenceDetail),
        (status = 404, description = "Referência não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_payment_reference(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .treasury_service
        .get_reference_detail(user.0.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(detail)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/payment-references/{id}/process",
    tag = "Treasury",
    request_body = ProcessReferencePayload,
    params(("id" = Uuid, Path, description = "ID da referência")),
    responses(
        (status = 200, description = "Referência paga e conciliada", body = ProcessedReference),
        (status = 404, description = "Referência ou conta não encontrada"),
        (status = 409, description = "Referência não está pendente ou conta inativa")
    ),
    security(("api_jwt" = []))
)]
pub async fn process_payment_reference(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessReferencePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let instruction = PaymentInstruction {
        account_type: payload.account_type,
        account_id: payload.account_id,
        payment_date: payload.payment_date,
        note: payload.note,
    };

    let processed = app_state
        .treasury_service
        .process_reference(user.0.id, id, instruction)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(processed)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/payment-references/{id}/cancel",
    tag = "Treasury",
    request_body(content = CancelReferencePayload, description = "Motivo opcional"),
    params(("id" = Uuid, Path, description = "ID da referência")),
    responses(
        (status = 200, description = "Referência cancelada; solicitações liberadas", body = PaymentReference),
        (status = 409, description = "Referência não está pendente")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_payment_reference(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelReferencePayload>>,
) -> Result<impl IntoResponse, ApiError> {
    // Corpo opcional: sem motivo, cancela sem nota
    let reason = payload.and_then(|Json(p)| p.reason);

    let cancelled = app_state
        .treasury_service
        .cancel_reference(user.0.id, id, reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(cancelled)))
}

// =========================================================================
//  TRANSAÇÕES E CONTAS
// =========================================================================

#[utoipa::path(
    get,
    path = "/api/treasury/transactions",
    tag = "Treasury",
    params(TransactionStatusQuery),
    responses(
        (status = 200, description = "Transações de tesouraria", body = Vec<TreasuryTransaction>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Query(query): Query<TransactionStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .treasury_service
        .list_transactions(user.0.id, query.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/api/treasury/accounts",
    tag = "Treasury",
    responses(
        (status = 200, description = "Contas bancárias e caixas ativos", body = Vec<FundingAccount>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_funding_accounts(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = app_state
        .treasury_service
        .list_funding_accounts(user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(accounts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload(quantity: Decimal, unit_cost: Decimal) -> CreateMaterialRequestPayload {
        CreateMaterialRequestPayload {
            material_requirement_id: None,
            supplier_id: Some(Uuid::new_v4()),
            client_id: None,
            project_id: None,
            quantity,
            unit_cost,
            notes: None,
        }
    }

    #[test]
    fn quantity_must_be_positive() {
        let errors = payload(Decimal::ZERO, dec!(10)).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
        assert!(payload(dec!(0.5), Decimal::ZERO).validate().is_ok());
    }

    #[test]
    fn unit_cost_cannot_be_negative() {
        let errors = payload(dec!(1), dec!(-0.01)).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("unit_cost"));
    }

    #[test]
    fn oversized_values_are_rejected_before_the_service() {
        let errors = payload(dec!(100000000000000000000), dec!(100000000000000000000))
            .validate()
            .unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("quantity"));
        assert!(fields.contains_key("unit_cost"));

        assert!(payload(dec!(99999999999.999), dec!(999999999999.99)).validate().is_ok());
        assert!(payload(dec!(1), dec!(1000000000000)).validate().is_err());
    }

    #[test]
    fn amount_must_survive_rounding_to_cents() {
        assert!(validate_amount(&dec!(0.001)).is_err());
        assert!(validate_amount(&dec!(0.005)).is_ok());
        assert!(validate_amount(&dec!(1000000000000)).is_err());
    }

    #[test]
    fn export_requires_a_selection() {
        let empty = ExportToTreasuryPayload { material_request_ids: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn status_payload_reads_snake_case() {
        let parsed: UpdateRequestStatusPayload = serde_json::from_str(r#"{"status":"not_attended"}"#).unwrap();
        assert_eq!(parsed.status, MaterialRequestStatus::NotAttended);
    }
}
