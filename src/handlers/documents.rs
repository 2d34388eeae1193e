// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
};

#[utoipa::path(
    get,
    path = "/api/documents/payment-references/{id}/voucher",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "ID da referência")),
    responses(
        (status = 200, description = "Comprovante em PDF", body = Vec<u8>, content_type = "application/pdf"),
        (status = 404, description = "Referência não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn payment_reference_voucher(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(reference_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let pdf_bytes = app_state
        .document_service
        .generate_voucher_pdf(user.0.id, reference_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"comprobante_{}.pdf\"", reference_id),
        ),
    ];

    Ok((headers, pdf_bytes).into_response())
}
