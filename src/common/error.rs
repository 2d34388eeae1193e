// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::i18n::Locale;

// O erro de domínio. Services e repositórios só conhecem este tipo.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Usuário ainda não aprovado")]
    UserNotApproved,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Nenhuma solicitação exportável na seleção")]
    NothingToExport,

    #[error("Solicitações já exportadas para tesouraria: {0:?}")]
    AlreadyExported(Vec<Uuid>),

    #[error("Conta de pagamento inativa: {0}")]
    InactiveAccount(Uuid),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// O erro que sai pela API, já traduzido.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    /// Erro de validação de um campo só, para regras checadas fora do `validate()`.
    pub fn invalid_field(field: &'static str, message: &'static str) -> Self {
        let mut err = validator::ValidationError::new("range");
        err.message = Some(message.into());

        let mut errors = validator::ValidationErrors::new();
        errors.add(field, err);
        AppError::ValidationError(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::UserNotApproved | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStatusTransition { .. }
            | AppError::AlreadyExported(_)
            | AppError::InactiveAccount(_) => StatusCode::CONFLICT,
            AppError::NothingToExport => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::FontNotFound(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta da API no idioma do cliente.
    /// Erros internos são logados aqui e nunca vazam detalhes.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let status = self.status_code();
        let es = locale.is_spanish();

        let (error, details) = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), json!(messages));
                }
                let msg = if es { "Uno o más campos son inválidos." } else { "One or more fields are invalid." };
                (msg.to_string(), Some(Value::Object(details)))
            }
            AppError::EmailAlreadyExists => {
                (pick(es, "Este correo ya está registrado.", "This e-mail is already in use."), None)
            }
            AppError::InvalidCredentials => {
                (pick(es, "Correo o contraseña inválidos.", "Invalid e-mail or password."), None)
            }
            AppError::InvalidToken => (
                pick(es, "Token de autenticación inválido o ausente.", "Missing or invalid authentication token."),
                None,
            ),
            AppError::UserNotFound => (pick(es, "Usuario no encontrado.", "User not found."), None),
            AppError::UserNotApproved => (
                pick(es, "Tu cuenta está pendiente de aprobación.", "Your account is awaiting approval."),
                None,
            ),
            AppError::Forbidden => (
                pick(es, "No tienes permiso para realizar esta acción.", "You are not allowed to perform this action."),
                None,
            ),
            AppError::ResourceNotFound(what) => {
                let msg = if es { format!("No encontrado: {}", what) } else { format!("Not found: {}", what) };
                (msg, None)
            }
            AppError::InvalidStatusTransition { from, to } => {
                let msg = if es {
                    format!("No se puede cambiar el estado de '{}' a '{}'.", from, to)
                } else {
                    format!("Cannot change status from '{}' to '{}'.", from, to)
                };
                (msg, None)
            }
            AppError::NothingToExport => (
                pick(
                    es,
                    "Ninguna de las solicitudes seleccionadas se puede exportar a tesorería.",
                    "None of the selected requests can be exported to treasury.",
                ),
                None,
            ),
            AppError::AlreadyExported(ids) => (
                pick(
                    es,
                    "Algunas solicitudes ya fueron exportadas a tesorería.",
                    "Some requests were already exported to treasury.",
                ),
                Some(json!({ "materialRequestIds": ids })),
            ),
            AppError::InactiveAccount(id) => {
                let msg = if es {
                    format!("La cuenta {} no está activa.", id)
                } else {
                    format!("Account {} is not active.", id)
                };
                (msg, None)
            }
            e => {
                tracing::error!("🔥 Erro interno: {}", e);
                (pick(es, "Ocurrió un error inesperado.", "An unexpected error occurred."), None)
            }
        };

        ApiError { status, error, details }
    }
}

fn pick(es: bool, spanish: &str, english: &str) -> String {
    if es { spanish.to_string() } else { english.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_export_is_unprocessable() {
        let err = AppError::NothingToExport.to_api_error(&Locale::default());
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.error.contains("tesorería"));
    }

    #[test]
    fn transition_error_is_translated_to_english() {
        let err = AppError::InvalidStatusTransition {
            from: "processed".into(),
            to: "cancelled".into(),
        };
        let api = err.to_api_error(&Locale("en".into()));
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.error, "Cannot change status from 'processed' to 'cancelled'.");
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::InternalServerError(anyhow::anyhow!("connection string postgres://secret"));
        let api = err.to_api_error(&Locale::default());
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("secret"));
        assert!(api.details.is_none());
    }

    #[test]
    fn invalid_field_is_a_bad_request_on_that_field() {
        let api = AppError::invalid_field("unitCost", "Fuera de rango.").to_api_error(&Locale::default());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.expect("details");
        assert_eq!(details["unitCost"][0], json!("Fuera de rango."));
    }

    #[test]
    fn already_exported_lists_the_request_ids() {
        let id = Uuid::new_v4();
        let api = AppError::AlreadyExported(vec![id]).to_api_error(&Locale::default());
        let details = api.details.expect("details");
        assert_eq!(details["materialRequestIds"][0], json!(id));
    }
}
