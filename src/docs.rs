// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::users::get_me,
        handlers::users::list_users,
        handlers::users::approve_user,

        // --- Material Requests ---
        handlers::treasury::list_material_requests,
        handlers::treasury::create_material_request,
        handlers::treasury::update_material_request_status,

        // --- Treasury ---
        handlers::treasury::export_to_treasury,
        handlers::treasury::list_payment_references,
        handlers::treasury::get_payment_reference,
        handlers::treasury::process_payment_reference,
        handlers::treasury::cancel_payment_reference,
        handlers::treasury::list_transactions,
        handlers::treasury::list_funding_accounts,

        // --- Material Payments ---
        handlers::material_payments::create_material_payment,
        handlers::material_payments::list_material_payments,
        handlers::material_payments::process_material_payment,

        // --- Dashboard ---
        handlers::dashboard::get_treasury_summary,
        handlers::dashboard::get_expenses_by_month,
        handlers::dashboard::get_expenses_by_partida,
        handlers::dashboard::get_payables_by_supplier,

        // --- Documents ---
        handlers::documents::payment_reference_voucher,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            handlers::users::ApproveUserPayload,

            // --- Treasury ---
            models::treasury::MaterialRequestStatus,
            models::treasury::PaymentReferenceStatus,
            models::treasury::TransactionStatus,
            models::treasury::TransactionType,
            models::treasury::AccountType,
            models::treasury::AccountStatus,
            models::treasury::MaterialPaymentStatus,
            models::treasury::MaterialFinanceRequest,
            models::treasury::ResolvedMaterialRequest,
            models::treasury::PaymentReference,
            models::treasury::PaymentReferenceListItem,
            models::treasury::PaymentReferenceDetail,
            models::treasury::TreasuryTransaction,
            models::treasury::Expense,
            models::treasury::FundingAccount,
            models::treasury::TreasuryMaterialPayment,
            models::treasury::TreasuryMaterialPaymentItem,
            models::treasury::MaterialPaymentDetail,
            services::payment_grouping::SkipReason,
            services::payment_grouping::SkippedRequest,
            services::treasury_service::ExportResult,
            services::treasury_service::ExportedReference,
            services::treasury_service::ProcessedReference,
            services::material_payment_service::ProcessedMaterialPayment,

            // --- Payloads ---
            handlers::treasury::CreateMaterialRequestPayload,
            handlers::treasury::UpdateRequestStatusPayload,
            handlers::treasury::ExportToTreasuryPayload,
            handlers::treasury::ProcessReferencePayload,
            handlers::treasury::CancelReferencePayload,
            handlers::material_payments::CreateMaterialPaymentPayload,
            handlers::material_payments::MaterialPaymentItemPayload,
            handlers::material_payments::ProcessMaterialPaymentPayload,

            // --- Dashboard ---
            models::dashboard::TreasurySummary,
            models::dashboard::MoneyValue,
            models::dashboard::MonthlyExpenseEntry,
            models::dashboard::PartidaExpenseEntry,
            models::dashboard::SupplierPayableEntry,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Usuário atual e aprovação de acesso"),
        (name = "Material Requests", description = "Solicitações de financiamento de material"),
        (name = "Treasury", description = "Referências de pagamento, conciliação e contas"),
        (name = "Material Payments", description = "Pagamentos diretos de materiais"),
        (name = "Dashboard", description = "Indicadores e Gráficos da Tesouraria"),
        (name = "Documents", description = "Comprovantes em PDF")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_treasury_paths_and_jwt_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/treasury/export"));
        assert!(doc.paths.paths.contains_key("/api/treasury/payment-references/{id}/process"));
        assert!(doc.paths.paths.contains_key("/api/dashboard/expenses-by-partida"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
