// src/models/treasury.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// Conta contábil padrão para compra de materiais
pub const DEFAULT_CUENTA_MAYOR: &str = "5110";

// Rótulos usados quando a relação não existe (em vez de falhar)
pub const FALLBACK_SUPPLIER: &str = "Sin proveedor";
pub const FALLBACK_MATERIAL: &str = "Material no especificado";
pub const FALLBACK_CLIENT: &str = "Sin cliente";
pub const FALLBACK_PROJECT: &str = "Sin proyecto";

// =========================================================================
//  ENUMS (mapeando os tipos do Postgres)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "material_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialRequestStatus {
    Pending,
    NotAttended,
    ExportedToTreasury,
}

impl MaterialRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialRequestStatus::Pending => "pending",
            MaterialRequestStatus::NotAttended => "not_attended",
            MaterialRequestStatus::ExportedToTreasury => "exported_to_treasury",
        }
    }

    /// Só o que ainda não foi para tesouraria pode ser agrupado.
    pub fn is_exportable(&self) -> bool {
        !matches!(self, MaterialRequestStatus::ExportedToTreasury)
    }

    /// Mudança manual de status (tela de solicitações).
    /// `exported_to_treasury` só é alcançado pela exportação ou pelo pagamento de materiais.
    pub fn manual_transition(self, next: MaterialRequestStatus) -> Result<MaterialRequestStatus, AppError> {
        use MaterialRequestStatus::*;
        match (self, next) {
            (Pending, NotAttended) | (NotAttended, Pending) => Ok(next),
            (a, b) if a == b && a != ExportedToTreasury => Ok(next),
            (from, to) => Err(AppError::InvalidStatusTransition {
                from: from.as_str().into(),
                to: to.as_str().into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_reference_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentReferenceStatus {
    Pending,
    Processed,
    Cancelled,
}

impl PaymentReferenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentReferenceStatus::Pending => "pending",
            PaymentReferenceStatus::Processed => "processed",
            PaymentReferenceStatus::Cancelled => "cancelled",
        }
    }

    /// pending -> processed | cancelled. Os dois destinos são terminais.
    pub fn transition_to(self, next: PaymentReferenceStatus) -> Result<PaymentReferenceStatus, AppError> {
        use PaymentReferenceStatus::*;
        match (self, next) {
            (Pending, Processed) | (Pending, Cancelled) => Ok(next),
            (from, to) => Err(AppError::InvalidStatusTransition {
                from: from.as_str().into(),
                to: to.as_str().into(),
            }),
        }
    }

    /// Status que as transações da referência devem ter.
    pub fn transaction_status(&self) -> TransactionStatus {
        match self {
            PaymentReferenceStatus::Pending => TransactionStatus::PendingPayment,
            PaymentReferenceStatus::Processed => TransactionStatus::Completed,
            PaymentReferenceStatus::Cancelled => TransactionStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "treasury_transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingPayment,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "treasury_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "treasury_account_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Bank,
    Cash,
}

impl AccountType {
    pub fn payment_method(&self) -> &'static str {
        match self {
            AccountType::Bank => "transferencia",
            AccountType::Cash => "efectivo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "account_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "material_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialPaymentStatus {
    Pending,
    Processed,
}

impl MaterialPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialPaymentStatus::Pending => "pending",
            MaterialPaymentStatus::Processed => "processed",
        }
    }
}

// =========================================================================
//  SOLICITAÇÕES DE FINANCIAMENTO DE MATERIAL
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialFinanceRequest {
    pub id: Uuid,
    pub material_requirement_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    #[schema(example = "10.0")]
    pub quantity: Decimal,
    #[schema(example = "150.00")]
    pub unit_cost: Decimal,
    #[schema(example = "1500.00")]
    pub total_cost: Decimal,
    pub status: MaterialRequestStatus,
    pub is_attended: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Solicitação já resolvida contra fornecedor/cliente/projeto/material,
/// com rótulos de fallback quando a relação não existe.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMaterialRequest {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub request: MaterialFinanceRequest,
    #[schema(example = "Cementos del Bajío")]
    pub supplier_name: String,
    pub client_name: String,
    pub project_name: String,
    #[schema(example = "Cemento gris 50kg")]
    pub material_name: String,
    pub unit: Option<String>,
    #[schema(example = "Obra negra")]
    pub partida: Option<String>,
}

// =========================================================================
//  REFERÊNCIAS DE PAGAMENTO E TRANSAÇÕES
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReference {
    pub id: Uuid,
    #[schema(example = "REF-20250314-000042")]
    pub reference_code: String,
    pub supplier_id: Uuid,
    #[schema(example = "3800.50")]
    pub total_amount: Decimal,
    pub account_type: Option<AccountType>,
    pub account_id: Option<Uuid>,
    pub status: PaymentReferenceStatus,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-20")]
    pub processed_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReferenceListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub reference: PaymentReference,
    pub supplier_name: String,
    pub transaction_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReferenceDetail {
    #[serde(flatten)]
    pub reference: PaymentReference,
    pub supplier_name: String,
    #[schema(example = "$3,800.50")]
    pub total_formatted: String,
    pub transactions: Vec<TreasuryTransaction>,
}

// Linha do comprovante em PDF, já com nomes de cliente e obra
#[derive(Debug, Clone, FromRow)]
pub struct VoucherLine {
    pub description: String,
    pub partida: Option<String>,
    pub client_name: String,
    pub project_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryTransaction {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub account_type: Option<AccountType>,
    pub account_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub material_request_id: Option<Uuid>,
    pub payment_reference_id: Option<Uuid>,
    pub material_payment_id: Option<Uuid>,
    #[schema(example = "1500.00")]
    pub amount: Decimal,
    pub description: String,
    #[schema(example = "5110")]
    pub cuenta_mayor: String,
    pub partida: Option<String>,
    pub status: TransactionStatus,
    #[schema(value_type = Option<String>, format = Date)]
    pub transaction_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub supplier_id: Option<Uuid>,
    pub payment_reference_id: Option<Uuid>,
    pub payment_method: String,
    #[schema(value_type = String, format = Date)]
    pub expense_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// =========================================================================
//  CONTAS (Banco / Caixa)
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: Uuid,
    #[schema(example = "Cuenta operativa")]
    pub account_name: String,
    #[schema(example = "BBVA")]
    pub bank_name: String,
    pub account_number: Option<String>,
    pub current_balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CashAccount {
    pub id: Uuid,
    #[schema(example = "Caja chica obra")]
    pub account_name: String,
    pub current_balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

/// Conta de origem para o seletor de pagamento (banco ou caixa).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundingAccount {
    pub id: Uuid,
    pub account_type: AccountType,
    pub name: String,
    pub bank_name: Option<String>,
    pub current_balance: Decimal,
    pub current_balance_formatted: String,
}

// =========================================================================
//  PAGAMENTOS DE MATERIAIS (caminho paralelo)
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryMaterialPayment {
    pub id: Uuid,
    pub reference_code: String,
    pub supplier_id: Uuid,
    pub total_amount: Decimal,
    pub status: MaterialPaymentStatus,
    pub account_type: Option<AccountType>,
    pub account_id: Option<Uuid>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub processed_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryMaterialPaymentItem {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub material_request_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub description: String,
    pub partida: Option<String>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialPaymentDetail {
    #[serde(flatten)]
    pub payment: TreasuryMaterialPayment,
    pub items: Vec<TreasuryMaterialPaymentItem>,
}

// =========================================================================
//  ESTRUTURAS DE INSERÇÃO
// =========================================================================

/// Linha de tesouraria a inserir (uma por material).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTreasuryTransaction {
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub account_type: Option<AccountType>,
    pub account_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub material_request_id: Option<Uuid>,
    pub payment_reference_id: Option<Uuid>,
    pub material_payment_id: Option<Uuid>,
    pub amount: Decimal,
    pub description: String,
    pub cuenta_mayor: String,
    pub partida: Option<String>,
    pub transaction_date: Option<NaiveDate>,
}

/// Registro agregado em `expenses` gerado ao processar uma referência.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub supplier_id: Option<Uuid>,
    pub payment_reference_id: Option<Uuid>,
    pub payment_method: String,
    pub expense_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reference_can_be_processed_or_cancelled() {
        let pending = PaymentReferenceStatus::Pending;
        assert_eq!(
            pending.transition_to(PaymentReferenceStatus::Processed).unwrap(),
            PaymentReferenceStatus::Processed
        );
        assert_eq!(
            pending.transition_to(PaymentReferenceStatus::Cancelled).unwrap(),
            PaymentReferenceStatus::Cancelled
        );
    }

    #[test]
    fn terminal_reference_states_reject_every_transition() {
        for from in [PaymentReferenceStatus::Processed, PaymentReferenceStatus::Cancelled] {
            for to in [
                PaymentReferenceStatus::Pending,
                PaymentReferenceStatus::Processed,
                PaymentReferenceStatus::Cancelled,
            ] {
                assert!(matches!(
                    from.transition_to(to),
                    Err(AppError::InvalidStatusTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn pending_reference_never_owns_completed_transactions() {
        assert_eq!(
            PaymentReferenceStatus::Pending.transaction_status(),
            TransactionStatus::PendingPayment
        );
        assert_eq!(
            PaymentReferenceStatus::Processed.transaction_status(),
            TransactionStatus::Completed
        );
    }

    #[test]
    fn exported_requests_cannot_be_toggled_manually() {
        let exported = MaterialRequestStatus::ExportedToTreasury;
        assert!(exported.manual_transition(MaterialRequestStatus::Pending).is_err());
        assert!(exported.manual_transition(MaterialRequestStatus::ExportedToTreasury).is_err());
        assert!(
            MaterialRequestStatus::Pending
                .manual_transition(MaterialRequestStatus::ExportedToTreasury)
                .is_err()
        );
        assert_eq!(
            MaterialRequestStatus::Pending
                .manual_transition(MaterialRequestStatus::NotAttended)
                .unwrap(),
            MaterialRequestStatus::NotAttended
        );
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_value(MaterialRequestStatus::ExportedToTreasury).unwrap(),
            serde_json::json!("exported_to_treasury")
        );
        assert_eq!(
            serde_json::to_value(TransactionStatus::PendingPayment).unwrap(),
            serde_json::json!("pending_payment")
        );
    }
}
