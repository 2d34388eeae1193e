// src/models/dashboard.rs

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// 1. Cards do topo da tela de tesouraria
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreasurySummary {
    pub pending_references_count: usize,
    pub pending_references_total: MoneyValue,
    pub processed_references_total: MoneyValue,
    pub pending_payment_total: MoneyValue, // Transações aguardando pagamento
    pub completed_total: MoneyValue,       // Transações pagas
    pub bank_balance: MoneyValue,          // Saldo somado das contas bancárias ativas
    pub cash_balance: MoneyValue,          // Saldo somado dos caixas ativos
}

// Valor + texto já formatado em MXN, para o front não reformatar
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoneyValue {
    #[schema(example = "1234.50")]
    pub amount: Decimal,
    #[schema(example = "$1,234.50")]
    pub formatted: String,
}

// 2. Gastos por mês (YYYY-MM)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyExpenseEntry {
    #[schema(example = "2025-03")]
    pub month: String,
    pub total: MoneyValue,
    pub transaction_count: usize,
}

// 3. Gastos por partida, com percentual do total
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartidaExpenseEntry {
    #[schema(example = "Obra negra")]
    pub partida: String,
    pub total: MoneyValue,
    #[schema(example = "42.50")]
    pub percentage: Decimal,
}

// 4. Contas a pagar por fornecedor (referências pendentes)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPayableEntry {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub reference_count: usize,
    pub total: MoneyValue,
}

// Linhas brutas vindas do banco; a agregação é feita no service.
#[derive(Debug, Clone, FromRow)]
pub struct ReferenceTotalsRow {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub status: crate::models::treasury::PaymentReferenceStatus,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionTotalsRow {
    pub status: crate::models::treasury::TransactionStatus,
    pub transaction_type: crate::models::treasury::TransactionType,
    pub amount: Decimal,
    pub partida: Option<String>,
    pub transaction_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AccountBalanceRow {
    pub account_type: crate::models::treasury::AccountType,
    pub current_balance: Decimal,
}
