// src/services/dashboard_service.rs

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_as_user, error::AppError, money},
    db::DashboardRepository,
    models::{
        dashboard::{
            AccountBalanceRow, MoneyValue, MonthlyExpenseEntry, PartidaExpenseEntry,
            ReferenceTotalsRow, SupplierPayableEntry, TransactionTotalsRow, TreasurySummary,
        },
        treasury::{AccountType, PaymentReferenceStatus, TransactionStatus, TransactionType},
    },
};

pub const FALLBACK_PARTIDA: &str = "Sin partida";

impl MoneyValue {
    pub fn new(amount: Decimal) -> Self {
        Self { formatted: money::format_mxn(amount), amount }
    }
}

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
}

impl DashboardService {
    pub fn new(repo: DashboardRepository) -> Self {
        Self { repo }
    }

    pub async fn treasury_summary(&self, user_id: Uuid) -> Result<TreasurySummary, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let references = self.repo.reference_totals(&mut *tx).await?;
        let transactions = self.repo.transaction_totals(&mut *tx).await?;
        let balances = self.repo.active_account_balances(&mut *tx).await?;

        tx.commit().await?;

        Ok(summarize(&references, &transactions, &balances))
    }

    pub async fn expenses_by_month(
        &self,
        user_id: Uuid,
        year: Option<i32>,
    ) -> Result<Vec<MonthlyExpenseEntry>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let transactions = self.repo.transaction_totals(&mut *tx).await?;
        tx.commit().await?;

        Ok(group_by_month(&transactions, year))
    }

    pub async fn expenses_by_partida(&self, user_id: Uuid) -> Result<Vec<PartidaExpenseEntry>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let transactions = self.repo.transaction_totals(&mut *tx).await?;
        tx.commit().await?;

        Ok(group_by_partida(&transactions))
    }

    pub async fn payables_by_supplier(&self, user_id: Uuid) -> Result<Vec<SupplierPayableEntry>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let references = self.repo.reference_totals(&mut *tx).await?;
        tx.commit().await?;

        Ok(group_payables(&references))
    }
}

// =========================================================================
//  Agregações (sem banco)
// =========================================================================

fn is_completed_expense(row: &TransactionTotalsRow) -> bool {
    row.status == TransactionStatus::Completed && row.transaction_type == TransactionType::Expense
}

pub fn summarize(
    references: &[ReferenceTotalsRow],
    transactions: &[TransactionTotalsRow],
    balances: &[AccountBalanceRow],
) -> TreasurySummary {
    let pending: Vec<&ReferenceTotalsRow> = references
        .iter()
        .filter(|r| r.status == PaymentReferenceStatus::Pending)
        .collect();

    let sum_refs = |status: PaymentReferenceStatus| -> Decimal {
        references.iter().filter(|r| r.status == status).map(|r| r.total_amount).sum()
    };
    let sum_txs = |status: TransactionStatus| -> Decimal {
        transactions.iter().filter(|t| t.status == status).map(|t| t.amount).sum()
    };
    let sum_balances = |kind: AccountType| -> Decimal {
        balances.iter().filter(|b| b.account_type == kind).map(|b| b.current_balance).sum()
    };

    TreasurySummary {
        pending_references_count: pending.len(),
        pending_references_total: MoneyValue::new(pending.iter().map(|r| r.total_amount).sum()),
        processed_references_total: MoneyValue::new(sum_refs(PaymentReferenceStatus::Processed)),
        pending_payment_total: MoneyValue::new(sum_txs(TransactionStatus::PendingPayment)),
        completed_total: MoneyValue::new(sum_txs(TransactionStatus::Completed)),
        bank_balance: MoneyValue::new(sum_balances(AccountType::Bank)),
        cash_balance: MoneyValue::new(sum_balances(AccountType::Cash)),
    }
}

/// Gastos concluídos por mês (`YYYY-MM`), em ordem crescente.
/// Linhas sem data não entram no gráfico.
pub fn group_by_month(transactions: &[TransactionTotalsRow], year: Option<i32>) -> Vec<MonthlyExpenseEntry> {
    let mut months: BTreeMap<(i32, u32), (Decimal, usize)> = BTreeMap::new();

    for row in transactions.iter().filter(|t| is_completed_expense(t)) {
        let Some(date) = row.transaction_date else { continue };
        if year.is_some_and(|y| y != date.year()) {
            continue;
        }
        let entry = months.entry((date.year(), date.month())).or_insert((Decimal::ZERO, 0));
        entry.0 += row.amount;
        entry.1 += 1;
    }

    months
        .into_iter()
        .map(|((y, m), (total, count))| MonthlyExpenseEntry {
            month: format!("{:04}-{:02}", y, m),
            total: MoneyValue::new(total),
            transaction_count: count,
        })
        .collect()
}

/// Gastos concluídos por partida, do maior para o menor, com percentual do total.
pub fn group_by_partida(transactions: &[TransactionTotalsRow]) -> Vec<PartidaExpenseEntry> {
    let mut totals: HashMap<String, Decimal> = HashMap::new();

    for row in transactions.iter().filter(|t| is_completed_expense(t)) {
        let label = row
            .partida
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(FALLBACK_PARTIDA);
        *totals.entry(label.to_string()).or_insert(Decimal::ZERO) += row.amount;
    }

    let grand_total: Decimal = totals.values().copied().sum();

    let mut entries: Vec<PartidaExpenseEntry> = totals
        .into_iter()
        .map(|(partida, total)| PartidaExpenseEntry {
            percentage: money::percentage(total, grand_total),
            total: MoneyValue::new(total),
            partida,
        })
        .collect();

    // Empate no total: ordem alfabética, para a resposta ser estável
    entries.sort_by(|a, b| b.total.amount.cmp(&a.total.amount).then_with(|| a.partida.cmp(&b.partida)));
    entries
}

/// Referências pendentes agrupadas por fornecedor, maior dívida primeiro.
pub fn group_payables(references: &[ReferenceTotalsRow]) -> Vec<SupplierPayableEntry> {
    let mut by_supplier: HashMap<Uuid, (String, usize, Decimal)> = HashMap::new();

    for row in references.iter().filter(|r| r.status == PaymentReferenceStatus::Pending) {
        let entry = by_supplier
            .entry(row.supplier_id)
            .or_insert_with(|| (row.supplier_name.clone(), 0, Decimal::ZERO));
        entry.1 += 1;
        entry.2 += row.total_amount;
    }

    let mut entries: Vec<SupplierPayableEntry> = by_supplier
        .into_iter()
        .map(|(supplier_id, (supplier_name, reference_count, total))| SupplierPayableEntry {
            supplier_id,
            supplier_name,
            reference_count,
            total: MoneyValue::new(total),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total.amount.cmp(&a.total.amount).then_with(|| a.supplier_name.cmp(&b.supplier_name))
    });
    entries
}
