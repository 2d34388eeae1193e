// src/db/dashboard_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::{
        dashboard::{AccountBalanceRow, ReferenceTotalsRow, TransactionTotalsRow},
        treasury::FALLBACK_SUPPLIER,
    },
};

// Só busca linhas cruas; somas e agrupamentos ficam no DashboardService.
#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn reference_totals<'e, E>(&self, executor: E) -> Result<Vec<ReferenceTotalsRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, ReferenceTotalsRow>(
            r#"
            SELECT r.supplier_id, COALESCE(s.company_name, $1) AS supplier_name, r.status, r.total_amount
            FROM treasury_payment_references r
            LEFT JOIN suppliers s ON s.id = r.supplier_id
            "#,
        )
        .bind(FALLBACK_SUPPLIER)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn transaction_totals<'e, E>(&self, executor: E) -> Result<Vec<TransactionTotalsRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, TransactionTotalsRow>(
            r#"
            SELECT status, transaction_type, amount, partida, transaction_date
            FROM treasury_transactions
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn active_account_balances<'e, E>(&self, executor: E) -> Result<Vec<AccountBalanceRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, AccountBalanceRow>(
            r#"
            SELECT 'bank'::treasury_account_type AS account_type, current_balance
            FROM bank_accounts WHERE status = 'active'
            UNION ALL
            SELECT 'cash'::treasury_account_type AS account_type, current_balance
            FROM cash_accounts WHERE status = 'active'
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
