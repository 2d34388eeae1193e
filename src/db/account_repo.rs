// src/db/account_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::treasury::{AccountStatus, AccountType, BankAccount, CashAccount},
};

#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_active_bank_accounts<'e, E>(&self, executor: E) -> Result<Vec<BankAccount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let accounts = sqlx::query_as::<_, BankAccount>(
            r#"
            SELECT id, account_name, bank_name, account_number, current_balance, status, created_at
            FROM bank_accounts
            WHERE status = 'active'
            ORDER BY account_name ASC
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(accounts)
    }

    pub async fn list_active_cash_accounts<'e, E>(&self, executor: E) -> Result<Vec<CashAccount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let accounts = sqlx::query_as::<_, CashAccount>(
            r#"
            SELECT id, account_name, current_balance, status, created_at
            FROM cash_accounts
            WHERE status = 'active'
            ORDER BY account_name ASC
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(accounts)
    }

    /// Status da conta na tabela certa para o tipo. `None` se não existir.
    pub async fn find_status<'e, E>(
        &self,
        executor: E,
        account_type: AccountType,
        account_id: Uuid,
    ) -> Result<Option<AccountStatus>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = match account_type {
            AccountType::Bank => "SELECT status FROM bank_accounts WHERE id = $1",
            AccountType::Cash => "SELECT status FROM cash_accounts WHERE id = $1",
        };

        let row: Option<(AccountStatus,)> = sqlx::query_as(sql)
            .bind(account_id)
            .fetch_optional(executor)
            .await?;

        Ok(row.map(|(status,)| status))
    }

    /// Rótulo legível da conta (ex.: "BBVA - Operación"), para comprovantes.
    pub async fn find_label<'e, E>(
        &self,
        executor: E,
        account_type: AccountType,
        account_id: Uuid,
    ) -> Result<Option<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = match account_type {
            AccountType::Bank => "SELECT bank_name || ' - ' || account_name FROM bank_accounts WHERE id = $1",
            AccountType::Cash => "SELECT account_name FROM cash_accounts WHERE id = $1",
        };

        let row: Option<(String,)> = sqlx::query_as(sql)
            .bind(account_id)
            .fetch_optional(executor)
            .await?;

        Ok(row.map(|(label,)| label))
    }

    /// Garante que a conta de origem existe e está ativa.
    pub async fn ensure_active<'e, E>(
        &self,
        executor: E,
        account_type: AccountType,
        account_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        match self.find_status(executor, account_type, account_id).await? {
            Some(AccountStatus::Active) => Ok(()),
            Some(AccountStatus::Inactive) => Err(AppError::InactiveAccount(account_id)),
            None => Err(AppError::ResourceNotFound(format!("cuenta {}", account_id))),
        }
    }
}
