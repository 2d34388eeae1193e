// src/db/material_payment_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::treasury::{
        AccountType, MaterialPaymentStatus, MaterialRequestStatus, TreasuryMaterialPayment,
        TreasuryMaterialPaymentItem,
    },
};

const PAYMENT_COLUMNS: &str = "id, reference_code, supplier_id, total_amount, status, account_type, account_id, \
     notes, processed_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, payment_id, material_request_id, client_id, project_id, description, partida, amount, created_at";

#[derive(Clone)]
pub struct MaterialPaymentRepository {
    pool: PgPool,
}

impl MaterialPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        reference_code: &str,
        supplier_id: Uuid,
        total_amount: Decimal,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<TreasuryMaterialPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, TreasuryMaterialPayment>(&format!(
            r#"
            INSERT INTO treasury_material_payments (reference_code, supplier_id, total_amount, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reference_code)
        .bind(supplier_id)
        .bind(total_amount)
        .bind(notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        payment_id: Uuid,
        material_request_id: Option<Uuid>,
        client_id: Option<Uuid>,
        project_id: Option<Uuid>,
        description: &str,
        partida: Option<&str>,
        amount: Decimal,
    ) -> Result<TreasuryMaterialPaymentItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, TreasuryMaterialPaymentItem>(&format!(
            r#"
            INSERT INTO treasury_material_payment_items (
                payment_id, material_request_id, client_id, project_id, description, partida, amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(payment_id)
        .bind(material_request_id)
        .bind(client_id)
        .bind(project_id)
        .bind(description)
        .bind(partida)
        .bind(amount)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    pub async fn list_payments<'e, E>(
        &self,
        executor: E,
        status: Option<MaterialPaymentStatus>,
    ) -> Result<Vec<TreasuryMaterialPayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, TreasuryMaterialPayment>(&format!(
            r#"
            SELECT {} FROM treasury_material_payments
            WHERE ($1::material_payment_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(status)
        .fetch_all(executor)
        .await?;

        Ok(payments)
    }

    pub async fn lock_payment<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<TreasuryMaterialPayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, TreasuryMaterialPayment>(&format!(
            "SELECT {} FROM treasury_material_payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        payment_id: Uuid,
    ) -> Result<Vec<TreasuryMaterialPaymentItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, TreasuryMaterialPaymentItem>(&format!(
            "SELECT {} FROM treasury_material_payment_items WHERE payment_id = $1 ORDER BY created_at ASC",
            ITEM_COLUMNS
        ))
        .bind(payment_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    /// Status atual (travado) das solicitações ligadas aos itens.
    pub async fn lock_linked_request_statuses<'e, E>(
        &self,
        executor: E,
        request_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, MaterialRequestStatus)>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows: Vec<(Uuid, MaterialRequestStatus)> = sqlx::query_as(
            "SELECT id, status FROM material_finance_requests WHERE id = ANY($1) FOR UPDATE",
        )
        .bind(request_ids)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn mark_processed<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        account_type: AccountType,
        account_id: Uuid,
        processed_at: NaiveDate,
    ) -> Result<TreasuryMaterialPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, TreasuryMaterialPayment>(&format!(
            r#"
            UPDATE treasury_material_payments
            SET status = 'processed', account_type = $2, account_id = $3, processed_at = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(account_type)
        .bind(account_id)
        .bind(processed_at)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }
}
