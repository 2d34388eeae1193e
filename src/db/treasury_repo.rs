// src/db/treasury_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::treasury::{
        AccountType, Expense, MaterialFinanceRequest, MaterialRequestStatus, NewExpense,
        NewTreasuryTransaction, PaymentReference, PaymentReferenceListItem, PaymentReferenceStatus,
        ResolvedMaterialRequest, TransactionStatus, TreasuryTransaction, VoucherLine, FALLBACK_CLIENT,
        FALLBACK_MATERIAL, FALLBACK_PROJECT, FALLBACK_SUPPLIER,
    },
};

// Uma única consulta com JOIN no lugar de buscar três tabelas e cruzar em memória.
// Relações ausentes viram rótulos de fallback.
const RESOLVED_REQUEST_SELECT: &str = r#"
    SELECT
        mr.id, mr.material_requirement_id, mr.supplier_id, mr.client_id, mr.project_id,
        mr.quantity, mr.unit_cost, mr.total_cost, mr.status, mr.is_attended, mr.notes,
        mr.created_at, mr.updated_at,
        COALESCE(s.company_name, $1) AS supplier_name,
        COALESCE(c.full_name, $2) AS client_name,
        COALESCE(p.project_name, $3) AS project_name,
        COALESCE(req.material_name, $4) AS material_name,
        req.unit,
        req.partida
    FROM material_finance_requests mr
    LEFT JOIN suppliers s ON s.id = mr.supplier_id
    LEFT JOIN clients c ON c.id = mr.client_id
    LEFT JOIN projects p ON p.id = mr.project_id
    LEFT JOIN material_requirements req ON req.id = mr.material_requirement_id
"#;

const REFERENCE_COLUMNS: &str = "id, reference_code, supplier_id, total_amount, account_type, account_id, \
     status, notes, processed_at, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, transaction_type, account_type, account_id, client_id, project_id, \
     supplier_id, material_request_id, payment_reference_id, material_payment_id, amount, description, \
     cuenta_mayor, partida, status, transaction_date, created_at, updated_at";

#[derive(Clone)]
pub struct TreasuryRepository {
    pool: PgPool,
}

impl TreasuryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    //  SOLICITAÇÕES DE MATERIAL
    // =========================================================================

    pub async fn list_resolved_requests<'e, E>(
        &self,
        executor: E,
        status: Option<MaterialRequestStatus>,
    ) -> Result<Vec<ResolvedMaterialRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "{} WHERE ($5::material_request_status IS NULL OR mr.status = $5) ORDER BY mr.created_at DESC",
            RESOLVED_REQUEST_SELECT
        );

        let rows = sqlx::query_as::<_, ResolvedMaterialRequest>(&sql)
            .bind(FALLBACK_SUPPLIER)
            .bind(FALLBACK_CLIENT)
            .bind(FALLBACK_PROJECT)
            .bind(FALLBACK_MATERIAL)
            .bind(status)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    /// Carrega e trava (FOR UPDATE) as solicitações selecionadas.
    pub async fn lock_resolved_requests<'e, E>(
        &self,
        executor: E,
        ids: &[Uuid],
    ) -> Result<Vec<ResolvedMaterialRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("{} WHERE mr.id = ANY($5) FOR UPDATE OF mr", RESOLVED_REQUEST_SELECT);

        let rows = sqlx::query_as::<_, ResolvedMaterialRequest>(&sql)
            .bind(FALLBACK_SUPPLIER)
            .bind(FALLBACK_CLIENT)
            .bind(FALLBACK_PROJECT)
            .bind(FALLBACK_MATERIAL)
            .bind(ids)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    pub async fn create_request<'e, E>(
        &self,
        executor: E,
        material_requirement_id: Option<Uuid>,
        supplier_id: Option<Uuid>,
        client_id: Option<Uuid>,
        project_id: Option<Uuid>,
        quantity: Decimal,
        unit_cost: Decimal,
        total_cost: Decimal,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<MaterialFinanceRequest, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, MaterialFinanceRequest>(
            r#"
            INSERT INTO material_finance_requests (
                material_requirement_id, supplier_id, client_id, project_id,
                quantity, unit_cost, total_cost, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING
                id, material_requirement_id, supplier_id, client_id, project_id,
                quantity, unit_cost, total_cost, status, is_attended, notes,
                created_at, updated_at
            "#,
        )
        .bind(material_requirement_id)
        .bind(supplier_id)
        .bind(client_id)
        .bind(project_id)
        .bind(quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .bind(notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(request)
    }

    pub async fn lock_request<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<MaterialFinanceRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, MaterialFinanceRequest>(
            r#"
            SELECT
                id, material_requirement_id, supplier_id, client_id, project_id,
                quantity, unit_cost, total_cost, status, is_attended, notes,
                created_at, updated_at
            FROM material_finance_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(request)
    }

    pub async fn update_request_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: MaterialRequestStatus,
    ) -> Result<MaterialFinanceRequest, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, MaterialFinanceRequest>(
            r#"
            UPDATE material_finance_requests
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, material_requirement_id, supplier_id, client_id, project_id,
                quantity, unit_cost, total_cost, status, is_attended, notes,
                created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(request)
    }

    /// Marca as solicitações agrupadas como exportadas. Retorna quantas mudaram.
    pub async fn mark_requests_exported<'e, E>(
        &self,
        executor: E,
        ids: &[Uuid],
        attended: bool,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE material_finance_requests
            SET status = 'exported_to_treasury', is_attended = is_attended OR $2, updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(attended)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_reference_requests_attended<'e, E>(
        &self,
        executor: E,
        payment_reference_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE material_finance_requests
            SET is_attended = TRUE, updated_at = NOW()
            WHERE id IN (
                SELECT material_request_id FROM treasury_transactions
                WHERE payment_reference_id = $1 AND material_request_id IS NOT NULL
            )
            "#,
        )
        .bind(payment_reference_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Devolve as solicitações de uma referência cancelada para `pending`.
    pub async fn release_reference_requests<'e, E>(
        &self,
        executor: E,
        payment_reference_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE material_finance_requests
            SET status = 'pending', is_attended = FALSE, updated_at = NOW()
            WHERE id IN (
                SELECT material_request_id FROM treasury_transactions
                WHERE payment_reference_id = $1 AND material_request_id IS NOT NULL
            )
            "#,
        )
        .bind(payment_reference_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  REFERÊNCIAS DE PAGAMENTO
    // =========================================================================

    pub async fn next_reference_number<'e, E>(&self, executor: E) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (value,): (i64,) = sqlx::query_as("SELECT nextval('payment_reference_seq')")
            .fetch_one(executor)
            .await?;

        Ok(value)
    }

    pub async fn insert_reference<'e, E>(
        &self,
        executor: E,
        reference_code: &str,
        supplier_id: Uuid,
        total_amount: Decimal,
        created_by: Uuid,
    ) -> Result<PaymentReference, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let reference = sqlx::query_as::<_, PaymentReference>(&format!(
            r#"
            INSERT INTO treasury_payment_references (reference_code, supplier_id, total_amount, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            REFERENCE_COLUMNS
        ))
        .bind(reference_code)
        .bind(supplier_id)
        .bind(total_amount)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(reference)
    }

    pub async fn lock_reference<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<PaymentReference>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let reference = sqlx::query_as::<_, PaymentReference>(&format!(
            "SELECT {} FROM treasury_payment_references WHERE id = $1 FOR UPDATE",
            REFERENCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(reference)
    }

    pub async fn find_reference_item<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<PaymentReferenceListItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, PaymentReferenceListItem>(
            r#"
            SELECT
                r.id, r.reference_code, r.supplier_id, r.total_amount, r.account_type, r.account_id,
                r.status, r.notes, r.processed_at, r.created_at, r.updated_at,
                COALESCE(s.company_name, $2) AS supplier_name,
                (SELECT COUNT(*) FROM treasury_transactions t WHERE t.payment_reference_id = r.id) AS transaction_count
            FROM treasury_payment_references r
            LEFT JOIN suppliers s ON s.id = r.supplier_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .bind(FALLBACK_SUPPLIER)
        .fetch_optional(executor)
        .await?;

        Ok(item)
    }

    pub async fn list_references<'e, E>(
        &self,
        executor: E,
        status: Option<PaymentReferenceStatus>,
    ) -> Result<Vec<PaymentReferenceListItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, PaymentReferenceListItem>(
            r#"
            SELECT
                r.id, r.reference_code, r.supplier_id, r.total_amount, r.account_type, r.account_id,
                r.status, r.notes, r.processed_at, r.created_at, r.updated_at,
                COALESCE(s.company_name, $2) AS supplier_name,
                (SELECT COUNT(*) FROM treasury_transactions t WHERE t.payment_reference_id = r.id) AS transaction_count
            FROM treasury_payment_references r
            LEFT JOIN suppliers s ON s.id = r.supplier_id
            WHERE ($1::payment_reference_status IS NULL OR r.status = $1)
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(status)
        .bind(FALLBACK_SUPPLIER)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn mark_reference_processed<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        account_type: AccountType,
        account_id: Uuid,
        notes: Option<&str>,
        processed_at: NaiveDate,
    ) -> Result<PaymentReference, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let reference = sqlx::query_as::<_, PaymentReference>(&format!(
            r#"
            UPDATE treasury_payment_references
            SET account_type = $2, account_id = $3, notes = $4, processed_at = $5,
                status = 'processed', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REFERENCE_COLUMNS
        ))
        .bind(id)
        .bind(account_type)
        .bind(account_id)
        .bind(notes)
        .bind(processed_at)
        .fetch_one(executor)
        .await?;

        Ok(reference)
    }

    pub async fn mark_reference_cancelled<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        notes: Option<&str>,
    ) -> Result<PaymentReference, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let reference = sqlx::query_as::<_, PaymentReference>(&format!(
            r#"
            UPDATE treasury_payment_references
            SET notes = $2, status = 'cancelled', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REFERENCE_COLUMNS
        ))
        .bind(id)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(reference)
    }

    // =========================================================================
    //  TRANSAÇÕES DE TESOURARIA
    // =========================================================================

    pub async fn insert_transaction<'e, E>(
        &self,
        executor: E,
        draft: &NewTreasuryTransaction,
        created_by: Uuid,
    ) -> Result<TreasuryTransaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, TreasuryTransaction>(&format!(
            r#"
            INSERT INTO treasury_transactions (
                transaction_type, status, account_type, account_id,
                client_id, project_id, supplier_id,
                material_request_id, payment_reference_id, material_payment_id,
                amount, description, cuenta_mayor, partida, transaction_date, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(draft.transaction_type)
        .bind(draft.status)
        .bind(draft.account_type)
        .bind(draft.account_id)
        .bind(draft.client_id)
        .bind(draft.project_id)
        .bind(draft.supplier_id)
        .bind(draft.material_request_id)
        .bind(draft.payment_reference_id)
        .bind(draft.material_payment_id)
        .bind(draft.amount)
        .bind(&draft.description)
        .bind(&draft.cuenta_mayor)
        .bind(draft.partida.as_deref())
        .bind(draft.transaction_date)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(transaction)
    }

    pub async fn list_reference_transactions<'e, E>(
        &self,
        executor: E,
        payment_reference_id: Uuid,
    ) -> Result<Vec<TreasuryTransaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, TreasuryTransaction>(&format!(
            "SELECT {} FROM treasury_transactions WHERE payment_reference_id = $1 ORDER BY created_at ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(payment_reference_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn list_voucher_lines<'e, E>(
        &self,
        executor: E,
        payment_reference_id: Uuid,
    ) -> Result<Vec<VoucherLine>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, VoucherLine>(
            r#"
            SELECT
                t.description, t.partida, t.amount,
                COALESCE(c.full_name, $2) AS client_name,
                COALESCE(p.project_name, $3) AS project_name
            FROM treasury_transactions t
            LEFT JOIN clients c ON c.id = t.client_id
            LEFT JOIN projects p ON p.id = t.project_id
            WHERE t.payment_reference_id = $1
            ORDER BY t.created_at ASC
            "#,
        )
        .bind(payment_reference_id)
        .bind(FALLBACK_CLIENT)
        .bind(FALLBACK_PROJECT)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn list_transactions<'e, E>(
        &self,
        executor: E,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<TreasuryTransaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, TreasuryTransaction>(&format!(
            r#"
            SELECT {} FROM treasury_transactions
            WHERE ($1::treasury_transaction_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(status)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Concilia todas as linhas da referência contra a conta escolhida.
    pub async fn settle_reference_transactions<'e, E>(
        &self,
        executor: E,
        payment_reference_id: Uuid,
        status: TransactionStatus,
        account_type: AccountType,
        account_id: Uuid,
        transaction_date: NaiveDate,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE treasury_transactions
            SET status = $2, account_type = $3, account_id = $4, transaction_date = $5, updated_at = NOW()
            WHERE payment_reference_id = $1
            "#,
        )
        .bind(payment_reference_id)
        .bind(status)
        .bind(account_type)
        .bind(account_id)
        .bind(transaction_date)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn set_reference_transactions_status<'e, E>(
        &self,
        executor: E,
        payment_reference_id: Uuid,
        status: TransactionStatus,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE treasury_transactions
            SET status = $2, updated_at = NOW()
            WHERE payment_reference_id = $1
            "#,
        )
        .bind(payment_reference_id)
        .bind(status)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  DESPESAS (registro agregado)
    // =========================================================================

    pub async fn insert_expense<'e, E>(
        &self,
        executor: E,
        expense: &NewExpense,
        created_by: Uuid,
    ) -> Result<Expense, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (
                description, amount, category, supplier_id, payment_reference_id,
                payment_method, expense_date, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, description, amount, category, supplier_id, payment_reference_id,
                payment_method, expense_date, created_at
            "#,
        )
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(expense.supplier_id)
        .bind(expense.payment_reference_id)
        .bind(&expense.payment_method)
        .bind(expense.expense_date)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }
}
