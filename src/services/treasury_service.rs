// src/services/treasury_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_as_user, error::AppError, money},
    db::{AccountRepository, TreasuryRepository},
    models::treasury::{
        AccountType, Expense, FundingAccount, MaterialFinanceRequest, MaterialRequestStatus,
        PaymentReference, PaymentReferenceDetail, PaymentReferenceListItem, PaymentReferenceStatus,
        ResolvedMaterialRequest, TransactionStatus, TreasuryTransaction,
    },
    services::payment_grouping::{self, PaymentInstruction, SkippedRequest},
};

// Resultado da exportação: uma referência por fornecedor + o que ficou de fora
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub references: Vec<ExportedReference>,
    pub skipped: Vec<SkippedRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportedReference {
    #[serde(flatten)]
    pub reference: PaymentReference,
    pub supplier_name: String,
    pub total_formatted: String,
    pub transactions: Vec<TreasuryTransaction>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReference {
    #[serde(flatten)]
    pub reference: PaymentReference,
    pub settled_transactions: u64,
    pub expense: Expense,
}

// Dados de uma nova solicitação de financiamento
#[derive(Debug, Clone)]
pub struct NewMaterialRequest {
    pub material_requirement_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct TreasuryService {
    repo: TreasuryRepository,
    account_repo: AccountRepository,
}

impl TreasuryService {
    pub fn new(repo: TreasuryRepository, account_repo: AccountRepository) -> Self {
        Self { repo, account_repo }
    }

    // =========================================================================
    //  SOLICITAÇÕES
    // =========================================================================

    pub async fn list_requests(
        &self,
        user_id: Uuid,
        status: Option<MaterialRequestStatus>,
    ) -> Result<Vec<ResolvedMaterialRequest>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let rows = self.repo.list_resolved_requests(&mut *tx, status).await?;
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn create_request(
        &self,
        user_id: Uuid,
        input: NewMaterialRequest,
    ) -> Result<MaterialFinanceRequest, AppError> {
        // O custo unitário é gravado em centavos; o total sai do valor gravado
        let unit_cost = money::round_cents(input.unit_cost);
        let total_cost = money::line_total(input.quantity, unit_cost).ok_or_else(|| {
            AppError::invalid_field("unitCost", "El total de la solicitud excede el máximo permitido.")
        })?;

        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let request = self
            .repo
            .create_request(
                &mut *tx,
                input.material_requirement_id,
                input.supplier_id,
                input.client_id,
                input.project_id,
                input.quantity,
                unit_cost,
                total_cost,
                input.notes.as_deref(),
                user_id,
            )
            .await?;
        tx.commit().await?;

        tracing::info!("📝 Solicitação {} criada ({})", request.id, money::format_mxn(total_cost));
        Ok(request)
    }

    pub async fn change_request_status(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        next: MaterialRequestStatus,
    ) -> Result<MaterialFinanceRequest, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let current = self
            .repo
            .lock_request(&mut *tx, request_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("solicitud {}", request_id)))?;

        let status = current.status.manual_transition(next)?;
        let updated = self.repo.update_request_status(&mut *tx, request_id, status).await?;

        tx.commit().await?;
        Ok(updated)
    }

    // =========================================================================
    //  EXPORTAÇÃO PARA TESOURARIA
    // =========================================================================

    /// Agrupa as solicitações por fornecedor e gera referência + transações.
    /// Tudo numa transação só: ou todos os fornecedores entram, ou nenhum.
    pub async fn export_to_treasury(
        &self,
        user_id: Uuid,
        request_ids: &[Uuid],
    ) -> Result<ExportResult, AppError> {
        tracing::info!("📦 Exportando {} solicitações para tesouraria", request_ids.len());

        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        // 1. Carrega (e trava) a seleção já resolvida
        let loaded = self.repo.lock_resolved_requests(&mut *tx, request_ids).await?;

        // 2. Plano puro: grupos por fornecedor + ignorados
        let plan = payment_grouping::plan_export(request_ids, loaded);
        for skipped in &plan.skipped {
            tracing::warn!(
                "Solicitação {} ignorada na exportação: {:?}",
                skipped.material_request_id,
                skipped.reason
            );
        }
        if plan.is_empty() {
            return Err(AppError::NothingToExport);
        }
        if plan.groups.iter().any(|g| !money::fits_amount(g.total_amount)) {
            return Err(AppError::invalid_field(
                "materialRequestIds",
                "El total de un proveedor excede el máximo permitido.",
            ));
        }

        // 3. Uma referência por fornecedor, uma transação por material
        let today = Utc::now().date_naive();
        let mut references = Vec::with_capacity(plan.groups.len());

        for group in &plan.groups {
            let number = self.repo.next_reference_number(&mut *tx).await?;
            let code = payment_grouping::reference_code(today, number);

            let reference = self
                .repo
                .insert_reference(&mut *tx, &code, group.supplier_id, group.total_amount, user_id)
                .await?;

            let mut transactions = Vec::with_capacity(group.members.len());
            for draft in group.transaction_drafts(reference.id) {
                let transaction = self.repo.insert_transaction(&mut *tx, &draft, user_id).await?;
                transactions.push(transaction);
            }

            tracing::info!(
                "🧾 Referência {} para {}: {} linhas, {}",
                reference.reference_code,
                group.supplier_name,
                transactions.len(),
                money::format_mxn(reference.total_amount)
            );

            references.push(ExportedReference {
                total_formatted: money::format_mxn(reference.total_amount),
                supplier_name: group.supplier_name.clone(),
                reference,
                transactions,
            });
        }

        // 4. Status das solicitações agrupadas
        let grouped = plan.grouped_request_ids();
        self.repo.mark_requests_exported(&mut *tx, &grouped, false).await?;

        tx.commit().await?;

        tracing::info!("✅ Exportação concluída: {} referências", references.len());
        Ok(ExportResult { references, skipped: plan.skipped })
    }

    // =========================================================================
    //  REFERÊNCIAS
    // =========================================================================

    pub async fn list_references(
        &self,
        user_id: Uuid,
        status: Option<PaymentReferenceStatus>,
    ) -> Result<Vec<PaymentReferenceListItem>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let items = self.repo.list_references(&mut *tx, status).await?;
        tx.commit().await?;
        Ok(items)
    }

    pub async fn get_reference_detail(
        &self,
        user_id: Uuid,
        reference_id: Uuid,
    ) -> Result<PaymentReferenceDetail, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let item = self
            .repo
            .find_reference_item(&mut *tx, reference_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("referencia {}", reference_id)))?;
        let transactions = self.repo.list_reference_transactions(&mut *tx, reference_id).await?;

        tx.commit().await?;

        Ok(PaymentReferenceDetail {
            total_formatted: money::format_mxn(item.reference.total_amount),
            reference: item.reference,
            supplier_name: item.supplier_name,
            transactions,
        })
    }

    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<TreasuryTransaction>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let rows = self.repo.list_transactions(&mut *tx, status).await?;
        tx.commit().await?;
        Ok(rows)
    }

    // =========================================================================
    //  PROCESSAMENTO (conciliação)
    // =========================================================================

    /// Paga a referência com a conta escolhida: referência processada,
    /// transações concluídas, solicitações atendidas e uma despesa agregada.
    pub async fn process_reference(
        &self,
        user_id: Uuid,
        reference_id: Uuid,
        instruction: PaymentInstruction,
    ) -> Result<ProcessedReference, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let reference = self
            .repo
            .lock_reference(&mut *tx, reference_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("referencia {}", reference_id)))?;

        let plan = payment_grouping::plan_processing(&reference, &instruction)?;

        self.account_repo
            .ensure_active(&mut *tx, plan.account_type, plan.account_id)
            .await?;

        let reference = self
            .repo
            .mark_reference_processed(
                &mut *tx,
                reference_id,
                plan.account_type,
                plan.account_id,
                plan.notes.as_deref(),
                plan.payment_date,
            )
            .await?;

        let settled = self
            .repo
            .settle_reference_transactions(
                &mut *tx,
                reference_id,
                plan.transaction_status,
                plan.account_type,
                plan.account_id,
                plan.payment_date,
            )
            .await?;

        self.repo.mark_reference_requests_attended(&mut *tx, reference_id).await?;

        let expense = self.repo.insert_expense(&mut *tx, &plan.expense, user_id).await?;

        tx.commit().await?;

        tracing::info!(
            "💸 Referência {} paga via {:?} ({} transações, {})",
            reference.reference_code,
            plan.account_type,
            settled,
            money::format_mxn(reference.total_amount)
        );

        Ok(ProcessedReference { reference, settled_transactions: settled, expense })
    }

    /// Cancela uma referência pendente e libera as solicitações para nova exportação.
    pub async fn cancel_reference(
        &self,
        user_id: Uuid,
        reference_id: Uuid,
        reason: Option<&str>,
    ) -> Result<PaymentReference, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let reference = self
            .repo
            .lock_reference(&mut *tx, reference_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("referencia {}", reference_id)))?;

        let plan = payment_grouping::plan_cancellation(&reference, reason)?;

        let cancelled = self
            .repo
            .mark_reference_cancelled(&mut *tx, reference_id, plan.notes.as_deref())
            .await?;
        self.repo
            .set_reference_transactions_status(&mut *tx, reference_id, plan.transaction_status)
            .await?;
        let released = self.repo.release_reference_requests(&mut *tx, reference_id).await?;

        tx.commit().await?;

        tracing::info!(
            "🚫 Referência {} cancelada, {} solicitações liberadas",
            cancelled.reference_code,
            released
        );
        Ok(cancelled)
    }

    // =========================================================================
    //  CONTAS DE ORIGEM
    // =========================================================================

    pub async fn list_funding_accounts(&self, user_id: Uuid) -> Result<Vec<FundingAccount>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let banks = self.account_repo.list_active_bank_accounts(&mut *tx).await?;
        let cash = self.account_repo.list_active_cash_accounts(&mut *tx).await?;
        tx.commit().await?;

        let accounts = banks
            .into_iter()
            .map(|b| FundingAccount {
                id: b.id,
                account_type: AccountType::Bank,
                name: b.account_name,
                bank_name: Some(b.bank_name),
                current_balance_formatted: money::format_mxn(b.current_balance),
                current_balance: b.current_balance,
            })
            .chain(cash.into_iter().map(|c| FundingAccount {
                id: c.id,
                account_type: AccountType::Cash,
                name: c.account_name,
                bank_name: None,
                current_balance_formatted: money::format_mxn(c.current_balance),
                current_balance: c.current_balance,
            }))
            .collect();

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;

    fn service(pool: &PgPool) -> TreasuryService {
        TreasuryService::new(TreasuryRepository::new(pool.clone()), AccountRepository::new(pool.clone()))
    }

    async fn seed_user(pool: &PgPool) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO users (email, password_hash, full_name, is_approved) VALUES ($1, 'x', 'Tesorería', TRUE) RETURNING id",
        )
        .bind(format!("{}@obra.mx", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();
        id
    }

    async fn seed_supplier(pool: &PgPool, name: &str) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as("INSERT INTO suppliers (company_name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_bank_account(pool: &PgPool, active: bool) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO bank_accounts (account_name, bank_name, status)
            VALUES ('Operación', 'BBVA', CASE WHEN $1 THEN 'active'::account_status ELSE 'inactive'::account_status END)
            RETURNING id
            "#,
        )
        .bind(active)
        .fetch_one(pool)
        .await
        .unwrap();
        id
    }

    async fn new_request(svc: &TreasuryService, user_id: Uuid, supplier_id: Uuid, amount: Decimal) -> Uuid {
        let input = NewMaterialRequest {
            material_requirement_id: None,
            supplier_id: Some(supplier_id),
            client_id: None,
            project_id: None,
            quantity: dec!(1),
            unit_cost: amount,
            notes: None,
        };
        svc.create_request(user_id, input).await.unwrap().id
    }

    async fn request_state(pool: &PgPool, id: Uuid) -> (MaterialRequestStatus, bool) {
        sqlx::query_as("SELECT status, is_attended FROM material_finance_requests WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn reference_lines(pool: &PgPool, reference_id: Uuid) -> Vec<TreasuryTransaction> {
        service(pool)
            .repo
            .list_reference_transactions(pool, reference_id)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn export_groups_by_supplier_and_processing_settles_every_line(pool: PgPool) {
        let svc = service(&pool);
        let user = seed_user(&pool).await;
        let supplier_a = seed_supplier(&pool, "Materiales del Norte").await;
        let supplier_b = seed_supplier(&pool, "Aceros Monterrey").await;

        let a1 = new_request(&svc, user, supplier_a, dec!(1500.00)).await;
        let b1 = new_request(&svc, user, supplier_b, dec!(800.00)).await;
        let a2 = new_request(&svc, user, supplier_a, dec!(2300.50)).await;
        let untouched = new_request(&svc, user, supplier_a, dec!(99.00)).await;

        let result = svc.export_to_treasury(user, &[a1, b1, a2]).await.unwrap();

        assert!(result.skipped.is_empty());
        assert_eq!(result.references.len(), 2);
        let ref_a = &result.references[0];
        let ref_b = &result.references[1];
        assert_eq!(ref_a.reference.supplier_id, supplier_a);
        assert_eq!(ref_a.reference.total_amount, dec!(3800.50));
        assert_eq!(ref_a.total_formatted, "$3,800.50");
        assert_eq!(ref_a.transactions.len(), 2);
        assert_eq!(ref_b.reference.total_amount, dec!(800.00));
        assert_eq!(ref_b.transactions.len(), 1);
        assert!(ref_a.reference.reference_code.starts_with("REF-"));
        assert_ne!(ref_a.reference.reference_code, ref_b.reference.reference_code);

        for id in [a1, b1, a2] {
            assert_eq!(request_state(&pool, id).await, (MaterialRequestStatus::ExportedToTreasury, false));
        }
        assert_eq!(request_state(&pool, untouched).await, (MaterialRequestStatus::Pending, false));

        for line in reference_lines(&pool, ref_a.reference.id).await {
            assert_eq!(line.status, TransactionStatus::PendingPayment);
            assert_eq!(line.account_id, None);
        }

        let account = seed_bank_account(&pool, true).await;
        let paid_on = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let instruction = PaymentInstruction {
            account_type: AccountType::Bank,
            account_id: account,
            payment_date: paid_on,
            note: None,
        };
        let processed = svc.process_reference(user, ref_a.reference.id, instruction).await.unwrap();

        assert_eq!(processed.reference.status, PaymentReferenceStatus::Processed);
        assert_eq!(processed.reference.account_id, Some(account));
        assert_eq!(processed.settled_transactions, 2);
        assert_eq!(processed.expense.amount, dec!(3800.50));

        let lines = reference_lines(&pool, ref_a.reference.id).await;
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.status, TransactionStatus::Completed);
            assert_eq!(line.account_type, Some(AccountType::Bank));
            assert_eq!(line.account_id, Some(account));
            assert_eq!(line.transaction_date, Some(paid_on));
        }
        assert_eq!(request_state(&pool, a1).await, (MaterialRequestStatus::ExportedToTreasury, true));
        assert_eq!(request_state(&pool, a2).await, (MaterialRequestStatus::ExportedToTreasury, true));

        // A outra referência continua aguardando pagamento
        for line in reference_lines(&pool, ref_b.reference.id).await {
            assert_eq!(line.status, TransactionStatus::PendingPayment);
        }
        assert_eq!(request_state(&pool, b1).await, (MaterialRequestStatus::ExportedToTreasury, false));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn reexport_is_refused_until_the_reference_is_cancelled(pool: PgPool) {
        let svc = service(&pool);
        let user = seed_user(&pool).await;
        let supplier = seed_supplier(&pool, "Cementos Apasco").await;
        let request = new_request(&svc, user, supplier, dec!(1200.00)).await;

        let first = svc.export_to_treasury(user, &[request]).await.unwrap();
        let reference = &first.references[0].reference;

        let again = svc.export_to_treasury(user, &[request]).await;
        assert!(matches!(again, Err(AppError::NothingToExport)));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM treasury_payment_references")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let cancelled = svc.cancel_reference(user, reference.id, Some("Proveedor sin existencias")).await.unwrap();
        assert_eq!(cancelled.status, PaymentReferenceStatus::Cancelled);
        assert_eq!(request_state(&pool, request).await, (MaterialRequestStatus::Pending, false));
        for line in reference_lines(&pool, reference.id).await {
            assert_eq!(line.status, TransactionStatus::Cancelled);
        }

        let second = svc.export_to_treasury(user, &[request]).await.unwrap();
        assert_eq!(second.references.len(), 1);
        assert_ne!(second.references[0].reference.reference_code, reference.reference_code);
        assert_eq!(second.references[0].reference.total_amount, dec!(1200.00));
        assert_eq!(request_state(&pool, request).await, (MaterialRequestStatus::ExportedToTreasury, false));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn processing_with_an_inactive_account_changes_nothing(pool: PgPool) {
        let svc = service(&pool);
        let user = seed_user(&pool).await;
        let supplier = seed_supplier(&pool, "Tubos y Conexiones").await;
        let request = new_request(&svc, user, supplier, dec!(450.00)).await;
        let export = svc.export_to_treasury(user, &[request]).await.unwrap();
        let reference_id = export.references[0].reference.id;

        let inactive = seed_bank_account(&pool, false).await;
        let instruction = PaymentInstruction {
            account_type: AccountType::Bank,
            account_id: inactive,
            payment_date: NaiveDate::from_ymd_opt(2025, 3, 21).unwrap(),
            note: None,
        };
        let err = svc.process_reference(user, reference_id, instruction).await.unwrap_err();
        assert!(matches!(err, AppError::InactiveAccount(id) if id == inactive));

        for line in reference_lines(&pool, reference_id).await {
            assert_eq!(line.status, TransactionStatus::PendingPayment);
        }
        assert_eq!(request_state(&pool, request).await, (MaterialRequestStatus::ExportedToTreasury, false));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn request_totals_are_checked_and_use_the_stored_unit_cost(pool: PgPool) {
        let svc = service(&pool);
        let user = seed_user(&pool).await;
        let supplier = seed_supplier(&pool, "Ferretería Central").await;

        let input = NewMaterialRequest {
            material_requirement_id: None,
            supplier_id: Some(supplier),
            client_id: None,
            project_id: None,
            quantity: dec!(3),
            unit_cost: dec!(0.333),
            notes: None,
        };
        let request = svc.create_request(user, input.clone()).await.unwrap();
        assert_eq!(request.unit_cost, dec!(0.33));
        assert_eq!(request.total_cost, dec!(0.99));

        let too_big = NewMaterialRequest { quantity: dec!(1000000), unit_cost: dec!(1000000000), ..input };
        let err = svc.create_request(user, too_big).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn funding_accounts_list_only_active_ones(pool: PgPool) {
        let svc = service(&pool);
        let user = seed_user(&pool).await;
        let active = seed_bank_account(&pool, true).await;
        seed_bank_account(&pool, false).await;
        sqlx::query("INSERT INTO cash_accounts (account_name, current_balance) VALUES ('Caja chica', 2500.00)")
            .execute(&pool)
            .await
            .unwrap();

        let accounts = svc.list_funding_accounts(user).await.unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, active);
        assert_eq!(accounts[0].name, "Operación");
        assert_eq!(accounts[1].account_type, AccountType::Cash);
        assert_eq!(accounts[1].current_balance_formatted, "$2,500.00");
    }
}
