// src/services/material_payment_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_as_user, error::AppError, money},
    db::{AccountRepository, MaterialPaymentRepository, TreasuryRepository},
    models::treasury::{
        AccountType, MaterialPaymentDetail, MaterialPaymentStatus, MaterialRequestStatus,
        NewTreasuryTransaction, TransactionStatus, TransactionType, TreasuryMaterialPayment,
        TreasuryMaterialPaymentItem, TreasuryTransaction, DEFAULT_CUENTA_MAYOR,
    },
};

#[derive(Debug, Clone)]
pub struct NewMaterialPaymentItem {
    pub material_request_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub description: String,
    pub partida: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMaterialPayment {
    #[serde(flatten)]
    pub payment: TreasuryMaterialPayment,
    pub transactions: Vec<TreasuryTransaction>,
}

#[derive(Clone)]
pub struct MaterialPaymentService {
    repo: MaterialPaymentRepository,
    treasury_repo: TreasuryRepository,
    account_repo: AccountRepository,
}

impl MaterialPaymentService {
    pub fn new(
        repo: MaterialPaymentRepository,
        treasury_repo: TreasuryRepository,
        account_repo: AccountRepository,
    ) -> Self {
        Self { repo, treasury_repo, account_repo }
    }

    pub async fn create_payment(
        &self,
        user_id: Uuid,
        supplier_id: Uuid,
        notes: Option<&str>,
        items: Vec<NewMaterialPaymentItem>,
    ) -> Result<MaterialPaymentDetail, AppError> {
        let total = payment_total(&items)?;

        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let number = self.treasury_repo.next_reference_number(&mut *tx).await?;
        let code = material_payment_code(Utc::now().date_naive(), number);

        let payment = self
            .repo
            .insert_payment(&mut *tx, &code, supplier_id, total, notes, user_id)
            .await?;

        let mut saved = Vec::with_capacity(items.len());
        for item in &items {
            let row = self
                .repo
                .insert_item(
                    &mut *tx,
                    payment.id,
                    item.material_request_id,
                    item.client_id,
                    item.project_id,
                    &item.description,
                    item.partida.as_deref(),
                    money::round_cents(item.amount),
                )
                .await?;
            saved.push(row);
        }

        tx.commit().await?;

        tracing::info!("🧾 Pagamento de materiais {} registrado ({})", payment.reference_code, money::format_mxn(total));
        Ok(MaterialPaymentDetail { payment, items: saved })
    }

    pub async fn list_payments(
        &self,
        user_id: Uuid,
        status: Option<MaterialPaymentStatus>,
    ) -> Result<Vec<TreasuryMaterialPayment>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;
        let payments = self.repo.list_payments(&mut *tx, status).await?;
        tx.commit().await?;
        Ok(payments)
    }

    /// Gera uma transação concluída por item e marca o pagamento como processado.
    /// Recusa itens cuja solicitação já foi exportada por referência de pagamento.
    pub async fn process_payment(
        &self,
        user_id: Uuid,
        payment_id: Uuid,
        account_type: AccountType,
        account_id: Uuid,
        payment_date: NaiveDate,
    ) -> Result<ProcessedMaterialPayment, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        let payment = self
            .repo
            .lock_payment(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("pago de materiales {}", payment_id)))?;

        if payment.status != MaterialPaymentStatus::Pending {
            return Err(AppError::InvalidStatusTransition {
                from: payment.status.as_str().into(),
                to: MaterialPaymentStatus::Processed.as_str().into(),
            });
        }

        self.account_repo.ensure_active(&mut *tx, account_type, account_id).await?;

        let items = self.repo.list_items(&mut *tx, payment_id).await?;
        let linked: Vec<Uuid> = items.iter().filter_map(|i| i.material_request_id).collect();

        if !linked.is_empty() {
            let statuses = self.repo.lock_linked_request_statuses(&mut *tx, &linked).await?;
            ensure_not_exported(&statuses)?;
        }

        let mut transactions = Vec::with_capacity(items.len());
        for draft in transaction_drafts(&payment, &items, account_type, account_id, payment_date) {
            transactions.push(self.treasury_repo.insert_transaction(&mut *tx, &draft, user_id).await?);
        }

        let payment = self
            .repo
            .mark_processed(&mut *tx, payment_id, account_type, account_id, payment_date)
            .await?;

        if !linked.is_empty() {
            self.treasury_repo.mark_requests_exported(&mut *tx, &linked, true).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "💸 Pagamento de materiais {} processado: {} transações",
            payment.reference_code,
            transactions.len()
        );
        Ok(ProcessedMaterialPayment { payment, transactions })
    }
}

// =========================================================================
//  Regras puras
// =========================================================================

pub fn payment_total(items: &[NewMaterialPaymentItem]) -> Result<Decimal, AppError> {
    money::checked_sum(items.iter().map(|i| i.amount))
        .ok_or_else(|| AppError::invalid_field("items", "El total del pago excede el máximo permitido."))
}

pub fn material_payment_code(date: NaiveDate, sequence: i64) -> String {
    format!("PAGMAT-{}-{:06}", date.format("%Y%m%d"), sequence)
}

/// Evita contar o mesmo material duas vezes contra o fornecedor.
pub fn ensure_not_exported(statuses: &[(Uuid, MaterialRequestStatus)]) -> Result<(), AppError> {
    let exported: Vec<Uuid> = statuses
        .iter()
        .filter(|(_, status)| *status == MaterialRequestStatus::ExportedToTreasury)
        .map(|(id, _)| *id)
        .collect();

    if exported.is_empty() { Ok(()) } else { Err(AppError::AlreadyExported(exported)) }
}

pub fn transaction_drafts(
    payment: &TreasuryMaterialPayment,
    items: &[TreasuryMaterialPaymentItem],
    account_type: AccountType,
    account_id: Uuid,
    payment_date: NaiveDate,
) -> Vec<NewTreasuryTransaction> {
    items
        .iter()
        .map(|item| NewTreasuryTransaction {
            transaction_type: TransactionType::Expense,
            status: TransactionStatus::Completed,
            account_type: Some(account_type),
            account_id: Some(account_id),
            client_id: item.client_id,
            project_id: item.project_id,
            supplier_id: Some(payment.supplier_id),
            material_request_id: item.material_request_id,
            payment_reference_id: None,
            material_payment_id: Some(payment.id),
            amount: item.amount,
            description: format!("{} ({})", item.description, payment.reference_code),
            cuenta_mayor: DEFAULT_CUENTA_MAYOR.to_string(),
            partida: item.partida.clone(),
            transaction_date: Some(payment_date),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment() -> TreasuryMaterialPayment {
        let now = Utc::now();
        TreasuryMaterialPayment {
            id: Uuid::new_v4(),
            reference_code: "PAGMAT-20250314-000007".into(),
            supplier_id: Uuid::new_v4(),
            total_amount: dec!(1250.00),
            status: MaterialPaymentStatus::Pending,
            account_type: None,
            account_id: None,
            notes: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(payment_id: Uuid, amount: Decimal) -> TreasuryMaterialPaymentItem {
        TreasuryMaterialPaymentItem {
            id: Uuid::new_v4(),
            payment_id,
            material_request_id: Some(Uuid::new_v4()),
            client_id: None,
            project_id: Some(Uuid::new_v4()),
            description: "Block 15x20".into(),
            partida: Some("Albañilería".into()),
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn one_completed_transaction_per_item() {
        let payment = payment();
        let items = vec![item(payment.id, dec!(1000.00)), item(payment.id, dec!(250.00))];
        let account = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 3, 21).unwrap();

        let drafts = transaction_drafts(&payment, &items, AccountType::Cash, account, date);

        assert_eq!(drafts.len(), 2);
        for draft in &drafts {
            assert_eq!(draft.status, TransactionStatus::Completed);
            assert_eq!(draft.account_id, Some(account));
            assert_eq!(draft.account_type, Some(AccountType::Cash));
            assert_eq!(draft.material_payment_id, Some(payment.id));
            assert_eq!(draft.payment_reference_id, None);
            assert_eq!(draft.transaction_date, Some(date));
        }
        let total: Decimal = drafts.iter().map(|d| d.amount).sum();
        assert_eq!(total, payment.total_amount);
        assert_eq!(drafts[0].description, "Block 15x20 (PAGMAT-20250314-000007)");
    }

    #[test]
    fn refuses_requests_already_exported_to_treasury() {
        let fresh = Uuid::new_v4();
        let exported = Uuid::new_v4();
        let statuses = vec![
            (fresh, MaterialRequestStatus::Pending),
            (exported, MaterialRequestStatus::ExportedToTreasury),
        ];

        match ensure_not_exported(&statuses) {
            Err(AppError::AlreadyExported(ids)) => assert_eq!(ids, vec![exported]),
            other => panic!("esperava AlreadyExported, veio {:?}", other),
        }
        assert!(ensure_not_exported(&statuses[..1]).is_ok());
    }

    fn new_items(amounts: &[Decimal]) -> Vec<NewMaterialPaymentItem> {
        amounts
            .iter()
            .map(|amount| NewMaterialPaymentItem {
                material_request_id: None,
                client_id: None,
                project_id: None,
                description: "Arena".into(),
                partida: None,
                amount: *amount,
            })
            .collect()
    }

    #[test]
    fn total_is_sum_of_rounded_items() {
        let items = new_items(&[dec!(100.005), dec!(0.10), dec!(0.20)]);
        assert_eq!(payment_total(&items).unwrap(), dec!(100.31));
    }

    #[test]
    fn total_beyond_the_column_is_a_validation_error() {
        let items = new_items(&[dec!(999999999999.99), dec!(999999999999.99)]);
        match payment_total(&items) {
            Err(AppError::ValidationError(errors)) => assert!(errors.field_errors().contains_key("items")),
            other => panic!("esperava ValidationError, veio {:?}", other),
        }
    }

    #[test]
    fn code_uses_its_own_prefix() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(material_payment_code(date, 7), "PAGMAT-20250102-000007");
    }
}
