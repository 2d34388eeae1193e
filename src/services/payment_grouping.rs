// src/services/payment_grouping.rs
//
// Regras puras do fluxo solicitação -> referência -> transações.
// Nada aqui toca o banco: o TreasuryService carrega os dados, pede o plano
// e aplica o plano dentro de uma única transação.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::treasury::{
        AccountType, NewExpense, NewTreasuryTransaction, PaymentReference, PaymentReferenceStatus,
        ResolvedMaterialRequest, TransactionStatus, TransactionType, DEFAULT_CUENTA_MAYOR,
    },
};

pub const EXPENSE_CATEGORY_MATERIALS: &str = "materiales";

// =========================================================================
//  EXPORTAÇÃO (agrupamento por fornecedor)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    MissingSupplier,
    AlreadyExported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRequest {
    pub material_request_id: Uuid,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct SupplierGroup {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub total_amount: Decimal,
    pub members: Vec<ResolvedMaterialRequest>,
}

impl SupplierGroup {
    pub fn request_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.request.id).collect()
    }

    /// Uma transação por material: despesa, aguardando pagamento, sem conta.
    pub fn transaction_drafts(&self, payment_reference_id: Uuid) -> Vec<NewTreasuryTransaction> {
        self.members
            .iter()
            .map(|member| NewTreasuryTransaction {
                transaction_type: TransactionType::Expense,
                status: TransactionStatus::PendingPayment,
                account_type: None,
                account_id: None,
                client_id: member.request.client_id,
                project_id: member.request.project_id,
                supplier_id: Some(self.supplier_id),
                material_request_id: Some(member.request.id),
                payment_reference_id: Some(payment_reference_id),
                material_payment_id: None,
                amount: member.request.total_cost,
                description: format!("Pago de material: {}", member.material_name),
                cuenta_mayor: DEFAULT_CUENTA_MAYOR.to_string(),
                partida: member.partida.clone(),
                transaction_date: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportPlan {
    pub groups: Vec<SupplierGroup>,
    pub skipped: Vec<SkippedRequest>,
}

impl ExportPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn grouped_request_ids(&self) -> Vec<Uuid> {
        self.groups.iter().flat_map(|g| g.request_ids()).collect()
    }
}

/// Particiona a seleção por fornecedor, na ordem em que cada fornecedor aparece.
///
/// `loaded` são as solicitações encontradas para `selected_ids`. Solicitações
/// inexistentes, sem fornecedor ou já exportadas vão para `skipped` e nunca
/// geram referência, o que torna a reexportação inofensiva.
pub fn plan_export(selected_ids: &[Uuid], loaded: Vec<ResolvedMaterialRequest>) -> ExportPlan {
    let mut by_id: HashMap<Uuid, ResolvedMaterialRequest> =
        loaded.into_iter().map(|r| (r.request.id, r)).collect();

    let mut plan = ExportPlan::default();
    let mut group_index: HashMap<Uuid, usize> = HashMap::new();
    let mut seen: HashSet<Uuid> = HashSet::new();

    for id in selected_ids {
        if !seen.insert(*id) {
            continue;
        }

        let Some(request) = by_id.remove(id) else {
            plan.skipped.push(SkippedRequest { material_request_id: *id, reason: SkipReason::NotFound });
            continue;
        };

        if !request.request.status.is_exportable() {
            plan.skipped.push(SkippedRequest {
                material_request_id: *id,
                reason: SkipReason::AlreadyExported,
            });
            continue;
        }

        let Some(supplier_id) = request.request.supplier_id else {
            plan.skipped.push(SkippedRequest {
                material_request_id: *id,
                reason: SkipReason::MissingSupplier,
            });
            continue;
        };

        let idx = *group_index.entry(supplier_id).or_insert_with(|| {
            plan.groups.push(SupplierGroup {
                supplier_id,
                supplier_name: request.supplier_name.clone(),
                total_amount: Decimal::ZERO,
                members: Vec::new(),
            });
            plan.groups.len() - 1
        });

        let group = &mut plan.groups[idx];
        group.total_amount += request.request.total_cost;
        group.members.push(request);
    }

    plan
}

/// Código da referência: REF-AAAAMMDD-NNNNNN (número vem da sequence do banco).
pub fn reference_code(date: NaiveDate, sequence: i64) -> String {
    format!("REF-{}-{:06}", date.format("%Y%m%d"), sequence)
}

// =========================================================================
//  PROCESSAMENTO (conciliação contra banco/caixa)
// =========================================================================

#[derive(Debug, Clone)]
pub struct PaymentInstruction {
    pub account_type: AccountType,
    pub account_id: Uuid,
    pub payment_date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingPlan {
    pub status: PaymentReferenceStatus,
    pub account_type: AccountType,
    pub account_id: Uuid,
    pub notes: Option<String>,
    pub payment_date: NaiveDate,
    pub transaction_status: TransactionStatus,
    pub expense: NewExpense,
}

pub fn plan_processing(
    reference: &PaymentReference,
    instruction: &PaymentInstruction,
) -> Result<ProcessingPlan, AppError> {
    let status = reference.status.transition_to(PaymentReferenceStatus::Processed)?;

    let expense = NewExpense {
        description: format!("Pago a proveedor - referencia {}", reference.reference_code),
        amount: reference.total_amount,
        category: EXPENSE_CATEGORY_MATERIALS.to_string(),
        supplier_id: Some(reference.supplier_id),
        payment_reference_id: Some(reference.id),
        payment_method: instruction.account_type.payment_method().to_string(),
        expense_date: instruction.payment_date,
    };

    Ok(ProcessingPlan {
        status,
        account_type: instruction.account_type,
        account_id: instruction.account_id,
        notes: append_note(reference.notes.as_deref(), instruction.note.as_deref()),
        payment_date: instruction.payment_date,
        transaction_status: status.transaction_status(),
        expense,
    })
}

// =========================================================================
//  CANCELAMENTO
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CancellationPlan {
    pub status: PaymentReferenceStatus,
    pub notes: Option<String>,
    pub transaction_status: TransactionStatus,
}

pub fn plan_cancellation(
    reference: &PaymentReference,
    reason: Option<&str>,
) -> Result<CancellationPlan, AppError> {
    let status = reference.status.transition_to(PaymentReferenceStatus::Cancelled)?;
    let reason = reason.map(|r| format!("Cancelada: {}", r.trim()));

    Ok(CancellationPlan {
        status,
        notes: append_note(reference.notes.as_deref(), reason.as_deref()),
        transaction_status: status.transaction_status(),
    })
}

/// Acrescenta uma nota em nova linha. Notas vazias são ignoradas.
pub fn append_note(existing: Option<&str>, note: Option<&str>) -> Option<String> {
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let existing = existing.filter(|e| !e.trim().is_empty());

    match (existing, note) {
        (Some(e), Some(n)) => Some(format!("{}\n{}", e, n)),
        (Some(e), None) => Some(e.to_string()),
        (None, Some(n)) => Some(n.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::treasury::{MaterialFinanceRequest, MaterialRequestStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request(
        supplier: Option<(Uuid, &str)>,
        total_cost: Decimal,
        status: MaterialRequestStatus,
    ) -> ResolvedMaterialRequest {
        let now = Utc::now();
        ResolvedMaterialRequest {
            request: MaterialFinanceRequest {
                id: Uuid::new_v4(),
                material_requirement_id: Some(Uuid::new_v4()),
                supplier_id: supplier.map(|(id, _)| id),
                client_id: Some(Uuid::new_v4()),
                project_id: Some(Uuid::new_v4()),
                quantity: dec!(1),
                unit_cost: total_cost,
                total_cost,
                status,
                is_attended: false,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            supplier_name: supplier.map(|(_, n)| n.to_string()).unwrap_or_else(|| "Sin proveedor".into()),
            client_name: "Cliente".into(),
            project_name: "Casa Lomas".into(),
            material_name: "Varilla 3/8".into(),
            unit: Some("pza".into()),
            partida: Some("Estructura".into()),
        }
    }

    fn ids(requests: &[ResolvedMaterialRequest]) -> Vec<Uuid> {
        requests.iter().map(|r| r.request.id).collect()
    }

    fn pending_reference(total: Decimal, notes: Option<&str>) -> PaymentReference {
        let now = Utc::now();
        PaymentReference {
            id: Uuid::new_v4(),
            reference_code: "REF-20250314-000001".into(),
            supplier_id: Uuid::new_v4(),
            total_amount: total,
            account_type: None,
            account_id: None,
            status: PaymentReferenceStatus::Pending,
            notes: notes.map(String::from),
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn groups_two_suppliers_with_exact_totals() {
        let a = (Uuid::new_v4(), "Aceros Monterrey");
        let b = (Uuid::new_v4(), "Cementos del Bajío");
        let selection = vec![
            request(Some(a), dec!(1500.00), MaterialRequestStatus::Pending),
            request(Some(b), dec!(800.00), MaterialRequestStatus::Pending),
            request(Some(a), dec!(2300.50), MaterialRequestStatus::Pending),
        ];

        let plan = plan_export(&ids(&selection), selection);

        assert_eq!(plan.groups.len(), 2);
        assert!(plan.skipped.is_empty());

        let group_a = &plan.groups[0];
        assert_eq!(group_a.supplier_id, a.0);
        assert_eq!(group_a.supplier_name, "Aceros Monterrey");
        assert_eq!(group_a.total_amount, dec!(3800.50));
        assert_eq!(group_a.members.len(), 2);

        let group_b = &plan.groups[1];
        assert_eq!(group_b.supplier_id, b.0);
        assert_eq!(group_b.total_amount, dec!(800.00));
        assert_eq!(group_b.members.len(), 1);
    }

    #[test]
    fn one_reference_per_distinct_supplier_and_totals_match_lines() {
        let suppliers: Vec<(Uuid, &str)> = (0..4).map(|_| (Uuid::new_v4(), "Proveedor")).collect();
        let costs = [dec!(0.10), dec!(0.20), dec!(1999.99), dec!(0.01), dec!(350.35), dec!(12.5), dec!(7)];
        let selection: Vec<_> = costs
            .iter()
            .enumerate()
            .map(|(i, c)| request(Some(suppliers[i % 3]), *c, MaterialRequestStatus::Pending))
            .collect();

        let plan = plan_export(&ids(&selection), selection);

        assert_eq!(plan.groups.len(), 3);
        for group in &plan.groups {
            let drafts = group.transaction_drafts(Uuid::new_v4());
            let lines_total: Decimal = drafts.iter().map(|d| d.amount).sum();
            assert_eq!(group.total_amount, lines_total);
            assert_eq!(drafts.len(), group.members.len());
        }
        let grand_total: Decimal = plan.groups.iter().map(|g| g.total_amount).sum();
        assert_eq!(grand_total, dec!(2370.15));
    }

    #[test]
    fn transaction_drafts_start_pending_without_account() {
        let supplier = (Uuid::new_v4(), "Aceros Monterrey");
        let selection = vec![request(Some(supplier), dec!(1500.00), MaterialRequestStatus::Pending)];
        let member_id = selection[0].request.id;
        let plan = plan_export(&ids(&selection), selection);
        let reference_id = Uuid::new_v4();

        let drafts = plan.groups[0].transaction_drafts(reference_id);

        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.transaction_type, TransactionType::Expense);
        assert_eq!(draft.status, TransactionStatus::PendingPayment);
        assert_eq!(draft.cuenta_mayor, "5110");
        assert_eq!(draft.account_id, None);
        assert_eq!(draft.account_type, None);
        assert_eq!(draft.payment_reference_id, Some(reference_id));
        assert_eq!(draft.material_request_id, Some(member_id));
        assert_eq!(draft.supplier_id, Some(supplier.0));
        assert_eq!(draft.partida.as_deref(), Some("Estructura"));
        assert_eq!(draft.description, "Pago de material: Varilla 3/8");
    }

    #[test]
    fn only_grouped_requests_are_marked_for_export() {
        let supplier = (Uuid::new_v4(), "Aceros Monterrey");
        let grouped = request(Some(supplier), dec!(100), MaterialRequestStatus::Pending);
        let no_supplier = request(None, dec!(50), MaterialRequestStatus::Pending);
        let not_attended = request(Some(supplier), dec!(25), MaterialRequestStatus::NotAttended);
        let selection = vec![grouped.clone(), no_supplier.clone(), not_attended.clone()];

        let plan = plan_export(&ids(&selection), selection);

        let marked = plan.grouped_request_ids();
        assert_eq!(marked, vec![grouped.request.id, not_attended.request.id]);
        assert!(!marked.contains(&no_supplier.request.id));
        assert_eq!(
            plan.skipped,
            vec![SkippedRequest {
                material_request_id: no_supplier.request.id,
                reason: SkipReason::MissingSupplier,
            }]
        );
    }

    #[test]
    fn re_exporting_an_exported_request_creates_no_reference() {
        let supplier = (Uuid::new_v4(), "Aceros Monterrey");
        let exported = request(Some(supplier), dec!(1500.00), MaterialRequestStatus::ExportedToTreasury);
        let selection = vec![exported.clone()];

        let plan = plan_export(&ids(&selection), selection);

        assert!(plan.is_empty());
        assert_eq!(plan.skipped[0].reason, SkipReason::AlreadyExported);
        assert_eq!(plan.skipped[0].material_request_id, exported.request.id);
    }

    #[test]
    fn unknown_and_duplicated_ids_are_handled() {
        let supplier = (Uuid::new_v4(), "Aceros Monterrey");
        let req = request(Some(supplier), dec!(10), MaterialRequestStatus::Pending);
        let missing = Uuid::new_v4();
        let selected = vec![req.request.id, missing, req.request.id];

        let plan = plan_export(&selected, vec![req]);

        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].members.len(), 1);
        assert_eq!(plan.groups[0].total_amount, dec!(10));
        assert_eq!(
            plan.skipped,
            vec![SkippedRequest { material_request_id: missing, reason: SkipReason::NotFound }]
        );
    }

    #[test]
    fn reference_code_is_date_plus_padded_sequence() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(reference_code(date, 42), "REF-20250314-000042");
    }

    #[test]
    fn processing_completes_transactions_on_the_chosen_account() {
        let reference = pending_reference(dec!(3800.50), Some("Factura A-123"));
        let account_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let instruction = PaymentInstruction {
            account_type: AccountType::Bank,
            account_id,
            payment_date: date,
            note: Some("  Transferencia SPEI  ".into()),
        };

        let plan = plan_processing(&reference, &instruction).unwrap();

        assert_eq!(plan.status, PaymentReferenceStatus::Processed);
        assert_eq!(plan.transaction_status, TransactionStatus::Completed);
        assert_eq!(plan.account_id, account_id);
        assert_eq!(plan.payment_date, date);
        assert_eq!(plan.notes.as_deref(), Some("Factura A-123\nTransferencia SPEI"));
        assert_eq!(plan.expense.amount, dec!(3800.50));
        assert_eq!(plan.expense.payment_method, "transferencia");
        assert_eq!(plan.expense.payment_reference_id, Some(reference.id));
        assert_eq!(plan.expense.expense_date, date);
    }

    #[test]
    fn processed_reference_cannot_be_processed_again() {
        let mut reference = pending_reference(dec!(800), None);
        reference.status = PaymentReferenceStatus::Processed;
        let instruction = PaymentInstruction {
            account_type: AccountType::Cash,
            account_id: Uuid::new_v4(),
            payment_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            note: None,
        };

        assert!(matches!(
            plan_processing(&reference, &instruction),
            Err(AppError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn cancellation_appends_reason_and_cancels_lines() {
        let reference = pending_reference(dec!(800), None);

        let plan = plan_cancellation(&reference, Some(" proveedor sin existencia ")).unwrap();

        assert_eq!(plan.status, PaymentReferenceStatus::Cancelled);
        assert_eq!(plan.transaction_status, TransactionStatus::Cancelled);
        assert_eq!(plan.notes.as_deref(), Some("Cancelada: proveedor sin existencia"));
    }

    #[test]
    fn append_note_ignores_blank_values() {
        assert_eq!(append_note(None, None), None);
        assert_eq!(append_note(Some("a"), Some("   ")), Some("a".into()));
        assert_eq!(append_note(Some(" "), Some("b")), Some("b".into()));
    }
}
