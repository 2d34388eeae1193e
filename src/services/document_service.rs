// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_as_user, error::AppError, money},
    db::{AccountRepository, TreasuryRepository},
    models::treasury::{AccountType, PaymentReferenceListItem, PaymentReferenceStatus, VoucherLine},
};

const FONT_FAMILY: &str = "Roboto";

#[derive(Clone)]
pub struct DocumentService {
    repo: TreasuryRepository,
    account_repo: AccountRepository,
    fonts_dir: String,
    company_name: String,
}

// Tudo o que vai impresso no comprovante
struct VoucherData {
    item: PaymentReferenceListItem,
    account: Option<String>,
    lines: Vec<VoucherLine>,
}

impl DocumentService {
    pub fn new(
        repo: TreasuryRepository,
        account_repo: AccountRepository,
        fonts_dir: String,
        company_name: String,
    ) -> Self {
        Self { repo, account_repo, fonts_dir, company_name }
    }

    /// Comprovante em PDF de uma referência de pagamento.
    pub async fn generate_voucher_pdf(&self, user_id: Uuid, reference_id: Uuid) -> Result<Vec<u8>, AppError> {
        let mut tx = begin_as_user(self.repo.pool(), user_id).await?;

        // 1. Busca os dados
        let item = self
            .repo
            .find_reference_item(&mut *tx, reference_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("referencia {}", reference_id)))?;

        let account = match (item.reference.account_type, item.reference.account_id) {
            (Some(kind), Some(id)) => self
                .account_repo
                .find_label(&mut *tx, kind, id)
                .await?
                .map(|label| format!("{} ({})", label, account_kind_label(kind))),
            _ => None,
        };

        let lines = self.repo.list_voucher_lines(&mut *tx, reference_id).await?;

        tx.commit().await?;

        // 2. Monta o PDF
        let data = VoucherData { item, account, lines };
        let pdf = self.render(&data)?;

        tracing::info!("📄 Comprovante {} gerado ({} bytes)", data.item.reference.reference_code, pdf.len());
        Ok(pdf)
    }

    fn render(&self, data: &VoucherData) -> Result<Vec<u8>, AppError> {
        let reference = &data.item.reference;

        let font_family = genpdf::fonts::from_files(&self.fonts_dir, FONT_FAMILY, None)
            .map_err(|_| AppError::FontNotFound(format!("{}/{}-*.ttf", self.fonts_dir, FONT_FAMILY)))?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Referencia {}", reference.reference_code));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(
            elements::Paragraph::new(self.company_name.clone())
                .styled(style::Style::new().bold().with_font_size(18)),
        );
        doc.push(elements::Break::new(1.5));
        doc.push(
            elements::Paragraph::new(format!("COMPROBANTE DE PAGO {}", reference.reference_code))
                .styled(style::Style::new().bold().with_font_size(14)),
        );
        doc.push(elements::Paragraph::new(format!("Proveedor: {}", data.item.supplier_name)));
        doc.push(elements::Paragraph::new(format!("Estado: {}", status_label(reference.status))));
        doc.push(elements::Paragraph::new(format!(
            "Fecha de emisión: {}",
            reference.created_at.format("%d/%m/%Y")
        )));
        if let Some(date) = reference.processed_at {
            doc.push(elements::Paragraph::new(format!("Fecha de pago: {}", date.format("%d/%m/%Y"))));
        }
        doc.push(elements::Paragraph::new(format!(
            "Cuenta: {}",
            data.account.as_deref().unwrap_or("Sin asignar")
        )));
        if let Some(notes) = reference.notes.as_deref() {
            doc.push(elements::Paragraph::new(format!("Notas: {}", notes)).styled(style::Style::new().italic()));
        }

        doc.push(elements::Break::new(2));

        // --- TABELA DE LINHAS ---
        // Pesos: Descrição (4), Partida (2), Cliente/Obra (3), Importe (2)
        let mut table = elements::TableLayout::new(vec![4, 2, 3, 2]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        let style_bold = style::Style::new().bold();
        table
            .row()
            .element(elements::Paragraph::new("Concepto").styled(style_bold))
            .element(elements::Paragraph::new("Partida").styled(style_bold))
            .element(elements::Paragraph::new("Cliente / Obra").styled(style_bold))
            .element(elements::Paragraph::new("Importe").styled(style_bold))
            .push()
            .map_err(pdf_error)?;

        for line in &data.lines {
            table
                .row()
                .element(elements::Paragraph::new(line.description.clone()))
                .element(elements::Paragraph::new(line.partida.clone().unwrap_or_else(|| "-".into())))
                .element(elements::Paragraph::new(format!("{} / {}", line.client_name, line.project_name)))
                .element(elements::Paragraph::new(money::format_mxn(line.amount)))
                .push()
                .map_err(pdf_error)?;
        }

        doc.push(table);
        doc.push(elements::Break::new(2));

        // --- TOTAL ---
        let mut total_paragraph =
            elements::Paragraph::new(format!("TOTAL: {} MXN", money::format_mxn(reference.total_amount)));
        total_paragraph.set_alignment(genpdf::Alignment::Right);
        doc.push(total_paragraph.styled(style::Style::new().bold().with_font_size(12)));

        doc.push(elements::Break::new(2));

        // --- QR CODE ---
        let qr = qr_image(&qr_payload(&reference.reference_code, reference.total_amount))?;
        let pdf_image = elements::Image::from_dynamic_image(qr)
            .map_err(pdf_error)?
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(pdf_image);

        // 3. Renderiza em memória
        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(pdf_error)?;

        Ok(buffer)
    }
}

fn pdf_error(e: genpdf::error::Error) -> AppError {
    AppError::InternalServerError(anyhow::Error::msg(e.to_string()))
}

/// Conteúdo do QR: código da referência e total, para conferência rápida.
pub fn qr_payload(reference_code: &str, total: Decimal) -> String {
    format!("{}|{}", reference_code, money::format_mxn(total))
}

pub fn qr_image(payload: &str) -> Result<image::DynamicImage, AppError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
    let buffer = code.render::<Luma<u8>>().build();
    Ok(image::DynamicImage::ImageLuma8(buffer))
}

pub fn status_label(status: PaymentReferenceStatus) -> &'static str {
    match status {
        PaymentReferenceStatus::Pending => "Pendiente",
        PaymentReferenceStatus::Processed => "Pagada",
        PaymentReferenceStatus::Cancelled => "Cancelada",
    }
}

fn account_kind_label(kind: AccountType) -> &'static str {
    match kind {
        AccountType::Bank => "banco",
        AccountType::Cash => "caja",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn qr_carries_code_and_formatted_total() {
        assert_eq!(qr_payload("REF-20250314-000042", dec!(3800.5)), "REF-20250314-000042|$3,800.50");
    }

    #[test]
    fn qr_renders_square_image() {
        let image = qr_image("REF-20250314-000042|$3,800.50").unwrap();
        let luma = image.to_luma8();
        assert!(luma.width() > 0);
        assert_eq!(luma.width(), luma.height());
    }

    #[test]
    fn status_labels_are_spanish() {
        assert_eq!(status_label(PaymentReferenceStatus::Pending), "Pendiente");
        assert_eq!(status_label(PaymentReferenceStatus::Processed), "Pagada");
        assert_eq!(status_label(PaymentReferenceStatus::Cancelled), "Cancelada");
    }
}
