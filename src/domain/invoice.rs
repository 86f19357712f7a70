use crate::domain::cipher::EnvelopeCipher;
use crate::error::{GatewayError, Result};
use chrono::{Datelike, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Format of an invoice issue timestamp, e.g. `2023-08-15 10:00:00`.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of each QR code text field on the printed invoice, counted in
/// UTF-16 code units as the provider's reference encoder counts it.
pub const QR_TEXT_WIDTH: usize = 180;

/// Offset between the Gregorian calendar and the Minguo calendar used on
/// Taiwanese invoices.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Divisor turning a tax-inclusive price into its tax-free part (5% VAT).
const TAX_DIVISOR: Decimal = Decimal::from_parts(105, 0, 0, false, 2);

const DEFAULT_UNIT: &str = "式";

/// A single invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub name: String,
    /// Tax-inclusive price per unit, in whole currency units.
    pub unit_price: i64,
    pub quantity: i64,
    pub unit: Option<String>,
}

impl InvoiceItem {
    pub fn new(name: impl Into<String>, unit_price: i64, quantity: i64) -> Self {
        Self {
            name: name.into(),
            unit_price,
            quantity,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Line total, `unit_price * quantity`.
    pub fn amount(&self) -> Result<i64> {
        self.unit_price
            .checked_mul(self.quantity)
            .ok_or_else(|| amount_overflow(&self.name))
    }

    pub fn unit_label(&self) -> &str {
        self.unit.as_deref().unwrap_or(DEFAULT_UNIT)
    }

    fn tax_free_unit_price(&self) -> i64 {
        (Decimal::from(self.unit_price) / TAX_DIVISOR)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(self.unit_price)
    }

    fn tax_free_amount(&self) -> Result<i64> {
        self.tax_free_unit_price()
            .checked_mul(self.quantity)
            .ok_or_else(|| amount_overflow(&self.name))
    }

    fn qr_segment(&self) -> String {
        format!("{}:{}:{}", self.name, self.quantity, self.unit_price)
    }
}

fn amount_overflow(name: &str) -> GatewayError {
    GatewayError::InvalidPayload(format!("amount of item {name} overflows"))
}

fn checked_total(amounts: impl Iterator<Item = Result<i64>>) -> Result<i64> {
    let mut total: i64 = 0;
    for amount in amounts {
        let Some(sum) = total.checked_add(amount?) else {
            let message = "invoice total overflows".to_string();
            return Err(GatewayError::InvalidPayload(message));
        };
        total = sum;
    }
    Ok(total)
}

/// Gross total of a set of lines.
pub fn total_amount(items: &[InvoiceItem]) -> Result<i64> {
    checked_total(items.iter().map(InvoiceItem::amount))
}

/// Fields needed to construct an [`Invoice`].
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub number: String,
    pub prefix: String,
    pub random_code: String,
    pub created_at: NaiveDateTime,
    pub buyer_tax_id: Option<String>,
    pub seller_tax_id: String,
    pub items: Vec<InvoiceItem>,
}

/// An issued invoice as printed for the customer.
///
/// Immutable once built; totals and printable texts are derived from the
/// stored fields on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    number: String,
    prefix: String,
    random_code: String,
    created_at: NaiveDateTime,
    buyer_tax_id: Option<String>,
    seller_tax_id: String,
    items: Vec<InvoiceItem>,
}

impl Invoice {
    pub fn new(draft: InvoiceDraft) -> Self {
        Self {
            number: draft.number,
            prefix: draft.prefix.to_uppercase(),
            random_code: draft.random_code,
            created_at: draft.created_at,
            buyer_tax_id: draft.buyer_tax_id.filter(|id| !id.is_empty()),
            seller_tax_id: draft.seller_tax_id,
            items: draft.items,
        }
    }

    /// Parses an issue timestamp in [`CREATED_AT_FORMAT`].
    pub fn parse_created_at(value: &str) -> Result<NaiveDateTime> {
        match NaiveDateTime::parse_from_str(value, CREATED_AT_FORMAT) {
            Ok(created_at) => Ok(created_at),
            Err(e) => {
                let message = format!("invalid invoice date {value}: {e}");
                Err(GatewayError::InvalidPayload(message))
            }
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn random_code(&self) -> &str {
        &self.random_code
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn buyer_tax_id(&self) -> Option<&str> {
        self.buyer_tax_id.as_deref()
    }

    pub fn seller_tax_id(&self) -> &str {
        &self.seller_tax_id
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn invoice_number(&self) -> String {
        format!("{}-{}", self.prefix, self.number)
    }

    pub fn total_tax_free_price(&self) -> Result<i64> {
        checked_total(self.items.iter().map(InvoiceItem::tax_free_amount))
    }

    pub fn total_price(&self) -> Result<i64> {
        total_amount(&self.items)
    }

    fn roc_year(&self) -> i32 {
        self.created_at.year() - ROC_YEAR_OFFSET
    }

    /// The two-month billing period containing the issue date, as `(start, end)`.
    fn billing_months(&self) -> (u32, u32) {
        let end = self.created_at.month().div_ceil(2) * 2;
        (end - 1, end)
    }

    /// Billing-period label such as `112年07-08月`.
    pub fn billing_period_label(&self) -> String {
        let (start, end) = self.billing_months();
        format!("{}年{start:02}-{end:02}月", self.roc_year())
    }

    /// One-dimensional barcode text: period, then invoice number, then random code.
    pub fn barcode_text(&self) -> String {
        let (_, end) = self.billing_months();
        format!(
            "{}{end:02}{}{}{}",
            self.roc_year(),
            self.prefix,
            self.number,
            self.random_code
        )
    }

    /// Left QR code text.
    ///
    /// `qr_cipher` is the seller's QR AES key, which encrypts the
    /// verification token embedded in the text.
    pub fn first_qr_text(&self, qr_cipher: &EnvelopeCipher) -> Result<String> {
        let plain_token = format!("{}{}{}", self.prefix, self.number, self.random_code);
        let token = qr_cipher.encrypt_text(&plain_token);
        let tax_free = self.total_tax_free_price()?;
        let total = self.total_price()?;
        let listed = self
            .items
            .iter()
            .take(2)
            .map(InvoiceItem::qr_segment)
            .collect::<Vec<_>>()
            .join(":");

        let text = format!(
            "{prefix}{number}{year}{month_day}{random}{tax_free:08}{total:08}{buyer}{seller}{token}:**********:{count}:{reserved}:1:{listed}",
            prefix = self.prefix,
            number = self.number,
            year = self.roc_year(),
            month_day = self.created_at.format("%m%d"),
            random = self.random_code,
            buyer = self.buyer_tax_id.as_deref().unwrap_or("00000000"),
            seller = self.seller_tax_id,
            count = self.items.len(),
            reserved = self.items.len().max(2),
        );
        pad_qr_text(text)
    }

    /// Right QR code text, carrying the lines that did not fit the left one.
    pub fn second_qr_text(&self) -> Result<String> {
        let rest = self
            .items
            .iter()
            .skip(2)
            .map(InvoiceItem::qr_segment)
            .collect::<Vec<_>>()
            .join(":");
        pad_qr_text(format!("**{rest}"))
    }
}

fn pad_qr_text(mut text: String) -> Result<String> {
    let len = text.encode_utf16().count();
    if len > QR_TEXT_WIDTH {
        return Err(GatewayError::QrTextOverflow { len });
    }
    text.extend(std::iter::repeat_n(' ', QR_TEXT_WIDTH - len));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QR_KEY: &str = "INVOICE_HASH_KEY";
    const QR_IV: &str = "INVOICE_HASH_IV_";

    fn qr_cipher() -> EnvelopeCipher {
        EnvelopeCipher::new(QR_KEY, QR_IV).unwrap()
    }

    fn invoice_at(created_at: &str, items: Vec<InvoiceItem>) -> Invoice {
        Invoice::new(InvoiceDraft {
            number: "12345678".to_string(),
            prefix: "ab".to_string(),
            random_code: "1234".to_string(),
            created_at: Invoice::parse_created_at(created_at).unwrap(),
            buyer_tax_id: None,
            seller_tax_id: "24549210".to_string(),
            items,
        })
    }

    fn sample_items() -> Vec<InvoiceItem> {
        vec![
            InvoiceItem::new("咖啡", 100, 2),
            InvoiceItem::new("蛋糕", 55, 1),
            InvoiceItem::new("餅乾", 30, 3),
        ]
    }

    #[test]
    fn test_prefix_is_uppercased() {
        let invoice = invoice_at("2023-08-15 10:00:00", vec![]);
        assert_eq!(invoice.prefix(), "AB");
        assert_eq!(invoice.invoice_number(), "AB-12345678");
    }

    #[test]
    fn test_totals_are_derived_from_items() {
        let invoice = invoice_at("2023-08-15 10:00:00", sample_items());
        assert_eq!(invoice.total_price().unwrap(), 345);
        // 95 * 2 + 52 + 29 * 3
        assert_eq!(invoice.total_tax_free_price().unwrap(), 329);
    }

    #[test]
    fn test_amount_overflow_is_rejected() {
        let item = InvoiceItem::new("x", i64::MAX / 2 + 1, 2);
        assert!(matches!(
            item.amount(),
            Err(GatewayError::InvalidPayload(_))
        ));

        let items = vec![
            InvoiceItem::new("a", i64::MAX, 1),
            InvoiceItem::new("b", 1, 1),
        ];
        assert!(matches!(
            total_amount(&items),
            Err(GatewayError::InvalidPayload(_))
        ));

        let invoice = invoice_at("2023-08-15 10:00:00", items);
        assert!(matches!(
            invoice.first_qr_text(&qr_cipher()),
            Err(GatewayError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_tax_free_total_overflow_is_rejected() {
        let items = vec![InvoiceItem::new("x", i64::MAX, 2)];
        let invoice = invoice_at("2023-08-15 10:00:00", items);
        assert!(matches!(
            invoice.total_tax_free_price(),
            Err(GatewayError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_tax_free_unit_price_rounds_to_nearest() {
        assert_eq!(InvoiceItem::new("x", 21, 1).tax_free_unit_price(), 20);
        assert_eq!(InvoiceItem::new("x", 55, 1).tax_free_unit_price(), 52);
        assert_eq!(InvoiceItem::new("x", 30, 1).tax_free_unit_price(), 29);
    }

    #[test]
    fn test_billing_period_label() {
        let label = |created_at| invoice_at(created_at, vec![]).billing_period_label();
        assert_eq!(label("2023-07-01 00:00:00"), "112年07-08月");
        assert_eq!(label("2023-08-31 23:59:59"), "112年07-08月");
        assert_eq!(label("2024-01-10 08:00:00"), "113年01-02月");
        assert_eq!(label("2024-12-10 08:00:00"), "113年11-12月");
    }

    #[test]
    fn test_billing_period_end_is_always_even() {
        for month in 1..=12 {
            let invoice = invoice_at(&format!("2023-{month:02}-15 12:00:00"), vec![]);
            let (start, end) = invoice.billing_months();
            assert_eq!(end % 2, 0);
            assert_eq!(start, end - 1);
            assert!(start <= month && month <= end);
        }
    }

    #[test]
    fn test_barcode_text() {
        let invoice = invoice_at("2023-08-15 10:00:00", sample_items());
        assert_eq!(invoice.barcode_text(), "11208AB123456781234");
    }

    #[test]
    fn test_first_qr_text_layout() {
        let invoice = invoice_at("2023-08-15 10:00:00", sample_items());
        let text = invoice.first_qr_text(&qr_cipher()).unwrap();

        let expected = "AB123456781120815123400000329000003450000000024549210sykPSNlgrCluvltATp7Z2g==:**********:3:3:1:咖啡:2:100:蛋糕:1:55";
        assert!(text.starts_with(expected));
        assert_eq!(text.chars().count(), QR_TEXT_WIDTH);
        assert!(text[expected.len()..].chars().all(|c| c == ' '));
    }

    #[test]
    fn test_first_qr_text_reserves_two_item_slots() {
        let items = vec![InvoiceItem::new("咖啡", 100, 1)];
        let text = invoice_at("2023-08-15 10:00:00", items)
            .first_qr_text(&qr_cipher())
            .unwrap();
        assert!(text.contains(":**********:1:2:1:咖啡:1:100"));
    }

    #[test]
    fn test_first_qr_text_uses_buyer_tax_id() {
        let mut invoice = invoice_at("2023-08-15 10:00:00", sample_items());
        invoice.buyer_tax_id = Some("12345675".to_string());
        let text = invoice.first_qr_text(&qr_cipher()).unwrap();
        assert!(text.contains("000003451234567524549210"));
    }

    #[test]
    fn test_second_qr_text() {
        let invoice = invoice_at("2023-08-15 10:00:00", sample_items());
        let text = invoice.second_qr_text().unwrap();
        assert!(text.starts_with("**餅乾:3:30 "));
        assert_eq!(text.chars().count(), QR_TEXT_WIDTH);

        let items = vec![InvoiceItem::new("咖啡", 100, 1)];
        let short = invoice_at("2023-08-15 10:00:00", items);
        assert_eq!(short.second_qr_text().unwrap().trim_end(), "**");
    }

    #[test]
    fn test_qr_text_width_counts_utf16_units() {
        let items = vec![
            InvoiceItem::new("咖啡", 100, 1),
            InvoiceItem::new("蛋糕", 55, 1),
            InvoiceItem::new("🍰", 100, 1),
        ];
        let invoice = invoice_at("2023-08-15 10:00:00", items);
        let text = invoice.second_qr_text().unwrap();

        assert!(text.starts_with("**🍰:1:100 "));
        assert_eq!(text.encode_utf16().count(), QR_TEXT_WIDTH);
        assert_eq!(text.chars().count(), QR_TEXT_WIDTH - 1);
    }

    #[test]
    fn test_qr_text_overflow_is_rejected() {
        let items = (0..40)
            .map(|i| InvoiceItem::new(format!("商品{i}"), 100, 1))
            .collect();
        let invoice = invoice_at("2023-08-15 10:00:00", items);
        assert!(matches!(
            invoice.second_qr_text(),
            Err(GatewayError::QrTextOverflow { .. })
        ));
    }

    #[test]
    fn test_item_defaults() {
        let item = InvoiceItem::new("咖啡", 100, 3);
        assert_eq!(item.amount().unwrap(), 300);
        assert_eq!(item.unit_label(), "式");
        assert_eq!(item.with_unit("杯").unit_label(), "杯");
    }
}
