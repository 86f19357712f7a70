//! Request and result types of the B2C e-invoice operations.

use super::carrier::Carrier;
use super::invoice::InvoiceItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCustomer {
    pub member_id: String,
    /// Buyer's unified business number, for company purchases.
    pub vat_number: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub mobile_phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueInvoiceRequest {
    pub order_id: String,
    pub customer: InvoiceCustomer,
    pub carrier: Carrier,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedInvoice {
    pub order_id: String,
    pub invoice_number: String,
    pub date: String,
    pub random_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceRequest {
    pub invoice_number: String,
    pub invoice_date: String,
    pub items: Vec<InvoiceItem>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceReceipt {
    pub allowance_number: String,
    pub invoice_number: String,
    pub date: String,
    pub remaining_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInvoiceRequest {
    pub invoice_number: String,
    pub invoice_date: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAllowanceRequest {
    pub invoice_number: String,
    pub allowance_number: String,
    pub reason: String,
}
