#![allow(dead_code)]

use ecpay_gateway::domain::carrier::Carrier;
use ecpay_gateway::domain::cipher::EnvelopeCipher;
use ecpay_gateway::domain::invoice::InvoiceItem;
use ecpay_gateway::domain::issuance::{InvoiceCustomer, IssueInvoiceRequest};
use ecpay_gateway::infrastructure::in_memory::InMemoryTransport;
use ecpay_gateway::{Environment, GatewayConfig, GatewayCredentials, InvoiceGateway, PaymentGateway};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

// Public sandbox merchants.
pub const INVOICE_MERCHANT_ID: &str = "2000132";
pub const INVOICE_HASH_KEY: &str = "ejCk326UnaZWKisg";
pub const INVOICE_HASH_IV: &str = "q9jcZX8Ib9LM8wYk";

pub const PAYMENT_MERCHANT_ID: &str = "2000214";
pub const PAYMENT_HASH_KEY: &str = "5294y06JbISpM5x9";
pub const PAYMENT_HASH_IV: &str = "v77hoKGq4kWxNNIS";

pub fn invoice_config() -> GatewayConfig {
    GatewayConfig::new(
        GatewayCredentials::new(INVOICE_MERCHANT_ID, INVOICE_HASH_KEY, INVOICE_HASH_IV),
        Environment::Staging,
    )
}

pub fn payment_config() -> GatewayConfig {
    GatewayConfig::new(
        GatewayCredentials::new(PAYMENT_MERCHANT_ID, PAYMENT_HASH_KEY, PAYMENT_HASH_IV),
        Environment::Staging,
    )
}

pub fn invoice_cipher() -> EnvelopeCipher {
    EnvelopeCipher::new(INVOICE_HASH_KEY, INVOICE_HASH_IV)
        .unwrap()
}

/// An invoice gateway over a scripted transport, auto-notify off.
pub fn invoice_gateway() -> (InvoiceGateway, InMemoryTransport) {
    let transport = InMemoryTransport::new();
    let gateway = InvoiceGateway::with_transport(invoice_config(), Arc::new(transport.clone()))
        .unwrap()
        .with_auto_notify(false);
    (gateway, transport)
}

pub fn payment_gateway() -> (PaymentGateway, InMemoryTransport) {
    let transport = InMemoryTransport::new();
    let gateway = PaymentGateway::with_transport(payment_config(), Arc::new(transport.clone()));
    (gateway, transport)
}

/// Wraps `data` the way the invoice API replies.
pub fn encrypted_reply(data: Value) -> Value {
    let encrypted = invoice_cipher().encrypt(&data).unwrap();
    json!({ "TransCode": 1, "TransMsg": "", "Data": encrypted })
}

/// Decrypted reply data carrying only `RtnCode`.
pub fn rtn_code(code: i64) -> Value {
    json!({ "RtnCode": code })
}

/// Decrypted reply data of a love code or barcode check.
pub fn verified(is_exist: &str) -> Value {
    json!({ "RtnCode": 1, "IsExist": is_exist })
}

/// Decrypts the `Data` field of a recorded invoice request.
pub fn decrypted_request(body: &Value) -> Value {
    let data = body["Data"].as_str().unwrap();
    invoice_cipher().decrypt(data).unwrap()
}

pub fn customer() -> InvoiceCustomer {
    InvoiceCustomer {
        member_id: "M0001".to_string(),
        vat_number: None,
        name: "王小明".to_string(),
        address: None,
        mobile_phone: "0912345678".to_string(),
        email: "buyer@example.com".to_string(),
    }
}

pub fn issue_request(carrier: Carrier) -> IssueInvoiceRequest {
    IssueInvoiceRequest {
        order_id: "ORDER0001".to_string(),
        customer: customer(),
        carrier,
        items: vec![
            InvoiceItem::new("咖啡", 100, 2),
            InvoiceItem::new("蛋糕", 55, 1),
        ],
    }
}

pub fn issued_data() -> Value {
    json!({
        "RtnCode": 1,
        "RtnMsg": "開立發票成功",
        "InvoiceNo": "AB12345678",
        "InvoiceDate": "2023-08-15 10:00:00",
        "RandomNumber": "1234"
    })
}

/// Polls until `endpoint` has received `count` requests or a second passes.
pub async fn wait_for_requests(
    transport: &InMemoryTransport,
    endpoint: &str,
    count: usize,
) -> bool {
    for _ in 0..100 {
        if transport.requests_to(endpoint).await.len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
