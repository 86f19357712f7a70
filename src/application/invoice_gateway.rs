use crate::config::{GatewayConfig, runtime_is_production};
use crate::domain::carrier::{Carrier, CarrierNumberCheck, CarrierType};
use crate::domain::cipher::EnvelopeCipher;
use crate::domain::invoice::{InvoiceItem, total_amount};
use crate::domain::issuance::{
    AllowanceReceipt, AllowanceRequest, InvalidAllowanceRequest, InvalidInvoiceRequest,
    IssueInvoiceRequest, IssuedInvoice,
};
use crate::domain::ports::TransportHandle;
use crate::error::{GatewayError, Result};
use crate::infrastructure::reqwest_transport::ReqwestTransport;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const REVISION: &str = "3.0.0";
const RTN_SUCCESS: i64 = 1;
const RTN_MAINTENANCE: i64 = 100_000_100;

pub const ISSUE_ENDPOINT: &str = "/Issue";
pub const ALLOWANCE_ENDPOINT: &str = "/Allowance";
pub const INVALID_ENDPOINT: &str = "/Invalid";
pub const ALLOWANCE_INVALID_ENDPOINT: &str = "/AllowanceInvalid";
pub const NOTIFY_ENDPOINT: &str = "/InvoiceNotify";
pub const CHECK_LOVE_CODE_ENDPOINT: &str = "/CheckLoveCode";
pub const CHECK_BARCODE_ENDPOINT: &str = "/CheckBarcode";

#[derive(Serialize)]
struct RequestHeader {
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "RqID")]
    request_id: Uuid,
    #[serde(rename = "Revision")]
    revision: &'static str,
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    #[serde(rename = "RqHeader")]
    header: RequestHeader,
    #[serde(rename = "Data")]
    data: String,
}

#[derive(Deserialize)]
struct ReplyEnvelope {
    #[serde(rename = "Data", default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyStatus {
    #[serde(rename = "RtnCode", default)]
    rtn_code: Option<i64>,
    #[serde(rename = "RtnMsg", default)]
    rtn_msg: Option<String>,
}

#[derive(Deserialize)]
struct VerificationReply {
    #[serde(flatten)]
    status: ReplyStatus,
    #[serde(rename = "IsExist", default)]
    is_exist: Option<String>,
}

enum Verification {
    Exists,
    Missing,
    Maintenance,
    Failed,
}

impl VerificationReply {
    fn outcome(&self) -> Verification {
        match self.status.rtn_code {
            Some(RTN_SUCCESS) if self.is_exist.as_deref() == Some("Y") => Verification::Exists,
            Some(RTN_SUCCESS) => Verification::Missing,
            Some(RTN_MAINTENANCE) => Verification::Maintenance,
            _ => Verification::Failed,
        }
    }
}

#[derive(Deserialize)]
struct IssueReply {
    #[serde(flatten)]
    status: ReplyStatus,
    #[serde(rename = "InvoiceNo", default)]
    invoice_no: Option<String>,
    #[serde(rename = "InvoiceDate", default)]
    invoice_date: Option<String>,
    #[serde(rename = "RandomNumber", default)]
    random_number: Option<String>,
}

#[derive(Deserialize)]
struct AllowanceReply {
    #[serde(flatten)]
    status: ReplyStatus,
    #[serde(rename = "IA_Allow_No", default)]
    allowance_no: Option<String>,
    #[serde(rename = "IA_Date", default)]
    date: Option<String>,
    #[serde(rename = "IA_Remain_Allowance_Amt", default)]
    remaining_amount: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoveCodeQuery<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    love_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BarcodeQuery<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    bar_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NotifyCommand<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    invoice_no: &'a str,
    notify_mail: &'a str,
    notify: &'static str,
    invoice_tag: &'static str,
    notified: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ItemRow<'a> {
    item_seq: usize,
    item_name: &'a str,
    item_count: i64,
    item_word: &'a str,
    item_price: i64,
    item_tax_type: &'static str,
    item_amount: i64,
    item_remark: &'static str,
}

fn item_rows(items: &[InvoiceItem]) -> Result<Vec<ItemRow<'_>>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Ok(ItemRow {
                item_seq: index,
                item_name: &item.name,
                item_count: item.quantity,
                item_word: item.unit_label(),
                item_price: item.unit_price,
                item_tax_type: "1",
                item_amount: item.amount()?,
                item_remark: "",
            })
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IssueCommand<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    relate_number: &'a str,
    #[serde(rename = "CustomerID")]
    customer_id: &'a str,
    customer_identifier: &'a str,
    customer_name: &'a str,
    customer_addr: &'a str,
    customer_phone: &'a str,
    customer_email: &'a str,
    print: &'static str,
    donation: &'static str,
    love_code: String,
    carrier_type: &'static str,
    carrier_num: String,
    tax_type: &'static str,
    sales_amount: i64,
    invoice_remark: &'static str,
    items: Vec<ItemRow<'a>>,
    inv_type: &'static str,
    #[serde(rename = "vat")]
    vat: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AllowanceCommand<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    invoice_no: &'a str,
    invoice_date: &'a str,
    allowance_notify: &'static str,
    notify_mail: &'a str,
    allowance_amount: i64,
    items: Vec<ItemRow<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidInvoiceCommand<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    invoice_no: &'a str,
    invoice_date: &'a str,
    reason: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidAllowanceCommand<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    invoice_no: &'a str,
    allowance_no: &'a str,
    reason: &'a str,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Client for the provider's B2C e-invoice API.
///
/// Every call wraps an AES-encrypted body in the provider envelope, POSTs
/// it and decrypts the `Data` field of the reply before branching on
/// `RtnCode`. `Clone` is cheap and shares the transport.
#[derive(Clone)]
pub struct InvoiceGateway {
    merchant_id: String,
    host: String,
    cipher: EnvelopeCipher,
    transport: TransportHandle,
    auto_notify: bool,
}

impl InvoiceGateway {
    /// Creates a gateway that talks to the provider over HTTPS.
    ///
    /// Fails when the hash key or IV is not a valid AES-128 key.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(config: GatewayConfig, transport: TransportHandle) -> Result<Self> {
        let credentials = config.credentials;
        let cipher = EnvelopeCipher::new(&credentials.hash_key, &credentials.hash_iv)?;
        Ok(Self {
            merchant_id: credentials.merchant_id,
            host: config.environment.invoice_host().to_string(),
            cipher,
            transport,
            auto_notify: !runtime_is_production(),
        })
    }

    /// Overrides whether a successful issue also fires the customer
    /// notification. Defaults to on unless `APP_ENV=production`.
    pub fn with_auto_notify(mut self, enabled: bool) -> Self {
        self.auto_notify = enabled;
        self
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub fn encrypt<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        self.cipher.encrypt(payload)
    }

    pub fn decrypt<T: DeserializeOwned>(&self, data: &str) -> Result<T> {
        self.cipher.decrypt(data)
    }

    async fn call<Q, R>(&self, endpoint: &str, query: &Q) -> Result<R>
    where
        Q: Serialize + Sync,
        R: DeserializeOwned,
    {
        let envelope = RequestEnvelope {
            merchant_id: &self.merchant_id,
            header: RequestHeader {
                timestamp: chrono::Utc::now().timestamp(),
                request_id: Uuid::new_v4(),
                revision: REVISION,
            },
            data: self.cipher.encrypt(query)?,
        };
        let url = format!("{}{}", self.host, endpoint);
        debug!(%url, request_id = %envelope.header.request_id, "posting invoice request");

        let body = serde_json::to_value(&envelope)?;
        let reply = self.transport.post_json(&url, &body).await?;
        let reply: ReplyEnvelope = serde_json::from_value(reply)?;
        let Some(data) = reply.data else {
            let message = format!("{endpoint} reply has no Data");
            return Err(GatewayError::MalformedResponse(message));
        };
        self.cipher.decrypt(&data)
    }

    pub async fn get_valid_love_code(&self, love_code: Option<&str>) -> Result<String> {
        let love_code = match love_code {
            Some(code) if !code.is_empty() => code,
            _ => return Err(GatewayError::InvalidLoveCode),
        };

        let reply: VerificationReply = self
            .call(
                CHECK_LOVE_CODE_ENDPOINT,
                &LoveCodeQuery {
                    merchant_id: &self.merchant_id,
                    love_code,
                },
            )
            .await?;

        match reply.outcome() {
            Verification::Exists => Ok(love_code.to_string()),
            Verification::Missing => Err(GatewayError::InvalidLoveCode),
            Verification::Maintenance => {
                debug!("love code verification system in maintenance");
                Err(GatewayError::LoveCodeVerificationSystemInMaintenance)
            }
            Verification::Failed => {
                debug!(
                    rtn_code = ?reply.status.rtn_code,
                    rtn_msg = ?reply.status.rtn_msg,
                    "love code verification system error"
                );
                Err(GatewayError::LoveCodeVerificationSystemError)
            }
        }
    }

    pub async fn get_valid_mobile_carrier_number(&self, number: &str) -> Result<String> {
        let reply: VerificationReply = self
            .call(
                CHECK_BARCODE_ENDPOINT,
                &BarcodeQuery {
                    merchant_id: &self.merchant_id,
                    bar_code: number,
                },
            )
            .await?;

        match reply.outcome() {
            Verification::Exists => Ok(number.to_string()),
            Verification::Missing => Err(GatewayError::InvalidMobileBarcode),
            Verification::Maintenance => {
                debug!("mobile barcode verification system in maintenance");
                Err(GatewayError::MobileBarcodeVerificationSystemInMaintenance)
            }
            Verification::Failed => {
                debug!(
                    rtn_code = ?reply.status.rtn_code,
                    rtn_msg = ?reply.status.rtn_msg,
                    "mobile barcode verification system error"
                );
                Err(GatewayError::MobileBarcodeVerificationSystemError)
            }
        }
    }

    /// Resolves the `CarrierNum` to send for `carrier`.
    ///
    /// Format errors are raised before any request; only mobile barcodes
    /// are confirmed with the provider.
    pub async fn get_valid_carrier_number(&self, carrier: &Carrier) -> Result<String> {
        match carrier.check_number()? {
            CarrierNumberCheck::NotRequired => Ok(String::new()),
            CarrierNumberCheck::Accepted(number) => Ok(number),
            CarrierNumberCheck::NeedsRemoteCheck(number) => {
                self.get_valid_mobile_carrier_number(&number).await
            }
        }
    }

    pub async fn send_notification(&self, invoice_number: &str, email: &str) -> Result<()> {
        let reply: ReplyStatus = self
            .call(
                NOTIFY_ENDPOINT,
                &NotifyCommand {
                    merchant_id: &self.merchant_id,
                    invoice_no: invoice_number,
                    notify_mail: email,
                    notify: "E",
                    invoice_tag: "I",
                    notified: "A",
                },
            )
            .await?;

        match reply.rtn_code {
            Some(RTN_SUCCESS) => {
                debug!(invoice_number, "invoice notification sent");
                Ok(())
            }
            code => {
                debug!(
                    rtn_code = ?code,
                    rtn_msg = ?reply.rtn_msg,
                    "invoice notification failed"
                );
                Err(GatewayError::SendInvoiceNotificationFailed)
            }
        }
    }

    fn spawn_notification(&self, invoice_number: String, email: String) {
        let gateway = self.clone();
        tokio::spawn(async move {
            if let Err(error) = gateway.send_notification(&invoice_number, &email).await {
                warn!(%invoice_number, %error, "automatic invoice notification failed");
            }
        });
    }

    /// Issues a B2C invoice for an order.
    ///
    /// Love codes and mobile barcodes are verified with the provider first.
    /// On success outside production, the customer notification is sent in
    /// the background; its outcome does not affect the result. Must be
    /// called from within a tokio runtime.
    pub async fn issue_invoice(&self, request: &IssueInvoiceRequest) -> Result<IssuedInvoice> {
        let carrier = &request.carrier;
        let customer = &request.customer;
        let sales_amount = total_amount(&request.items)?;
        let items = item_rows(&request.items)?;

        let love_code = if carrier.kind == CarrierType::LoveCode {
            self.get_valid_love_code(carrier.love_code.as_deref()).await?
        } else {
            String::new()
        };
        let carrier_num = self.get_valid_carrier_number(carrier).await?;

        let command = IssueCommand {
            merchant_id: &self.merchant_id,
            relate_number: &request.order_id,
            customer_id: &customer.member_id,
            customer_identifier: customer.vat_number.as_deref().unwrap_or_default(),
            customer_name: &customer.name,
            customer_addr: customer.address.as_deref().unwrap_or_default(),
            customer_phone: &customer.mobile_phone,
            customer_email: &customer.email,
            print: carrier.kind.print_flag(),
            donation: carrier.kind.donation_flag(),
            love_code,
            carrier_type: carrier.kind.provider_code(),
            carrier_num,
            tax_type: "1",
            sales_amount,
            invoice_remark: "",
            items,
            inv_type: "07",
            vat: "1",
        };
        let reply: IssueReply = self.call(ISSUE_ENDPOINT, &command).await?;

        if reply.status.rtn_code == Some(RTN_SUCCESS)
            && let (Some(invoice_number), Some(date), Some(random_number)) = (
                present(reply.invoice_no),
                present(reply.invoice_date),
                present(reply.random_number),
            )
        {
            if self.auto_notify {
                self.spawn_notification(invoice_number.clone(), customer.email.clone());
            }
            return Ok(IssuedInvoice {
                order_id: request.order_id.clone(),
                invoice_number,
                date,
                random_number,
            });
        }

        debug!(
            rtn_code = ?reply.status.rtn_code,
            rtn_msg = ?reply.status.rtn_msg,
            order_id = %request.order_id,
            "issue invoice failed"
        );
        Err(GatewayError::IssueInvoiceFailed)
    }

    /// Issues an allowance (credit note) against an existing invoice.
    pub async fn allowance_invoice(&self, request: &AllowanceRequest) -> Result<AllowanceReceipt> {
        let command = AllowanceCommand {
            merchant_id: &self.merchant_id,
            invoice_no: &request.invoice_number,
            invoice_date: &request.invoice_date,
            allowance_notify: "E",
            notify_mail: &request.email,
            allowance_amount: total_amount(&request.items)?,
            items: item_rows(&request.items)?,
        };
        let reply: AllowanceReply = self.call(ALLOWANCE_ENDPOINT, &command).await?;

        match reply.status.rtn_code {
            Some(RTN_SUCCESS) => Ok(AllowanceReceipt {
                allowance_number: reply.allowance_no.unwrap_or_default(),
                invoice_number: request.invoice_number.clone(),
                date: reply.date.unwrap_or_default(),
                remaining_amount: reply.remaining_amount.unwrap_or_default(),
            }),
            code => {
                debug!(
                    rtn_code = ?code,
                    rtn_msg = ?reply.status.rtn_msg,
                    "allowance invoice failed"
                );
                Err(GatewayError::AllowanceInvoiceFailed)
            }
        }
    }

    /// Voids an issued invoice.
    pub async fn invalid_invoice(&self, request: &InvalidInvoiceRequest) -> Result<()> {
        let command = InvalidInvoiceCommand {
            merchant_id: &self.merchant_id,
            invoice_no: &request.invoice_number,
            invoice_date: &request.invoice_date,
            reason: &request.reason,
        };
        let reply: ReplyStatus = self.call(INVALID_ENDPOINT, &command).await?;

        match reply.rtn_code {
            Some(RTN_SUCCESS) => Ok(()),
            code => {
                debug!(
                    rtn_code = ?code,
                    rtn_msg = ?reply.rtn_msg,
                    "invalid invoice failed"
                );
                Err(GatewayError::InvalidInvoiceFailed)
            }
        }
    }

    /// Voids an issued allowance.
    pub async fn invalid_allowance(&self, request: &InvalidAllowanceRequest) -> Result<()> {
        let command = InvalidAllowanceCommand {
            merchant_id: &self.merchant_id,
            invoice_no: &request.invoice_number,
            allowance_no: &request.allowance_number,
            reason: &request.reason,
        };
        let reply: ReplyStatus = self.call(ALLOWANCE_INVALID_ENDPOINT, &command).await?;

        match reply.rtn_code {
            Some(RTN_SUCCESS) => Ok(()),
            code => {
                debug!(
                    rtn_code = ?code,
                    rtn_msg = ?reply.rtn_msg,
                    "invalid allowance failed"
                );
                Err(GatewayError::InvalidAllowanceFailed)
            }
        }
    }
}
