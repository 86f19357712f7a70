use crate::config::{GatewayConfig, GatewayCredentials};
use crate::domain::checksum::{self, FormPayload};
use crate::domain::payment::{
    BoundCard, CheckoutOrder, MemberCheckout, MemberCheckoutReceipt, RedirectForm,
};
use crate::domain::ports::TransportHandle;
use crate::error::{GatewayError, Result};
use crate::infrastructure::reqwest_transport::ReqwestTransport;
use chrono::{FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const AIO_CHECKOUT_ENDPOINT: &str = "/Cashier/AioCheckOut/V5";
pub const BINDING_CARD_ENDPOINT: &str = "/MerchantMember/BindingCardID";
pub const AUTH_CARD_ENDPOINT: &str = "/MerchantMember/AuthCardID/V2";
pub const QUERY_BINDING_ENDPOINT: &str = "/MerchantMember/QueryMemberBinding";

/// Provider-local timestamp format, e.g. `2023/08/15 10:00:00`.
pub const PROVIDER_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const RECEIPT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The provider runs on Taiwan time.
const PROVIDER_UTC_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AioCheckoutPayload<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    merchant_trade_no: &'a str,
    merchant_trade_date: String,
    payment_type: &'static str,
    total_amount: i64,
    trade_desc: &'a str,
    item_name: String,
    #[serde(rename = "ReturnURL")]
    return_url: &'a str,
    choose_payment: &'static str,
    need_extra_paid_info: &'static str,
    encrypt_type: u8,
    #[serde(rename = "ClientBackURL")]
    client_back_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    binding_card: Option<u8>,
    #[serde(rename = "MerchantMemberID", skip_serializing_if = "Option::is_none")]
    merchant_member_id: Option<String>,
}

#[derive(Serialize)]
struct BindingCardPayload<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    #[serde(rename = "MerchantMemberID")]
    merchant_member_id: String,
    #[serde(rename = "ServerReplyURL")]
    server_reply_url: &'a str,
    #[serde(rename = "ClientRedirectURL")]
    client_redirect_url: &'a str,
}

#[derive(Serialize)]
struct QueryBindingPayload<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    #[serde(rename = "MerchantMemberID")]
    merchant_member_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AuthCardPayload<'a> {
    #[serde(rename = "MerchantID")]
    merchant_id: &'a str,
    #[serde(rename = "MerchantMemberID")]
    merchant_member_id: String,
    merchant_trade_no: &'a str,
    merchant_trade_date: String,
    total_amount: i64,
    trade_desc: &'a str,
    #[serde(rename = "CardID")]
    card_id: &'a str,
    #[serde(rename = "stage")]
    stage: u8,
}

#[derive(Deserialize)]
struct BindingEnvelope {
    #[serde(rename = "JSonData", default)]
    json_data: Option<String>,
}

#[derive(Deserialize)]
struct BindingRecord {
    #[serde(rename = "BindingDate")]
    binding_date: String,
    #[serde(rename = "CardID")]
    card_id: String,
    #[serde(rename = "Card6No")]
    card6_no: String,
    #[serde(rename = "Card4No")]
    card4_no: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthReply {
    #[serde(rename = "RtnCode")]
    rtn_code: Option<String>,
    #[serde(rename = "RtnMsg")]
    rtn_msg: Option<String>,
    #[serde(rename = "AllpayTradeNo")]
    trade_no: Option<String>,
    gwsr: Option<String>,
    process_date: Option<String>,
    auth_code: Option<String>,
    card6no: Option<String>,
    card4no: Option<String>,
    eci: Option<String>,
}

impl AuthReply {
    fn succeeded(&self) -> bool {
        let code = self.rtn_code.as_deref().map(str::trim);
        code.and_then(|code| code.parse::<i64>().ok()) == Some(1)
    }
}

fn provider_offset() -> Result<FixedOffset> {
    FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS)
        .ok_or_else(|| GatewayError::Config("invalid UTC offset".to_string()))
}

fn provider_now() -> Result<String> {
    let now = Utc::now().with_timezone(&provider_offset()?);
    Ok(now.format(PROVIDER_DATE_FORMAT).to_string())
}

fn floor_amount(amount: Decimal) -> Result<i64> {
    let Some(floored) = amount.floor().to_i64() else {
        let message = format!("amount {amount} is out of range");
        return Err(GatewayError::InvalidPayload(message));
    };
    Ok(floored)
}

/// Renders a provider process date as a receipt timestamp.
fn receipt_time(date: &str) -> Result<String> {
    match NaiveDateTime::parse_from_str(date, PROVIDER_DATE_FORMAT) {
        Ok(parsed) => Ok(parsed.format(RECEIPT_DATE_FORMAT).to_string()),
        Err(e) => {
            let message = format!("invalid process_date {date}: {e}");
            Err(GatewayError::MalformedResponse(message))
        }
    }
}

/// Masks a card as `first4-next2xx-xxxx-last4`.
fn mask_card_number(first_six: &str, last_four: &str) -> String {
    let head: String = first_six.chars().take(4).collect();
    let tail: String = first_six.chars().skip(4).take(2).collect();
    format!("{head}-{tail}xx-xxxx-{last_four}")
}

fn parse_binding(reply: &str, offset: FixedOffset) -> Option<BoundCard> {
    let envelope: BindingEnvelope = serde_urlencoded::from_str(reply).ok()?;
    let record: BindingRecord = serde_json::from_str(&envelope.json_data?).ok()?;
    if record.binding_date.is_empty() {
        return None;
    }

    let bound_at = NaiveDateTime::parse_from_str(&record.binding_date, PROVIDER_DATE_FORMAT);
    let bind_on = offset
        .from_local_datetime(&bound_at.ok()?)
        .single()?
        .to_rfc3339_opts(SecondsFormat::Secs, false);

    Some(BoundCard {
        card_number: mask_card_number(&record.card6_no, &record.card4_no),
        id: record.card_id,
        bind_on,
    })
}

/// Client for the provider's credit-card payment API.
#[derive(Clone)]
pub struct PaymentGateway {
    credentials: GatewayCredentials,
    host: String,
    transport: TransportHandle,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(config: GatewayConfig, transport: TransportHandle) -> Self {
        Self {
            host: config.environment.payment_host().to_string(),
            credentials: config.credentials,
            transport,
        }
    }

    pub fn merchant_id(&self) -> &str {
        &self.credentials.merchant_id
    }

    fn member_key(&self, member_id: &str) -> String {
        format!("{}{}", self.credentials.merchant_id, member_id)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.host, endpoint)
    }

    /// Flattens `payload` and attaches its `CheckMacValue`.
    pub fn add_check_sum<T: Serialize>(&self, payload: &T) -> Result<FormPayload> {
        let form = checksum::to_form_payload(payload)?;
        let credentials = &self.credentials;
        let signed = checksum::sign(&credentials.hash_key, &credentials.hash_iv, &form);
        Ok(signed)
    }

    /// Builds the signed hosted-checkout form for `order`.
    ///
    /// No request is made; the caller renders the form for the customer's
    /// browser to submit.
    pub fn create_order(&self, order: &CheckoutOrder) -> Result<RedirectForm> {
        let member_key = order
            .member_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| self.member_key(id));

        let payload = AioCheckoutPayload {
            merchant_id: &self.credentials.merchant_id,
            merchant_trade_no: &order.order_id,
            merchant_trade_date: provider_now()?,
            payment_type: "aio",
            total_amount: floor_amount(order.amount)?,
            trade_desc: &order.description,
            item_name: order.item_names.join("#"),
            return_url: &order.reply_url,
            choose_payment: "Credit",
            need_extra_paid_info: "Y",
            encrypt_type: 1,
            client_back_url: order.finish_url.as_deref().unwrap_or_default(),
            binding_card: member_key.as_ref().map(|_| 1),
            merchant_member_id: member_key,
        };

        Ok(RedirectForm {
            url: self.url(AIO_CHECKOUT_ENDPOINT),
            params: self.add_check_sum(&payload)?,
        })
    }

    /// Builds the signed form that sends a member to bind a card.
    pub fn create_bind_procedure(
        &self,
        member_id: &str,
        reply_url: &str,
        finish_url: Option<&str>,
    ) -> Result<RedirectForm> {
        let payload = BindingCardPayload {
            merchant_id: &self.credentials.merchant_id,
            merchant_member_id: self.member_key(member_id),
            server_reply_url: reply_url,
            client_redirect_url: finish_url.unwrap_or_default(),
        };

        Ok(RedirectForm {
            url: self.url(BINDING_CARD_ENDPOINT),
            params: self.add_check_sum(&payload)?,
        })
    }

    /// Looks up the card bound to `member_id`.
    ///
    /// A missing envelope, unparsable JSON or an empty binding date all
    /// mean the member has no usable card.
    pub async fn get_member_bound_card(&self, member_id: &str) -> Result<BoundCard> {
        let form = self.add_check_sum(&QueryBindingPayload {
            merchant_id: &self.credentials.merchant_id,
            merchant_member_id: self.member_key(member_id),
        })?;
        let reply = self
            .transport
            .post_form(&self.url(QUERY_BINDING_ENDPOINT), &form)
            .await?;

        let Some(card) = parse_binding(&reply, provider_offset()?) else {
            debug!(member_id, "member has no bound card");
            return Err(GatewayError::MemberDidNotBindCard);
        };
        Ok(card)
    }

    /// Charges the member's bound card.
    pub async fn checkout_with_member_id(
        &self,
        checkout: &MemberCheckout,
    ) -> Result<MemberCheckoutReceipt> {
        let card = self.get_member_bound_card(&checkout.member_id).await?;

        let form = self.add_check_sum(&AuthCardPayload {
            merchant_id: &self.credentials.merchant_id,
            merchant_member_id: self.member_key(&checkout.member_id),
            merchant_trade_no: &checkout.order_id,
            merchant_trade_date: provider_now()?,
            total_amount: floor_amount(checkout.amount)?,
            trade_desc: &checkout.description,
            card_id: &card.id,
            stage: 0,
        })?;
        let reply = self
            .transport
            .post_form(&self.url(AUTH_CARD_ENDPOINT), &form)
            .await?;

        let reply: AuthReply = serde_urlencoded::from_str(&reply).unwrap_or_default();
        if !reply.succeeded() {
            debug!(
                rtn_code = ?reply.rtn_code,
                rtn_msg = ?reply.rtn_msg,
                order_id = %checkout.order_id,
                "checkout with member id failed"
            );
            return Err(GatewayError::CheckoutWithMemberIdFailed);
        }

        let checkout_time = reply
            .process_date
            .as_deref()
            .filter(|date| !date.is_empty())
            .map(receipt_time)
            .transpose()?;

        Ok(MemberCheckoutReceipt {
            checkout_time,
            trade_number: reply.trade_no.unwrap_or_default(),
            auth_order_number: reply.gwsr.unwrap_or_default(),
            auth_code: reply.auth_code.unwrap_or_default(),
            first_six_digits: reply.card6no.unwrap_or_default(),
            last_four_digits: reply.card4no.unwrap_or_default(),
            eci: reply
                .eci
                .as_deref()
                .and_then(|eci| eci.trim().parse().ok())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn taipei() -> FixedOffset {
        provider_offset().unwrap()
    }

    fn binding_reply(json: &str) -> String {
        serde_urlencoded::to_string([("JSonData", json)]).unwrap()
    }

    #[test]
    fn test_mask_card_number() {
        assert_eq!(mask_card_number("431195", "2222"), "4311-95xx-xxxx-2222");
    }

    #[test]
    fn test_floor_amount() {
        assert_eq!(floor_amount(dec!(1200.99)).unwrap(), 1200);
        assert_eq!(floor_amount(dec!(1200)).unwrap(), 1200);
        assert!(matches!(
            floor_amount(Decimal::MAX),
            Err(GatewayError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_binding() {
        let json = concat!(
            r#"{"BindingDate":"2023/08/15 10:00:00","CardID":"9527","#,
            r#""Card6No":"431195","Card4No":"2222"}"#,
        );
        let fields = [("RtnCode", "1"), ("JSonData", json)];
        let reply = serde_urlencoded::to_string(fields).unwrap();

        let card = parse_binding(&reply, taipei()).unwrap();
        assert_eq!(card.id, "9527");
        assert_eq!(card.card_number, "4311-95xx-xxxx-2222");
        assert_eq!(card.bind_on, "2023-08-15T10:00:00+08:00");
    }

    #[test]
    fn test_parse_binding_rejects_unbound_members() {
        let empty_date = r#"{"BindingDate":"","CardID":"","Card6No":"","Card4No":""}"#;
        let reply = binding_reply(empty_date);
        assert!(parse_binding(&reply, taipei()).is_none());

        let reply = binding_reply("{not json");
        assert!(parse_binding(&reply, taipei()).is_none());

        let missing_field = r#"{"BindingDate":"2023/08/15 10:00:00","CardID":"9527"}"#;
        let reply = binding_reply(missing_field);
        assert!(parse_binding(&reply, taipei()).is_none());

        assert!(parse_binding("RtnCode=1", taipei()).is_none());
        assert!(parse_binding("", taipei()).is_none());
    }

    #[test]
    fn test_auth_reply_success_code() {
        let reply: AuthReply = serde_urlencoded::from_str("RtnCode=1&RtnMsg=OK").unwrap();
        assert!(reply.succeeded());

        let reply: AuthReply = serde_urlencoded::from_str("RtnCode=10100248").unwrap();
        assert!(!reply.succeeded());

        let reply: AuthReply = serde_urlencoded::from_str("RtnMsg=oops").unwrap();
        assert!(!reply.succeeded());
    }

    #[test]
    fn test_provider_now_uses_provider_format() {
        let now = provider_now().unwrap();
        let parsed = NaiveDateTime::parse_from_str(&now, PROVIDER_DATE_FORMAT);
        assert!(parsed.is_ok());
    }
}
