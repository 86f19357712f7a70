use super::checksum::FormPayload;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A hosted-checkout order to be rendered as an auto-submit form.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOrder {
    pub order_id: String,
    /// Binds the card used for this order to the member when present.
    pub member_id: Option<String>,
    pub reply_url: String,
    pub item_names: Vec<String>,
    pub description: String,
    pub amount: Decimal,
    pub finish_url: Option<String>,
}

/// A signed redirect: POST `params` to `url` from the customer's browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectForm {
    pub url: String,
    pub params: FormPayload,
}

/// A card previously bound to a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundCard {
    pub id: String,
    /// Masked as `1234-56xx-xxxx-7890`.
    pub card_number: String,
    /// RFC 3339 timestamp of the binding.
    pub bind_on: String,
}

/// A charge against a member's bound card.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberCheckout {
    pub member_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCheckoutReceipt {
    /// `yyyy-MM-dd HH:mm:ss`, when the provider reported a process date.
    pub checkout_time: Option<String>,
    pub trade_number: String,
    pub auth_order_number: String,
    pub auth_code: String,
    pub first_six_digits: String,
    pub last_four_digits: String,
    /// 3-D Secure ECI indicator.
    pub eci: i32,
}
