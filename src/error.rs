use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum GatewayError {
    #[error("Invalid Natural Carrier Number Type")]
    #[diagnostic(code(ecpay::invoice::invalid_natural_carrier_number_type))]
    InvalidNaturalCarrierNumberType,

    #[error("Invalid Mobile Carrier Number Type")]
    #[diagnostic(code(ecpay::invoice::invalid_mobile_carrier_number_type))]
    InvalidMobileCarrierNumberType,

    #[error("Mobile Barcode Verification System In Maintenance")]
    #[diagnostic(code(ecpay::invoice::mobile_barcode_maintenance))]
    MobileBarcodeVerificationSystemInMaintenance,

    #[error("Mobile Barcode Verification System Error")]
    #[diagnostic(code(ecpay::invoice::mobile_barcode_system_error))]
    MobileBarcodeVerificationSystemError,

    #[error("Invalid Mobile Barcode")]
    #[diagnostic(code(ecpay::invoice::invalid_mobile_barcode))]
    InvalidMobileBarcode,

    #[error("Love Code Verification System In Maintenance")]
    #[diagnostic(code(ecpay::invoice::love_code_maintenance))]
    LoveCodeVerificationSystemInMaintenance,

    #[error("Love Code Verification System Error")]
    #[diagnostic(code(ecpay::invoice::love_code_system_error))]
    LoveCodeVerificationSystemError,

    #[error("Invalid Love Code")]
    #[diagnostic(code(ecpay::invoice::invalid_love_code))]
    InvalidLoveCode,

    #[error("Issue Invoice Failed")]
    #[diagnostic(code(ecpay::invoice::issue_failed))]
    IssueInvoiceFailed,

    #[error("Send Invoice Notification Failed")]
    #[diagnostic(code(ecpay::invoice::notification_failed))]
    SendInvoiceNotificationFailed,

    #[error("Allowance Invoice Failed")]
    #[diagnostic(code(ecpay::invoice::allowance_failed))]
    AllowanceInvoiceFailed,

    #[error("Invalid Invoice Failed")]
    #[diagnostic(code(ecpay::invoice::invalid_invoice_failed))]
    InvalidInvoiceFailed,

    #[error("Invalid Allowance Failed")]
    #[diagnostic(code(ecpay::invoice::invalid_allowance_failed))]
    InvalidAllowanceFailed,

    #[error("Member Did Not Bind Card")]
    #[diagnostic(code(ecpay::payment::member_did_not_bind_card))]
    MemberDidNotBindCard,

    #[error("Checkout With Member Id Failed")]
    #[diagnostic(code(ecpay::payment::checkout_with_member_id_failed))]
    CheckoutWithMemberIdFailed,

    #[error("HTTP transport error: {0}")]
    #[diagnostic(code(ecpay::transport))]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(ecpay::serialization))]
    Serialization(#[from] serde_json::Error),

    #[error("Decrypt error: {0}")]
    #[diagnostic(code(ecpay::decrypt))]
    Decrypt(String),

    #[error("Malformed provider response: {0}")]
    #[diagnostic(code(ecpay::malformed_response))]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(ecpay::config))]
    Config(String),

    #[error("Invalid payload: {0}")]
    #[diagnostic(code(ecpay::invalid_payload))]
    InvalidPayload(String),

    #[error("QR text is {len} UTF-16 code units, exceeding the 180 unit field")]
    #[diagnostic(code(ecpay::invoice::qr_text_overflow))]
    QrTextOverflow { len: usize },
}

impl GatewayError {
    /// Fixed numeric code of a provider failure kind.
    ///
    /// Returns `None` for transport, codec and configuration failures,
    /// which carry no provider code.
    pub fn code(&self) -> Option<u16> {
        let code = match self {
            Self::InvalidNaturalCarrierNumberType => 1001,
            Self::InvalidMobileCarrierNumberType => 1002,
            Self::MobileBarcodeVerificationSystemInMaintenance => 1003,
            Self::MobileBarcodeVerificationSystemError => 1004,
            Self::InvalidMobileBarcode => 1005,
            Self::LoveCodeVerificationSystemInMaintenance => 1006,
            Self::LoveCodeVerificationSystemError => 1007,
            Self::InvalidLoveCode => 1008,
            Self::IssueInvoiceFailed => 1009,
            Self::SendInvoiceNotificationFailed => 1010,
            Self::AllowanceInvoiceFailed => 1011,
            Self::InvalidInvoiceFailed => 1012,
            Self::InvalidAllowanceFailed => 1013,
            Self::MemberDidNotBindCard => 1014,
            Self::CheckoutWithMemberIdFailed => 1015,
            Self::Transport(_)
            | Self::Serialization(_)
            | Self::Decrypt(_)
            | Self::MalformedResponse(_)
            | Self::Config(_)
            | Self::InvalidPayload(_)
            | Self::QrTextOverflow { .. } => return None,
        };
        Some(code)
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
