use crate::error::{GatewayError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static MOBILE_BARCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[0-9A-Z+-.]{7}$").expect("valid regex"));
static NATURAL_CERTIFICATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}\d{14}$").expect("valid regex"));

/// How an issued e-invoice reaches, or is attributed to, its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarrierType {
    /// Printed paper invoice.
    Print,
    /// Donated to the charity behind a love code.
    LoveCode,
    /// The provider's generic member e-carrier.
    GreenWorld,
    /// Natural-person citizen certificate.
    Natural,
    /// Mobile phone barcode.
    Mobile,
}

impl CarrierType {
    /// Provider `CarrierType` code. Print and love code share the empty
    /// code and are told apart by the `Print`/`Donation` flags.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Self::GreenWorld => "1",
            Self::Natural => "2",
            Self::Mobile => "3",
            Self::Print | Self::LoveCode => "",
        }
    }

    pub fn print_flag(&self) -> &'static str {
        if *self == Self::Print { "1" } else { "0" }
    }

    pub fn donation_flag(&self) -> &'static str {
        if *self == Self::LoveCode { "1" } else { "0" }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub kind: CarrierType,
    pub love_code: Option<String>,
    pub number: Option<String>,
}

impl Carrier {
    pub fn print() -> Self {
        Self {
            kind: CarrierType::Print,
            love_code: None,
            number: None,
        }
    }

    pub fn love_code(code: impl Into<String>) -> Self {
        Self {
            kind: CarrierType::LoveCode,
            love_code: Some(code.into()),
            number: None,
        }
    }

    pub fn green_world() -> Self {
        Self {
            kind: CarrierType::GreenWorld,
            love_code: None,
            number: None,
        }
    }

    pub fn natural(number: impl Into<String>) -> Self {
        Self {
            kind: CarrierType::Natural,
            love_code: None,
            number: Some(number.into()),
        }
    }

    pub fn mobile(number: impl Into<String>) -> Self {
        Self {
            kind: CarrierType::Mobile,
            love_code: None,
            number: Some(number.into()),
        }
    }

    /// Checks the carrier number format without touching the network.
    pub fn check_number(&self) -> Result<CarrierNumberCheck> {
        let number = self.number.as_deref().unwrap_or_default();
        match self.kind {
            CarrierType::Mobile => {
                if MOBILE_BARCODE.is_match(number) {
                    Ok(CarrierNumberCheck::NeedsRemoteCheck(number.to_string()))
                } else {
                    Err(GatewayError::InvalidMobileCarrierNumberType)
                }
            }
            CarrierType::Natural => {
                if NATURAL_CERTIFICATE.is_match(number) {
                    Ok(CarrierNumberCheck::Accepted(number.to_string()))
                } else {
                    Err(GatewayError::InvalidNaturalCarrierNumberType)
                }
            }
            CarrierType::Print | CarrierType::LoveCode | CarrierType::GreenWorld => {
                Ok(CarrierNumberCheck::NotRequired)
            }
        }
    }
}

/// Outcome of the offline carrier-number check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierNumberCheck {
    /// The carrier carries no number; send an empty `CarrierNum`.
    NotRequired,
    /// Well-formed and accepted as-is.
    Accepted(String),
    /// Well-formed, but the provider must confirm the barcode exists.
    NeedsRemoteCheck(String),
}
