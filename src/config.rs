use crate::error::{GatewayError, Result};
use std::env;
use std::fmt;

const PAYMENT_STAGING_HOST: &str = "https://payment-stage.ecpay.com.tw";
const PAYMENT_PRODUCTION_HOST: &str = "https://payment.ecpay.com.tw";
const INVOICE_STAGING_HOST: &str = "https://einvoice-stage.ecpay.com.tw/B2CInvoice";
const INVOICE_PRODUCTION_HOST: &str = "https://einvoice.ecpay.com.tw/B2CInvoice";

/// Deployment indicator checked before the automatic post-issue notification.
pub const APP_ENV_VAR: &str = "APP_ENV";

/// Which provider deployment a gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Staging,
    Production,
}

impl Environment {
    pub fn payment_host(&self) -> &'static str {
        match self {
            Self::Staging => PAYMENT_STAGING_HOST,
            Self::Production => PAYMENT_PRODUCTION_HOST,
        }
    }

    pub fn invoice_host(&self) -> &'static str {
        match self {
            Self::Staging => INVOICE_STAGING_HOST,
            Self::Production => INVOICE_PRODUCTION_HOST,
        }
    }

    fn parse(value: &str) -> Self {
        if is_production_marker(value) {
            Self::Production
        } else {
            Self::Staging
        }
    }
}

/// Merchant credentials issued by the provider.
///
/// For the invoice API `hash_key` and `hash_iv` double as the AES-128 key
/// and IV, so they must be exactly 16 bytes there. `Debug` prints only the
/// merchant id.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub merchant_id: String,
    pub hash_key: String,
    pub hash_iv: String,
}

impl GatewayCredentials {
    pub fn new(
        merchant_id: impl Into<String>,
        hash_key: impl Into<String>,
        hash_iv: impl Into<String>,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            hash_key: hash_key.into(),
            hash_iv: hash_iv.into(),
        }
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("merchant_id", &self.merchant_id)
            .finish_non_exhaustive()
    }
}

/// Credentials plus target environment, fixed for a gateway's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub credentials: GatewayCredentials,
    pub environment: Environment,
}

impl GatewayConfig {
    pub fn new(credentials: GatewayCredentials, environment: Environment) -> Self {
        Self {
            credentials,
            environment,
        }
    }

    /// Loads `{prefix}_MERCHANT_ID`, `{prefix}_HASH_KEY`, `{prefix}_HASH_IV`
    /// and the optional `{prefix}_ENVIRONMENT`.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            let key = format!("{prefix}_{name}");
            lookup(&key)
                .ok_or_else(|| GatewayError::Config(format!("{key} is not set")))
        };

        let credentials = GatewayCredentials {
            merchant_id: required("MERCHANT_ID")?,
            hash_key: required("HASH_KEY")?,
            hash_iv: required("HASH_IV")?,
        };
        let environment = lookup(&format!("{prefix}_ENVIRONMENT"))
            .map(|value| Environment::parse(&value))
            .unwrap_or_default();

        Ok(Self::new(credentials, environment))
    }
}

fn is_production_marker(value: &str) -> bool {
    value.eq_ignore_ascii_case("production")
}

/// True when the process declares itself a production deployment.
///
/// The value of `APP_ENV` is matched without regard to letter case.
pub fn runtime_is_production() -> bool {
    match env::var(APP_ENV_VAR) {
        Ok(value) => is_production_marker(&value),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_hosts_follow_environment() {
        assert_eq!(
            Environment::Staging.invoice_host(),
            "https://einvoice-stage.ecpay.com.tw/B2CInvoice"
        );
        assert_eq!(
            Environment::Production.payment_host(),
            "https://payment.ecpay.com.tw"
        );
    }

    #[test]
    fn test_from_lookup_reads_all_fields() {
        let lookup = lookup_from(&[
            ("ECPAY_MERCHANT_ID", "2000132"),
            ("ECPAY_HASH_KEY", "ejCk326UnaZWKisg"),
            ("ECPAY_HASH_IV", "q9jcZX8Ib9LM8wYk"),
            ("ECPAY_ENVIRONMENT", "Production"),
        ]);
        let config = GatewayConfig::from_lookup("ECPAY", lookup).unwrap();

        assert_eq!(config.credentials.merchant_id, "2000132");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_from_lookup_defaults_to_staging() {
        let lookup = lookup_from(&[
            ("ECPAY_MERCHANT_ID", "2000132"),
            ("ECPAY_HASH_KEY", "k"),
            ("ECPAY_HASH_IV", "v"),
        ]);
        let config = GatewayConfig::from_lookup("ECPAY", lookup).unwrap();

        assert_eq!(config.environment, Environment::Staging);
    }

    #[test]
    fn test_from_lookup_missing_key() {
        let lookup = lookup_from(&[("ECPAY_MERCHANT_ID", "2000132")]);
        let result = GatewayConfig::from_lookup("ECPAY", lookup);

        let Err(GatewayError::Config(msg)) = result else {
            panic!("expected a configuration error");
        };
        assert!(msg.contains("ECPAY_HASH_KEY"));
    }

    #[test]
    fn test_production_marker_ignores_case() {
        for value in ["production", "Production", "PRODUCTION"] {
            assert!(is_production_marker(value));
            assert_eq!(Environment::parse(value), Environment::Production);
        }
        for value in ["staging", "prod", ""] {
            assert!(!is_production_marker(value));
            assert_eq!(Environment::parse(value), Environment::Staging);
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credentials = GatewayCredentials::new("2000132", "secret-hash-key", "secret-hash-iv");
        let config = GatewayConfig::new(credentials, Environment::Staging);
        let printed = format!("{config:?}");

        assert!(printed.contains("2000132"));
        assert!(!printed.contains("secret-hash-key"));
        assert!(!printed.contains("secret-hash-iv"));
    }
}
