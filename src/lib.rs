pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::invoice_gateway::InvoiceGateway;
pub use application::payment_gateway::PaymentGateway;
pub use config::{Environment, GatewayConfig, GatewayCredentials};
pub use error::{GatewayError, Result};
