//! Gateway clients that turn domain requests into signed provider calls.
//!
//! Each operation is a single stateless request/response exchange; the
//! gateways hold only their immutable credentials and a shared transport.

pub mod invoice_gateway;
pub mod payment_gateway;
