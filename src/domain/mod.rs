//! Provider-independent values and the pure rules that shape them.

pub mod carrier;
pub mod checksum;
pub mod cipher;
pub mod encoding;
pub mod invoice;
pub mod issuance;
pub mod payment;
pub mod ports;
