//! XunimPay audit database bootstrap
//!
//! Prepares the `xunimpay_audit` database: application principal, secondary
//! indexes on `audit_logs`, and the initialization seed record.

pub mod bootstrap;
pub mod modules;

pub use bootstrap::{success_message, BootstrapReport, Bootstrapper, VerifyReport};
