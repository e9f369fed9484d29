//! PesaFlow: transaction processing and reconciliation for mobile-money
//! and bank-transfer payments.
//!
//! The crate is organized around a small set of seams:
//! - [`fees`]: bracketed fee schedule and the fee engine.
//! - [`ledger`]: the transaction store and its status state machine.
//! - [`merchants`]: merchant records and monthly volume aggregation.
//! - [`payments`]: provider adapters behind the [`payments::PaymentProvider`] trait.
//! - [`reconciliation`]: idempotent settlement of provider confirmations.
//! - [`services`]: checkout orchestration and housekeeping.
//! - [`workers`]: background tasks.

pub mod config;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod logging;
pub mod merchants;
pub mod payments;
pub mod reconciliation;
pub mod services;
pub mod workers;

pub use error::{CoreError, CoreResult};
