pub mod callbacks;
pub mod engine;

pub use callbacks::{C2bConfirmation, CallbackAck, CallbackProcessor};
pub use engine::{Confirmation, ReconcileOutcome, ReconciliationEngine, ReconciliationResult};
