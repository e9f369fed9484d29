pub mod checkout;
pub mod housekeeping;

pub use checkout::{CheckoutConfig, CheckoutRequest, CheckoutResponse, CheckoutService};
pub use housekeeping::{HousekeepingService, ResetSummary};
