pub mod monthly_reset;

pub use monthly_reset::MonthlyResetWorker;
