pub mod bank;
pub mod mpesa;

pub use bank::{BankConfig, BankTransferProvider};
pub use mpesa::{MpesaConfig, MpesaProvider, StkPushRequest};
