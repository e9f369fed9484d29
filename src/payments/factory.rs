//! Provider registry built once at startup from the environment.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::providers::{BankTransferProvider, MpesaProvider};
use crate::payments::types::{PaymentMethod, ProviderName};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub struct ProviderFactory {
    providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
}

impl ProviderFactory {
    /// Build the registry from `ENABLED_PROVIDERS` (comma-separated,
    /// default `mpesa,bank`). A provider listed but missing its
    /// configuration fails startup rather than failing the first payment.
    pub fn from_env() -> PaymentResult<Self> {
        let enabled = std::env::var("ENABLED_PROVIDERS")
            .unwrap_or_else(|_| "mpesa,bank".to_string());

        let mut providers: HashMap<ProviderName, Arc<dyn PaymentProvider>> = HashMap::new();
        for entry in enabled.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let name = ProviderName::from_str(entry)?;
            let provider: Arc<dyn PaymentProvider> = match name {
                ProviderName::Mpesa => Arc::new(MpesaProvider::from_env()?),
                ProviderName::Bank => Arc::new(BankTransferProvider::from_env()),
            };
            info!(provider = %name, "provider_registered");
            providers.insert(name, provider);
        }

        if providers.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "no payment providers enabled".to_string(),
                field: Some("ENABLED_PROVIDERS".to_string()),
            });
        }
        Ok(Self { providers })
    }

    /// Registry with explicit instances, used by composition roots and
    /// tests that inject mocks.
    pub fn with_providers(instances: Vec<Arc<dyn PaymentProvider>>) -> Self {
        let providers = instances
            .into_iter()
            .map(|provider| (provider.name(), provider))
            .collect();
        Self { providers }
    }

    pub fn get(&self, name: ProviderName) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.providers
            .get(&name)
            .cloned()
            .ok_or_else(|| PaymentError::ValidationError {
                message: format!("provider not enabled: {name}"),
                field: Some("provider".to_string()),
            })
    }

    pub fn for_method(&self, method: PaymentMethod) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.get(method.provider())
    }

    pub fn enabled(&self) -> Vec<ProviderName> {
        self.providers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::providers::{BankConfig, BankTransferProvider};

    #[test]
    fn factory_resolves_method_to_provider() {
        let factory = ProviderFactory::with_providers(vec![Arc::new(
            BankTransferProvider::new(BankConfig {
                bank_name: "Test Bank".to_string(),
                account_name: "Test".to_string(),
                account_number: "1".to_string(),
                branch_code: "001".to_string(),
                swift_code: "TESTKENX".to_string(),
                reference_prefix: "PAY".to_string(),
            }),
        )]);

        let provider = factory.for_method(PaymentMethod::BankTransfer).unwrap();
        assert_eq!(provider.name(), ProviderName::Bank);
        assert!(factory.for_method(PaymentMethod::MpesaStk).is_err());
    }
}
