//! Configuration management for the Passage orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.
//! The resulting `Settings` struct is immutable and passed explicitly into
//! every orchestrator and adapter; nothing reads configuration ambiently.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{OrchestratorError, OrchestratorResult};
use std::env;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub orchestrator: OrchestratorConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub exchange: ExchangeConfig,
    pub venue: VenueConfig,
    pub cardano: CardanoConfig,
    pub solana: SolanaConfig,
    pub keyvault: KeyVaultConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub instance_id: String,
    /// Exchange-conversion sweep cadence (settles quickly)
    pub exchange_sweep_interval_secs: u64,
    /// Venue-withdrawal sweep cadence (settles more slowly)
    pub withdrawal_sweep_interval_secs: u64,
    pub health_check_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Third-party currency-conversion gateway
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key: String,
    /// Conversion flow passed through on order creation
    pub flow: String,
}

/// Custodial trading venue REST API
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub base_url: String,
    pub broker_id: String,
    pub chain_id: u64,
    /// Verifying-contract address quoted in withdrawal-authorization messages
    pub ledger_contract: String,
    /// On-chain vault accounts for the deposit instruction (base58)
    pub vault: VaultAccounts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultAccounts {
    pub program_id: String,
    pub vault_authority: String,
    pub sol_vault: String,
    pub peer: String,
    pub enforced_options: String,
    pub oapp_config: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardanoConfig {
    /// Wallet-agent endpoint that builds, signs, and submits native transfers
    pub agent_url: String,
    pub network: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub commitment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyVaultConfig {
    /// 32-byte AES-256-GCM key, hex encoded
    pub encryption_key: String,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("PASSAGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> OrchestratorResult<()> {
        if self.exchange.base_url.is_empty() {
            return Err(OrchestratorError::Config(
                "Exchange gateway base URL must be configured".to_string(),
            ));
        }
        if self.venue.base_url.is_empty() {
            return Err(OrchestratorError::Config(
                "Venue base URL must be configured".to_string(),
            ));
        }
        if self.venue.broker_id.is_empty() {
            return Err(OrchestratorError::Config(
                "Venue broker id must be configured".to_string(),
            ));
        }
        if self.keyvault.encryption_key.len() != 64 {
            return Err(OrchestratorError::Config(
                "Key vault encryption key must be 32 bytes (64 hex chars)".to_string(),
            ));
        }
        if self.orchestrator.exchange_sweep_interval_secs == 0
            || self.orchestrator.withdrawal_sweep_interval_secs == 0
        {
            return Err(OrchestratorError::Config(
                "Sweep intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_env_var_substitutes_empty() {
        env::remove_var("PASSAGE_DOES_NOT_EXIST");
        let input = "key = \"${PASSAGE_DOES_NOT_EXIST}\"";
        assert_eq!(substitute_env_vars(input), "key = \"\"");
    }

    fn test_settings() -> Settings {
        let toml_str = r#"
            [orchestrator]
            instance_id = "test-1"
            exchange_sweep_interval_secs = 45
            withdrawal_sweep_interval_secs = 30
            health_check_interval_secs = 60

            [database]
            url = "postgres://localhost/passage"
            max_connections = 10
            min_connections = 2

            [api]
            host = "127.0.0.1"
            port = 8080

            [metrics]
            enabled = false
            port = 9090

            [exchange]
            base_url = "https://exchange.test"
            api_key = "test-key"
            flow = "standard"

            [venue]
            base_url = "https://venue.test"
            broker_id = "broker-1"
            chain_id = 900900900
            ledger_contract = "0xledgercontract"

            [venue.vault]
            program_id = "11111111111111111111111111111111"
            vault_authority = "11111111111111111111111111111111"
            sol_vault = "11111111111111111111111111111111"
            peer = "11111111111111111111111111111111"
            enforced_options = "11111111111111111111111111111111"
            oapp_config = "11111111111111111111111111111111"

            [cardano]
            agent_url = "http://localhost:3100"
            network = "preprod"

            [solana]
            rpc_url = "http://localhost:8899"
            commitment = "confirmed"

            [keyvault]
            encryption_key = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
        "#;
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_validate_accepts_complete_settings() {
        assert!(test_settings().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_config_errors() {
        let mut settings = test_settings();
        settings.venue.broker_id.clear();
        assert!(matches!(
            settings.validate(),
            Err(OrchestratorError::Config(_))
        ));

        let mut settings = test_settings();
        settings.keyvault.encryption_key = "short".to_string();
        assert!(matches!(
            settings.validate(),
            Err(OrchestratorError::Config(_))
        ));

        let mut settings = test_settings();
        settings.orchestrator.exchange_sweep_interval_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(OrchestratorError::Config(_))
        ));
    }
}
