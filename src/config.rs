//! Runtime configuration
//!
//! Built once at startup from the environment and handed to each component
//! by reference. Nothing else in the crate reads the environment.

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

//
// ================= Enums =================
//

/// Global execution posture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    ReadOnly,
    PaperTrade,
    ExecuteEnabled,
}

impl PolicyMode {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "read_only" => Ok(PolicyMode::ReadOnly),
            "paper_trade" => Ok(PolicyMode::PaperTrade),
            "execute_enabled" => Ok(PolicyMode::ExecuteEnabled),
            other => Err(OrchestrationError::Config(format!(
                "POLICY_MODE must be one of: read_only, paper_trade, execute_enabled (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataProvider {
    BscScan,
    Bitquery,
}

impl DataProvider {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "bscscan" => Ok(DataProvider::BscScan),
            "bitquery" => Ok(DataProvider::Bitquery),
            other => Err(OrchestrationError::Config(format!(
                "DATA_PROVIDER must be bscscan or bitquery (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeProvider {
    None,
    OpenAi,
    Ollama,
}

impl NarrativeProvider {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "none" | "" => Ok(NarrativeProvider::None),
            "openai" => Ok(NarrativeProvider::OpenAi),
            "ollama" => Ok(NarrativeProvider::Ollama),
            other => Err(OrchestrationError::Config(format!(
                "LLM_PROVIDER must be none, openai or ollama (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Credential wrapper that never prints its contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

//
// ================= Sections =================
//

#[derive(Debug, Clone)]
pub struct PolicySettings {
    pub mode: PolicyMode,
    pub max_position_size: f64,
    pub max_gas: u64,
    pub max_slippage_bps: u32,
    /// Upper-cased symbols.
    pub allowed_assets: BTreeSet<String>,
    /// Lower-cased verbs.
    pub allowed_actions: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub execute_live: bool,
    pub rpc_url: Option<String>,
    pub private_key: Option<Secret>,
}

#[derive(Debug, Clone)]
pub struct DataSettings {
    pub provider: DataProvider,
    pub bscscan_api_key: Option<Secret>,
    pub bscscan_endpoint: String,
    pub bitquery_api_key: Option<Secret>,
    pub bitquery_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct NarrativeSettings {
    pub provider: NarrativeProvider,
    pub api_key: Option<Secret>,
    pub api_base: String,
    pub model: String,
    pub ollama_base: String,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub wallet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub policy: PolicySettings,
    pub execution: ExecutionSettings,
    pub data: DataSettings,
    pub narrative: NarrativeSettings,
    pub ingest: IngestSettings,
    /// Caller-imposed timeout for every outbound collaborator call.
    pub collaborator_timeout: Duration,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read the process environment. Call `dotenv` first if a `.env` file should apply.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup and validate them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let mode = PolicyMode::parse(&get_or("POLICY_MODE", "paper_trade"))?;

        let policy = PolicySettings {
            mode,
            max_position_size: parse_number(&get_or("MAX_POSITION_SIZE", "25"), "MAX_POSITION_SIZE")?,
            max_gas: parse_number(&get_or("MAX_GAS", "300000"), "MAX_GAS")?,
            max_slippage_bps: parse_number(&get_or("MAX_SLIPPAGE_BPS", "100"), "MAX_SLIPPAGE_BPS")?,
            allowed_assets: split_list(&get_or("ALLOWED_ASSETS", "BNB,BUSD,USDT"))
                .map(|s| s.to_uppercase())
                .collect(),
            allowed_actions: split_list(&get_or("ALLOWED_ACTIONS", "swap,transfer"))
                .map(|s| s.to_lowercase())
                .collect(),
        };

        let execution = ExecutionSettings {
            execute_live: parse_flag(get("EXECUTE_LIVE").as_deref()),
            rpc_url: get("RPC_URL"),
            private_key: get("PRIVATE_KEY").map(Secret::new),
        };

        let data = DataSettings {
            provider: DataProvider::parse(&get_or("DATA_PROVIDER", "bscscan"))?,
            bscscan_api_key: get("BSCSCAN_API_KEY").map(Secret::new),
            bscscan_endpoint: get_or("BSCSCAN_ENDPOINT", "https://api.bscscan.com/api"),
            bitquery_api_key: get("BITQUERY_API_KEY").map(Secret::new),
            bitquery_endpoint: get_or("BITQUERY_ENDPOINT", "https://streaming.bitquery.io/graphql"),
        };

        let narrative = NarrativeSettings {
            provider: NarrativeProvider::parse(&get_or("LLM_PROVIDER", "none"))?,
            api_key: get("LLM_API_KEY").map(Secret::new),
            api_base: get_or("LLM_API_BASE", "https://api.openai.com/v1"),
            model: get_or("LLM_MODEL", "gpt-4o-mini"),
            ollama_base: get_or("OLLAMA_BASE", "http://localhost:11434"),
        };

        let interval_secs: u64 = parse_number(&get_or("INGEST_INTERVAL_SEC", "300"), "INGEST_INTERVAL_SEC")?;
        let ingest = IngestSettings {
            enabled: parse_flag(get("INGEST_ENABLED").as_deref()),
            interval: Duration::from_secs(interval_secs),
            wallet: get("INGEST_WALLET"),
        };

        let timeout_secs: u64 = parse_number(
            &get_or("COLLABORATOR_TIMEOUT_SEC", "20"),
            "COLLABORATOR_TIMEOUT_SEC",
        )?;

        let port_raw = get("PORT").or_else(|| get("API_PORT")).unwrap_or_else(|| "8080".to_string());

        let log_format = match get_or("LOG_FORMAT", "pretty").to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            "json" => LogFormat::Json,
            other => {
                return Err(OrchestrationError::Config(format!(
                    "LOG_FORMAT must be pretty, compact or json (got '{}')",
                    other
                )))
            }
        };

        let settings = Settings {
            database_url: get("DATABASE_URL"),
            policy,
            execution,
            data,
            narrative,
            ingest,
            collaborator_timeout: Duration::from_secs(timeout_secs),
            port: parse_number(&port_raw, "PORT")?,
            log_level: get_or("LOG_LEVEL", "info"),
            log_format,
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(self.policy.max_position_size.is_finite() && self.policy.max_position_size > 0.0) {
            return Err(OrchestrationError::Config(
                "MAX_POSITION_SIZE must be a positive number".to_string(),
            ));
        }
        if self.policy.max_gas == 0 {
            return Err(OrchestrationError::Config("MAX_GAS must be positive".to_string()));
        }
        if self.policy.max_slippage_bps == 0 {
            return Err(OrchestrationError::Config(
                "MAX_SLIPPAGE_BPS must be positive".to_string(),
            ));
        }
        if self.ingest.interval.is_zero() {
            return Err(OrchestrationError::Config(
                "INGEST_INTERVAL_SEC must be positive".to_string(),
            ));
        }
        if self.collaborator_timeout.is_zero() {
            return Err(OrchestrationError::Config(
                "COLLABORATOR_TIMEOUT_SEC must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| OrchestrationError::Config(format!("{} is not a valid number: '{}'", key, raw)))
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(|v| v.to_lowercase()).as_deref(), Some("true"))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.policy.mode, PolicyMode::PaperTrade);
        assert_eq!(settings.policy.max_position_size, 25.0);
        assert_eq!(settings.policy.max_gas, 300_000);
        assert_eq!(settings.policy.max_slippage_bps, 100);
        assert!(settings.policy.allowed_assets.contains("USDT"));
        assert!(settings.policy.allowed_actions.contains("transfer"));
        assert!(!settings.execution.execute_live);
        assert_eq!(settings.data.provider, DataProvider::BscScan);
        assert_eq!(settings.narrative.provider, NarrativeProvider::None);
        assert_eq!(settings.ingest.interval, Duration::from_secs(300));
        assert_eq!(settings.port, 8080);
        assert!(settings.database_url.is_none());
    }

    #[test]
    fn test_lists_are_normalized() {
        let settings = settings_from(&[
            ("ALLOWED_ASSETS", " bnb , eth,,"),
            ("ALLOWED_ACTIONS", "SWAP,Approve"),
        ])
        .unwrap();
        let assets: Vec<_> = settings.policy.allowed_assets.iter().cloned().collect();
        assert_eq!(assets, vec!["BNB".to_string(), "ETH".to_string()]);
        assert!(settings.policy.allowed_actions.contains("approve"));
        assert!(settings.policy.allowed_actions.contains("swap"));
    }

    #[test]
    fn test_invalid_policy_mode_is_fatal() {
        let err = settings_from(&[("POLICY_MODE", "yolo")]).unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
    }

    #[test]
    fn test_non_positive_limits_rejected() {
        assert!(settings_from(&[("MAX_POSITION_SIZE", "0")]).is_err());
        assert!(settings_from(&[("MAX_GAS", "abc")]).is_err());
        assert!(settings_from(&[("INGEST_INTERVAL_SEC", "0")]).is_err());
    }

    #[test]
    fn test_port_fallback_and_live_flag() {
        let settings = settings_from(&[("API_PORT", "9090"), ("EXECUTE_LIVE", "TRUE")]).unwrap();
        assert_eq!(settings.port, 9090);
        assert!(settings.execution.execute_live);
    }

    #[test]
    fn test_secrets_are_redacted() {
        let settings = settings_from(&[("PRIVATE_KEY", "deadbeef")]).unwrap();
        let printed = format!("{:?}", settings.execution);
        assert!(!printed.contains("deadbeef"));
        assert_eq!(
            settings.execution.private_key.as_ref().map(Secret::expose),
            Some("deadbeef")
        );
    }
}
