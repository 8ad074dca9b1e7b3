//! # Node Configuration
//!
//! The TOML file describing one simulated network:
//!
//! ```toml
//! notary = "Notary"
//!
//! [ledger]
//! time_window_ms = 10000
//! counterparty_timeout_ms = 30000
//!
//! [whitelist]
//! issuers = ["Bank"]
//!
//! [[parties]]
//! name = "Bank"
//! policy = "whitelist"
//!
//! [[parties]]
//! name = "Corp"
//!
//! [[issuances]]
//! owner = "Corp"
//! issuer = "Bank"
//! content = "thought-1"
//!
//! [[transfers]]
//! from = "Corp"
//! to = "Bank"
//! content = "thought-1"
//! issuer = "Bank"
//! ```

use anyhow::{bail, Context, Result};
use asset_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_notary")]
    pub notary: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub parties: Vec<PartyConfig>,
    #[serde(default)]
    pub issuances: Vec<IssuanceStep>,
    #[serde(default)]
    pub transfers: Vec<TransferStep>,
}

fn default_notary() -> String {
    "Notary".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistConfig {
    #[serde(default)]
    pub issuers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Sign anything the contract accepts.
    #[default]
    AcceptAll,
    /// Sign only for whitelisted issuers, and only as the issuer.
    Whitelist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    pub name: String,
    #[serde(default)]
    pub policy: PolicyKind,
    /// Hex Ed25519 seed. A fresh key is generated when absent.
    #[serde(default)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceStep {
    pub owner: String,
    pub issuer: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStep {
    pub from: String,
    pub to: String,
    pub content: String,
    pub issuer: String,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(raw).context("failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks only. Whether a step commits is the ledger's call.
    pub fn validate(&self) -> Result<()> {
        if self.parties.is_empty() {
            bail!("at least one [[parties]] entry is required");
        }
        if self.ledger.inbox_capacity == 0 {
            bail!("ledger.inbox_capacity must be positive");
        }

        let mut names = BTreeSet::new();
        for party in &self.parties {
            if party.name.trim().is_empty() {
                bail!("party names must not be empty");
            }
            if !names.insert(party.name.as_str()) {
                bail!("duplicate party name {:?}", party.name);
            }
            if party.name == self.notary {
                bail!("party {:?} has the same name as the notary", party.name);
            }
        }

        let known = |name: &str, role: &str| -> Result<()> {
            if names.contains(name) {
                Ok(())
            } else {
                bail!("{} {:?} is not a configured party", role, name)
            }
        };
        for step in &self.issuances {
            known(&step.owner, "issuance owner")?;
            known(&step.issuer, "issuance issuer")?;
        }
        for step in &self.transfers {
            known(&step.from, "transfer sender")?;
            known(&step.to, "transfer recipient")?;
            known(&step.issuer, "transfer issuer")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    const SAMPLE: &str = r#"
notary = "Notary"

[ledger]
time_window_ms = 5000

[whitelist]
issuers = ["Bank"]

[[parties]]
name = "Bank"
policy = "whitelist"

[[parties]]
name = "Corp"

[[issuances]]
owner = "Corp"
issuer = "Bank"
content = "thought-1"

[[transfers]]
from = "Corp"
to = "Bank"
content = "thought-1"
issuer = "Bank"
"#;

    #[test]
    fn parses_sample() {
        let config = NodeConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.notary, "Notary");
        assert_eq!(config.ledger.time_window(), Duration::from_millis(5000));
        assert_eq!(
            config.ledger.counterparty_timeout(),
            LedgerConfig::default().counterparty_timeout()
        );
        assert_eq!(config.whitelist.issuers, vec!["Bank".to_string()]);
        assert_eq!(config.parties[0].policy, PolicyKind::Whitelist);
        assert_eq!(config.parties[1].policy, PolicyKind::AcceptAll);
        assert_eq!(config.issuances.len(), 1);
        assert_eq!(config.transfers[0].to, "Bank");
    }

    #[test]
    fn rejects_unknown_party_in_script() {
        let raw = r#"
[[parties]]
name = "Corp"

[[issuances]]
owner = "Corp"
issuer = "Bank"
content = "x"
"#;
        let err = NodeConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("Bank"));
    }

    #[test]
    fn rejects_duplicates_and_notary_clash() {
        let dup = "[[parties]]\nname = \"A\"\n[[parties]]\nname = \"A\"\n";
        assert!(NodeConfig::parse(dup).is_err());

        let clash = "notary = \"A\"\n[[parties]]\nname = \"A\"\n";
        assert!(NodeConfig::parse(clash).is_err());

        assert!(NodeConfig::parse("").is_err());
    }

    #[test]
    fn load_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        assert!(NodeConfig::load(file.path()).is_ok());

        let missing = NodeConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(format!("{:#}", missing).contains("/definitely/not/here.toml"));
    }
}
