//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use veridesk::GatewayConfig;

/// Document verification gateway for multi-tenant onboarding flows.
#[derive(Parser, Debug)]
#[command(name = "veridesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "VERIDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Gateway subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one verification.
    Verify {
        /// Tenant whose wallet funds the check.
        #[arg(long)]
        tenant: String,

        /// User requesting the check.
        #[arg(long, default_value = "cli")]
        user: String,

        /// Document type label, e.g. TAX_ID or DRIVING_LICENSE.
        #[arg(long)]
        doc_type: String,

        /// Type-specific input as key=value. Repeatable.
        #[arg(long = "input", short)]
        inputs: Vec<String>,

        /// Credit the tenant wallet with this amount before the check.
        /// Wallet state lives in memory for the life of the process, so
        /// an unfunded tenant is rejected without this.
        #[arg(long)]
        fund: Option<i64>,
    },

    /// Show a tenant's wallet balance.
    Balance {
        /// Tenant to inspect.
        #[arg(long)]
        tenant: String,
    },

    /// Credit a tenant's wallet.
    TopUp {
        /// Tenant to credit.
        #[arg(long)]
        tenant: String,

        /// Amount in minor currency units.
        #[arg(long)]
        amount: i64,
    },

    /// Write a default configuration file.
    InitConfig {
        /// Destination path. Defaults to the platform config directory.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    /// Convert CLI arguments into a GatewayConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn gateway_config(&self) -> color_eyre::Result<GatewayConfig> {
        let mut config = if let Some(ref path) = self.config {
            GatewayConfig::from_file(path)?
        } else {
            GatewayConfig::default()
        };
        config.log_level.clone_from(&self.log_level);
        Ok(config)
    }
}

/// Parse a repeated `key=value` input flag into pairs.
///
/// # Errors
///
/// Returns an error for an entry with no `=`.
pub fn parse_inputs(raw: &[String]) -> color_eyre::Result<veridesk::Inputs> {
    let mut inputs = veridesk::Inputs::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| color_eyre::eyre::eyre!("input {entry:?} is not key=value"))?;
        inputs.insert(key.to_string(), value.to_string());
    }
    Ok(inputs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_a_wallet_pre_credit() {
        let cli = Cli::try_parse_from([
            "veridesk",
            "verify",
            "--tenant",
            "t1",
            "--doc-type",
            "TAX_ID",
            "--fund",
            "500",
            "-i",
            "id_number=ABCDE1234F",
        ])
        .expect("parse");
        match cli.command {
            Command::Verify { tenant, fund, inputs, .. } => {
                assert_eq!(tenant, "t1");
                assert_eq!(fund, Some(500));
                let inputs = parse_inputs(&inputs).expect("inputs");
                assert_eq!(inputs.get("id_number").map(String::as_str), Some("ABCDE1234F"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn malformed_input_pairs_are_rejected() {
        assert!(parse_inputs(&["no-equals".to_string()]).is_err());
    }
}
