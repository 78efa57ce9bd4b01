//! veridesk CLI entry point.

mod cli;

use clap::Parser;
use cli::{parse_inputs, Cli, Command};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use veridesk::{DocumentType, Gateway, GatewayConfig, VerificationRequest};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("veridesk v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.gateway_config()?;

    match cli.command {
        Command::Verify {
            tenant,
            user,
            doc_type,
            inputs,
            fund,
        } => {
            let doc_type: DocumentType = doc_type.parse()?;
            let inputs = parse_inputs(&inputs)?;
            let gateway = Gateway::builder(config).build()?;
            if let Some(amount) = fund {
                gateway.top_up(&tenant, amount)?;
            }
            let outcome = gateway
                .verify(VerificationRequest {
                    tenant_id: tenant,
                    user_id: user,
                    doc_type,
                    inputs,
                    batch_id: None,
                })
                .await?;
            if let Some(job_id) = outcome.job_id {
                println!("queued: {job_id}");
            } else if let Some(verification_id) = outcome.verification_id {
                let verdict = if outcome.result.is_valid { "VALID" } else { "FAILED" };
                println!("{verification_id}: {verdict}");
                if let Some(error) = outcome.result.error {
                    println!("  reason: {error}");
                }
            }
            println!("balance: {}", outcome.balance);
        }
        Command::Balance { tenant } => {
            let gateway = Gateway::builder(config).build()?;
            println!("{}", gateway.balance(&tenant));
        }
        Command::TopUp { tenant, amount } => {
            let gateway = Gateway::builder(config).build()?;
            let balance = gateway.top_up(&tenant, amount)?;
            println!("balance: {balance}");
        }
        Command::InitConfig { path } => {
            let path = path.unwrap_or_else(GatewayConfig::default_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            config.to_file(&path)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
