mod artifact;
mod logging;
mod network;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use artifact::{default_artifact_path, load_artifact};
use network::NetworkConfig;

const DEFAULT_CONTRACT: &str = "DeepfakeDetection";

/// Deploys one compiled contract (no constructor arguments) and prints its
/// address. Reads QUICKNODE_HTTP_URL and PRIVATE_KEY, from `.env` if present.
#[derive(Parser, Debug)]
#[command(name = "deploy-contract", version)]
struct Args {
    /// Contract name as it appears in the build artifacts
    #[arg(long, default_value = DEFAULT_CONTRACT)]
    contract: String,

    /// Artifact JSON; defaults to artifacts/contracts/<Name>.sol/<Name>.json
    #[arg(long)]
    artifact: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            error!("Failed to load .env: {err}");
            return ExitCode::from(1);
        }
    }

    let args = Args::parse();
    match deploy(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

async fn deploy(args: &Args) -> Result<()> {
    let network = NetworkConfig::from_env()?;
    let signer = network.signer()?;
    let deployer = signer.address();
    println!("Deploying contracts with the account: {deployer}");

    let artifact_path = args
        .artifact
        .clone()
        .unwrap_or_else(|| default_artifact_path(Path::new("."), &args.contract));
    let artifact = load_artifact(&artifact_path, &args.contract)?;
    info!(
        "Loaded {} ({} bytes of creation code)",
        artifact.name,
        artifact.bytecode.len()
    );

    let provider = ProviderBuilder::new()
        .wallet(signer)
        .connect_http(network.rpc_url.clone());

    let tx = TransactionRequest::default()
        .with_from(deployer)
        .with_deploy_code(artifact.bytecode);
    let pending = provider
        .send_transaction(tx)
        .await
        .context("Failed to send deployment transaction")?;
    info!("Deployment transaction {}", pending.tx_hash());

    let receipt = pending
        .get_receipt()
        .await
        .context("Failed to fetch deployment receipt")?;
    if !receipt.status() {
        anyhow::bail!(
            "deployment transaction {} reverted",
            receipt.transaction_hash
        );
    }

    let address = receipt
        .contract_address
        .context("receipt has no contract address")?;
    println!("Contract address: {address}");
    Ok(())
}
