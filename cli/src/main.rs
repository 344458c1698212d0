//! abitopics CLI: resolve one contract's event topics and merge them into the
//! warehouse.
//!
//! ```text
//! abitopics <chain> <address>
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use abitopics_core::{Chain, ContractRef, ExplorerApi, TopicAccumulator};
use abitopics_evm::{AbiReader, ContractReport, ProxyOutcome};
use abitopics_explorer::ExplorerClient;
use abitopics_observability::init_tracing;

mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "abitopics",
    about = "Fetch a contract's ABI, follow proxies, and store its event topics",
    long_about = "
abitopics: fetch a verified contract's ABI from an Etherscan-compatible
explorer, follow EIP-1967 / OpenZeppelin proxies to the implementation, derive
every event's keccak256 topic, and upsert the results into the warehouse on
(topic, topic_length, data_length).

CHAINS:
  ethereum, polygon, binance, avalanche, arbitrum, optimism, fantom

ENVIRONMENT VARIABLES:
  ETHERSCAN_API_KEY, POLYGONSCAN_API_KEY, BSCSCAN_API_KEY, SNOWTRACE_API_KEY,
  ARBISCAN_API_KEY, OPTIMISTIC_ETHERSCAN_API_KEY, FTMSCAN_API_KEY
                           explorer API key for the chain being read
  ABITOPICS_DATABASE_URL   warehouse URL (default sqlite:./topic_abis.db)
  ABITOPICS_CONFIG         YAML config file
  ABITOPICS_LOG            log directive, e.g. info,abitopics_explorer=debug
  ABITOPICS_LOG_JSON       emit JSON logs when set
",
    version
)]
struct Cli {
    /// Chain slug, e.g. `ethereum`
    chain: String,
    /// Contract address (0x-prefixed, 20 bytes)
    address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    init_tracing(&config.log);

    let result = run(&cli, config).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "run failed");
    }
    result
}

async fn run(cli: &Cli, config: AppConfig) -> Result<()> {
    let chain: Chain = cli.chain.parse()?;
    let contract = ContractRef::new(chain, &cli.address)?;

    let client = ExplorerClient::new(config.explorer.clone())?;
    client.require_credentials(chain)?;
    let explorer: Arc<dyn ExplorerApi> = Arc::new(client);
    let reader = AbiReader::new(explorer, config.reader.clone());

    let mut acc = TopicAccumulator::new();
    let report = reader
        .collect(&contract, &mut acc)
        .await
        .with_context(|| format!("reading {contract}"))?;
    print_contract(&report);

    let sink = abitopics_warehouse::open_sink(&config.warehouse.url, &config.warehouse.table)
        .await
        .context("opening warehouse")?;
    let records = acc.drain();
    let merge = sink
        .merge(&records)
        .await
        .with_context(|| format!("merging into {} ({})", config.warehouse.table, sink.backend()))?;

    info!(
        backend = sink.backend(),
        table = %config.warehouse.table,
        staged = merge.staged,
        inserted = merge.inserted,
        updated = merge.updated,
        rejected = merge.rejected.len(),
        "warehouse merge finished"
    );
    println!(
        "Merged into {}: {} inserted, {} updated, {} rejected",
        config.warehouse.table,
        merge.inserted,
        merge.updated,
        merge.rejected.len()
    );

    for row in &merge.rejected {
        error!(index = row.index, topic = %row.topic, reason = %row.reason, "row rejected");
    }
    if !merge.is_clean() {
        bail!("{} row(s) rejected by the warehouse", merge.rejected.len());
    }
    Ok(())
}

fn print_contract(report: &ContractReport) {
    println!("Contract: {}", report.contract);
    match &report.proxy {
        ProxyOutcome::NotProxy => {}
        ProxyOutcome::Followed { implementation, slot } => {
            println!("Proxy:    implementation {implementation} (slot {})", slot.position())
        }
        ProxyOutcome::Unresolved => {
            println!("Proxy:    unresolved, using the contract's own ABI")
        }
    }
    if !report.abi_available {
        println!("ABI:      not available from the explorer");
    }
    println!("Events:   {} ({} stored)", report.events_derived, report.records.len());
    for record in &report.records {
        println!(
            "  {:66} {:32} topics={} data={}",
            record.topic.as_hex(),
            record.name,
            record.topic_length,
            record.data_length
        );
    }
}
