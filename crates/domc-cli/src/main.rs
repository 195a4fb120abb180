use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use domc_client::{ConditionApi, HttpClientConfig, HttpConditionApi};
use domc_console::{ConditionTable, ConsoleConfig, MutationOutcome};
use domc_core::{ConditionDraft, ConditionRecord, OfferLanguage};

#[derive(Debug, Parser)]
#[command(name = "domc")]
#[command(about = "Dispatch offer-matching operator console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show one page of condition sets, optionally filtered.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Show incoming ride offers.
    Offers {
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Create a condition set.
    Create {
        #[arg(long)]
        service_class: String,
        #[arg(long)]
        pickup: String,
        #[arg(long)]
        dropoff: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Update a condition set by id.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        service_class: String,
        #[arg(long)]
        pickup: String,
        #[arg(long)]
        dropoff: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Delete a condition set by id.
    Delete {
        #[arg(long)]
        id: i64,
    },
}

fn print_row(record: &ConditionRecord) {
    println!(
        "{:>6} | {:<12} | {:<24} | {:<24} | {:<8} | {:>5}",
        record.id,
        record.service_class,
        record.pickup_address,
        record.dropoff_address,
        record.status.as_deref().unwrap_or("-"),
        record.count
    );
}

fn draft_from(
    service_class: String,
    pickup: String,
    dropoff: String,
    status: Option<String>,
    count: u32,
) -> ConditionDraft {
    ConditionDraft {
        service_class,
        pickup_address: pickup,
        dropoff_address: dropoff,
        status,
        count,
    }
}

fn table_error(table: &ConditionTable) -> String {
    table
        .error()
        .unwrap_or("request failed for an unknown reason")
        .to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ConsoleConfig::from_env();
    let api = Arc::new(HttpConditionApi::new(HttpClientConfig {
        base_url: config.base_url.clone(),
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: Some(config.user_agent.clone()),
    })?);
    let mut table = ConditionTable::new(api.clone(), config.per_page);

    match cli.command {
        Commands::List { page, query } => {
            if !table.mount().await {
                bail!("loading page 1: {}", table_error(&table));
            }
            if page > 1 {
                if !table.page().contains(page) {
                    bail!(
                        "page {page} is out of range (1..={})",
                        table.page().total_pages
                    );
                }
                if !table.load_page(page).await {
                    bail!("loading page {page}: {}", table_error(&table));
                }
            }
            table.set_query(query);
            if table.shows_empty_state() {
                println!("no condition sets match the current filter");
            } else {
                for record in table.visible_rows() {
                    print_row(record);
                }
            }
            let paging = table.page();
            println!("Page {} of {}", paging.current_page, paging.total_pages);
        }
        Commands::Offers { language } => {
            let language = match language.as_str() {
                "de" | "DE" => OfferLanguage::De,
                "en" | "EN" => OfferLanguage::En,
                other => bail!("unknown language {other:?}; expected de or en"),
            };
            let offers = api
                .list_offers()
                .await
                .map_err(|err| anyhow::anyhow!(err.surface_message()))?;
            for offer in &offers {
                println!(
                    "{:<12} | {:<28} | {:<28}",
                    offer.service_class,
                    offer.pickup_address.localized(language),
                    offer.dropoff_address.localized(language)
                );
            }
            println!("{} incoming offers", offers.len());
        }
        Commands::Create {
            service_class,
            pickup,
            dropoff,
            status,
            count,
        } => {
            let draft = draft_from(service_class, pickup, dropoff, status, count);
            match table.create(draft).await {
                MutationOutcome::Applied => {
                    let id = table.records().last().map(|r| r.id).unwrap_or_default();
                    println!("created condition set {id}");
                }
                _ => bail!("create failed: {}", table_error(&table)),
            }
        }
        Commands::Update {
            id,
            service_class,
            pickup,
            dropoff,
            status,
            count,
        } => {
            if !table.mount().await {
                bail!("loading current page: {}", table_error(&table));
            }
            let draft = draft_from(service_class, pickup, dropoff, status, count);
            match table.update(id, draft).await {
                MutationOutcome::Applied => println!("updated condition set {id}"),
                _ => bail!("update failed: {}", table_error(&table)),
            }
        }
        Commands::Delete { id } => {
            match table.delete(id).await {
                MutationOutcome::Applied => println!("deleted condition set {id}"),
                MutationOutcome::Rejected => bail!("another delete is already in flight"),
                MutationOutcome::Failed => bail!("delete failed: {}", table_error(&table)),
            }
        }
    }

    Ok(())
}
