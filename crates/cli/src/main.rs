//! VM Insights CLI
//!
//! A command-line tool for browsing management groups, VM inventory,
//! compliance, Advisor recommendations and utilisation served by the
//! insights service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{directory, governance, inventory, usage};

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// VM Insights CLI
#[derive(Parser)]
#[command(name = "vmi")]
#[command(author, version, about = "CLI for Azure VM Insights", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via VMI_API_URL env var)
    #[arg(long, env = "VMI_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List child management groups
    MgmtGroups {
        /// Parent management group (defaults to the tenant root group)
        #[arg(long)]
        parent: Option<String>,
    },

    /// List subscriptions under a management group
    Subscriptions {
        /// Management group name
        #[arg(long)]
        mgmt: String,
    },

    /// List virtual machines with cost estimates and hybrid benefit savings
    Vms {
        /// Subscription ID (defaults to the configured subscription)
        #[arg(long, short)]
        subscription: Option<String>,
    },

    /// Show hours each VM was available
    Runtime {
        #[arg(long, short)]
        subscription: Option<String>,

        /// Lookback window in days
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Show the latest policy compliance states
    Compliance {
        #[arg(long, short)]
        subscription: Option<String>,

        /// Only show non-compliant policies
        #[arg(long)]
        non_compliant: bool,
    },

    /// Show Advisor recommendations per VM
    Advisor {
        #[arg(long, short)]
        subscription: Option<String>,

        /// Filter by category (e.g. Cost, Security, HighAvailability)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show CPU and available memory metrics
    Metrics {
        #[arg(long, short)]
        subscription: Option<String>,

        /// Lookback window in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,

        /// Show five-minute series instead of summaries
        #[arg(long)]
        timeseries: bool,
    },

    /// Show or update the CLI configuration
    Config {
        /// Subscription used when --subscription is omitted
        #[arg(long)]
        subscription: Option<String>,

        /// API endpoint URL to store
        #[arg(long = "set-api-url")]
        set_api_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run(Cli::parse()).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::Config::load()?;

    match cli.command {
        Commands::Config {
            subscription,
            set_api_url,
        } => configure(settings, subscription, set_api_url),
        command => {
            let api_url = cli
                .api_url
                .or_else(|| settings.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string());
            let client = client::ApiClient::new(&api_url)?;
            query(&client, &settings, command, cli.format).await
        }
    }
}

async fn query(
    client: &client::ApiClient,
    settings: &config::Config,
    command: Commands,
    format: output::OutputFormat,
) -> Result<()> {
    match command {
        Commands::MgmtGroups { parent } => {
            directory::list_management_groups(client, parent, format).await
        }
        Commands::Subscriptions { mgmt } => directory::list_subscriptions(client, &mgmt, format).await,
        Commands::Vms { subscription } => {
            let subscription = settings.resolve_subscription(subscription)?;
            inventory::list_virtual_machines(client, &subscription, format).await
        }
        Commands::Runtime { subscription, days } => {
            let subscription = settings.resolve_subscription(subscription)?;
            usage::show_runtime(client, &subscription, days, format).await
        }
        Commands::Compliance {
            subscription,
            non_compliant,
        } => {
            let subscription = settings.resolve_subscription(subscription)?;
            governance::show_compliance(client, &subscription, non_compliant, format).await
        }
        Commands::Advisor {
            subscription,
            category,
        } => {
            let subscription = settings.resolve_subscription(subscription)?;
            governance::show_advisor(client, &subscription, category, format).await
        }
        Commands::Metrics {
            subscription,
            hours,
            timeseries,
        } => {
            let subscription = settings.resolve_subscription(subscription)?;
            usage::show_metrics(client, &subscription, hours, timeseries, format).await
        }
        Commands::Config { .. } => configure(settings.clone(), None, None),
    }
}

/// Print the configuration, or store the given values
fn configure(
    mut settings: config::Config,
    subscription: Option<String>,
    api_url: Option<String>,
) -> Result<()> {
    if subscription.is_none() && api_url.is_none() {
        return output::print_json(&settings);
    }
    if subscription.is_some() {
        settings.default_subscription = subscription;
    }
    if api_url.is_some() {
        settings.api_url = api_url;
    }

    let path = settings.save()?;
    output::print_success(&format!("Saved configuration to {}", path.display()));
    Ok(())
}
