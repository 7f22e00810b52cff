//! Management group and subscription listings

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{or_dash, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct ManagementGroupRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
    #[tabled(rename = "ID")]
    id: String,
}

#[derive(Tabled)]
struct SubscriptionRow {
    #[tabled(rename = "Subscription")]
    subscription_id: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
}

/// List management groups below `parent` (the root group when absent)
pub async fn list_management_groups(
    client: &ApiClient,
    parent: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let groups = client.management_groups(parent.as_deref()).await?;

    match format {
        OutputFormat::Json => print_json(&groups)?,
        OutputFormat::Table => {
            let rows: Vec<ManagementGroupRow> = groups
                .into_iter()
                .map(|g| ManagementGroupRow {
                    name: or_dash(g.name),
                    display_name: or_dash(g.display_name),
                    id: or_dash(g.id),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}

/// List subscriptions under a management group
pub async fn list_subscriptions(
    client: &ApiClient,
    management_group: &str,
    format: OutputFormat,
) -> Result<()> {
    let subscriptions = client.subscriptions(management_group).await?;

    match format {
        OutputFormat::Json => print_json(&subscriptions)?,
        OutputFormat::Table => {
            let rows: Vec<SubscriptionRow> = subscriptions
                .into_iter()
                .map(|s| SubscriptionRow {
                    subscription_id: or_dash(s.subscription_id),
                    display_name: or_dash(s.display_name),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
