//! Policy compliance and Advisor recommendations

use anyhow::Result;
use insights_lib::{AdvisorRecord, ComplianceRecord};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, or_dash, print_json, print_table, resource_name, OutputFormat};

const NON_COMPLIANT: &str = "NonCompliant";

#[derive(Tabled)]
struct PolicyRow {
    #[tabled(rename = "VM")]
    vm: String,
    #[tabled(rename = "Assignment")]
    assignment: String,
    #[tabled(rename = "Definition")]
    definition: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Evaluated")]
    timestamp: String,
}

#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "VM")]
    vm: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Impact")]
    impact: String,
    #[tabled(rename = "Problem")]
    problem: String,
    #[tabled(rename = "Remediation")]
    remediation: String,
}

/// Keep only non-compliant policy states, dropping VMs left without any
pub fn non_compliant_only(records: Vec<ComplianceRecord>) -> Vec<ComplianceRecord> {
    records
        .into_iter()
        .filter_map(|mut record| {
            record
                .policies
                .retain(|p| p.compliance_state.as_deref() == Some(NON_COMPLIANT));
            (!record.policies.is_empty()).then_some(record)
        })
        .collect()
}

/// Keep recommendations of one category (case-insensitive), dropping empty VMs
pub fn in_category(records: Vec<AdvisorRecord>, category: &str) -> Vec<AdvisorRecord> {
    records
        .into_iter()
        .filter_map(|mut record| {
            record.recommendations.retain(|r| {
                r.category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            });
            (!record.recommendations.is_empty()).then_some(record)
        })
        .collect()
}

/// Show the latest policy states per VM
pub async fn show_compliance(
    client: &ApiClient,
    subscription_id: &str,
    non_compliant: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut records = client.policy_compliance(subscription_id).await?;
    if non_compliant {
        records = non_compliant_only(records);
    }

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<PolicyRow> = records
                .iter()
                .flat_map(|record| {
                    let vm = resource_name(&record.resource_id).to_string();
                    record.policies.iter().map(move |p| PolicyRow {
                        vm: vm.clone(),
                        assignment: or_dash(p.policy_assignment.as_deref()),
                        definition: or_dash(p.policy_definition.as_deref()),
                        state: p
                            .compliance_state
                            .as_deref()
                            .map(color_status)
                            .unwrap_or_else(|| "-".to_string()),
                        timestamp: or_dash(p.timestamp.as_deref()),
                    })
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}

/// Show Advisor recommendations per VM
pub async fn show_advisor(
    client: &ApiClient,
    subscription_id: &str,
    category: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut records = client.advisor_recommendations(subscription_id).await?;
    if let Some(category) = &category {
        records = in_category(records, category);
    }

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<RecommendationRow> = records
                .iter()
                .flat_map(|record| {
                    let vm = resource_name(&record.resource_id).to_string();
                    record.recommendations.iter().map(move |r| RecommendationRow {
                        vm: vm.clone(),
                        category: or_dash(r.category.as_deref()),
                        impact: r
                            .impact
                            .as_deref()
                            .map(color_status)
                            .unwrap_or_else(|| "-".to_string()),
                        problem: or_dash(r.short_description.as_deref()),
                        remediation: or_dash(r.remediation.as_deref()),
                    })
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
