//! VM inventory and hybrid benefit savings

use anyhow::Result;
use colored::Colorize;
use insights_lib::VirtualMachineRecord;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, format_currency, or_dash, print_json, print_table, OutputFormat};

/// License types that already carry the hybrid benefit
const HYBRID_LICENSES: &[&str] = &["Windows_Server", "Windows_Client", "RHEL_BYOS", "SLES_BYOS"];

#[derive(Tabled)]
struct VirtualMachineRow {
    #[tabled(rename = "VM")]
    name: String,
    #[tabled(rename = "Resource Group")]
    resource_group: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Cores")]
    cores: String,
    #[tabled(rename = "OS")]
    os: String,
    #[tabled(rename = "Power State")]
    power_state: String,
    #[tabled(rename = "Hybrid Benefit")]
    hybrid_benefit: String,
    #[tabled(rename = "Est. Cost")]
    cost: String,
}

/// Totals across a VM inventory
#[derive(Debug, Default, PartialEq)]
pub struct CostSummary {
    pub vm_count: usize,
    pub total_cores: i64,
    /// What the VMs cost with their current licensing
    pub current_cost: f64,
    /// Saving if every VM without the benefit enabled it
    pub potential_savings: f64,
    pub vms_without_benefit: usize,
}

fn has_hybrid_benefit(vm: &VirtualMachineRecord) -> bool {
    vm.hybrid_benefit_status
        .as_deref()
        .is_some_and(|status| HYBRID_LICENSES.contains(&status))
}

/// Current estimate of one VM: the hybrid price when licensed, otherwise the full price
fn current_cost(vm: &VirtualMachineRecord) -> Option<f64> {
    if has_hybrid_benefit(vm) {
        vm.hybrid_benefit_cost
    } else {
        vm.no_hybrid_cost
    }
}

pub fn summarize_costs(vms: &[VirtualMachineRecord]) -> CostSummary {
    vms.iter().fold(
        CostSummary {
            vm_count: vms.len(),
            ..Default::default()
        },
        |mut summary, vm| {
            summary.total_cores += vm.cores.unwrap_or(0);
            summary.current_cost += current_cost(vm).unwrap_or(0.0);

            if !has_hybrid_benefit(vm) {
                if let (Some(full), Some(hybrid)) = (vm.no_hybrid_cost, vm.hybrid_benefit_cost) {
                    summary.vms_without_benefit += 1;
                    summary.potential_savings += full - hybrid;
                }
            }
            summary
        },
    )
}

/// List VMs with cost estimates and the savings hybrid licensing would bring
pub async fn list_virtual_machines(
    client: &ApiClient,
    subscription_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let vms = client.virtual_machines(subscription_id).await?;

    if let OutputFormat::Json = format {
        return print_json(&vms);
    }

    let rows: Vec<VirtualMachineRow> = vms
        .iter()
        .map(|vm| VirtualMachineRow {
            name: or_dash(vm.vm_name.as_deref()),
            resource_group: or_dash(vm.resource_group.as_deref()),
            size: or_dash(vm.vm_size.as_deref()),
            cores: or_dash(vm.cores),
            os: or_dash(vm.operating_system.as_deref()),
            power_state: vm
                .power_state
                .as_deref()
                .map(|state| color_status(state.trim_start_matches("PowerState/")))
                .unwrap_or_else(|| "-".to_string()),
            hybrid_benefit: or_dash(vm.hybrid_benefit_status.as_deref()),
            cost: or_dash(current_cost(vm).map(format_currency)),
        })
        .collect();
    print_table(&rows);

    if vms.is_empty() {
        return Ok(());
    }

    let summary = summarize_costs(&vms);
    println!();
    println!("{}", "Cost Summary".bold());
    println!("{}", "-".repeat(50));
    println!("VMs:                    {}", summary.vm_count);
    println!("Cores:                  {}", summary.total_cores);
    println!("Estimated cost:         {}", format_currency(summary.current_cost));
    println!(
        "{} {} ({} VMs without hybrid benefit)",
        "Potential Savings:".bold(),
        format_currency(summary.potential_savings).green().bold(),
        summary.vms_without_benefit
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(name: &str, cores: i64, license: &str) -> VirtualMachineRecord {
        let hybrid = cores.min(8) as f64 * 2.70;
        VirtualMachineRecord {
            vm_name: Some(name.to_string()),
            resource_group: Some("rg-app".to_string()),
            vm_size: Some(format!("Standard_D{cores}s_v3")),
            cores: Some(cores),
            operating_system: Some("Windows".to_string()),
            hybrid_benefit_status: Some(license.to_string()),
            hybrid_benefit_cost: Some(hybrid),
            no_hybrid_cost: Some(cores as f64 * 13.75),
            power_state: Some("PowerState/running".to_string()),
            apply_hybrid_benefit_command: None,
            tags: None,
        }
    }

    #[test]
    fn test_summary_counts_only_unlicensed_savings() {
        let vms = vec![vm("app-01", 4, "None"), vm("app-02", 16, "Windows_Server")];

        let summary = summarize_costs(&vms);

        assert_eq!(summary.vm_count, 2);
        assert_eq!(summary.total_cores, 20);
        assert_eq!(summary.vms_without_benefit, 1);
        // 4 * 13.75 unlicensed + 8 * 2.70 licensed
        assert!((summary.current_cost - (55.0 + 21.6)).abs() < 1e-9);
        assert!((summary.potential_savings - (55.0 - 10.8)).abs() < 1e-9);
    }

    #[test]
    fn test_summary_skips_sizes_without_cores() {
        let mut odd = vm("odd-01", 0, "None");
        odd.cores = None;
        odd.hybrid_benefit_cost = None;
        odd.no_hybrid_cost = None;

        let summary = summarize_costs(&[odd]);

        assert_eq!(summary.vm_count, 1);
        assert_eq!(summary.vms_without_benefit, 0);
        assert_eq!(summary.current_cost, 0.0);
    }
}
