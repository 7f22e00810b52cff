//! Resource Graph (KQL) query templates
//!
//! The projected column names are part of the response contract; dashboards
//! read them verbatim.

use serde::Deserialize;

/// Subscriptions below a management group
pub const SUBSCRIPTIONS_QUERY: &str = r#"
ResourceContainers
| where type == 'microsoft.resources/subscriptions'
| project subscriptionId = id, displayName = name
"#;

/// OData filter selecting virtual machines in a resource listing
pub const VM_RESOURCE_FILTER: &str = "resourceType eq 'Microsoft.Compute/virtualMachines'";

/// Hourly rates behind the Azure Hybrid Benefit estimate
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HybridBenefitRates {
    /// Cores beyond this count are not charged on the hybrid path
    pub core_cap: u32,
    /// Per-core rate with hybrid licensing applied
    pub hybrid_rate: f64,
    /// Per-core rate without hybrid licensing
    pub no_hybrid_rate: f64,
}

impl Default for HybridBenefitRates {
    fn default() -> Self {
        Self {
            core_cap: 8,
            hybrid_rate: 2.70,
            no_hybrid_rate: 13.75,
        }
    }
}

impl HybridBenefitRates {
    /// Estimate with hybrid licensing: `min(cores, cap) * hybrid_rate`
    pub fn hybrid_cost(&self, cores: u32) -> f64 {
        cores.min(self.core_cap) as f64 * self.hybrid_rate
    }

    /// Estimate without hybrid licensing: `cores * no_hybrid_rate`
    pub fn no_hybrid_cost(&self, cores: u32) -> f64 {
        cores as f64 * self.no_hybrid_rate
    }
}

/// VM inventory with size, core count, cost estimates and the remediation command
///
/// Cores are the first run of digits in the size name (`Standard_D4s_v3` -> 4);
/// sizes without digits leave `Cores` and both costs empty.
pub fn vm_inventory_query(rates: &HybridBenefitRates) -> String {
    let cap = rates.core_cap;
    let hybrid = format_rate(rates.hybrid_rate);
    let no_hybrid = format_rate(rates.no_hybrid_rate);

    format!(
        r#"
resources
| where type == "microsoft.compute/virtualmachines"
| extend VMSize = tostring(properties.hardwareProfile.vmSize)
| extend Cores = toint(extract("([0-9]+)", 1, VMSize))
| extend HybridBenefitCost = iff(Cores >= {cap}, {cap} * {hybrid}, Cores * {hybrid}),
         NoHybridCost = Cores * {no_hybrid}
| extend PowerState = properties.extended.instanceView.powerState.code
| project VMName = name, ResourceGroup = resourceGroup, VMSize, Cores,
          OperatingSystem = properties.storageProfile.osDisk.osType,
          HybridBenefitStatus = coalesce(tostring(properties.licenseType), "None"),
          HybridBenefitCost, NoHybridCost, PowerState,
          ApplyHybridBenefitCommand = strcat(
              "az vm update --resource-group ", resourceGroup, " --name ", name, " --set licenseType=Windows_Server"
          ),
          tags
| order by VMName asc
"#
    )
}

/// Rates render with two decimals (`2.70`) so the default template is stable
fn format_rate(rate: f64) -> String {
    format!("{rate:.2}")
}
