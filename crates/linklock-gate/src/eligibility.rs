use linklock_types::{AdTask, Device, Tier};

/// Stable, order-preserving filter of the catalog down to the tasks a
/// visitor must complete. A task qualifies iff it is Active, lists the
/// visitor's device, and carries a positive CPM for the visitor's tier.
/// Catalog order is kept as-is; it becomes the gate sequence.
pub fn eligible_tasks(catalog: &[AdTask], device: Device, tier: Tier) -> Vec<AdTask> {
    catalog
        .iter()
        .filter(|t| t.is_active() && t.supports(device) && !t.cpm_for(tier).is_zero())
        .cloned()
        .collect()
}
