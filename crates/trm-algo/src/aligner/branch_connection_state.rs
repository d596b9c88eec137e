use super::{AlignmentReport, OperationalConditionAligner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use trm_core::{Network, Side, TrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchConnectionStatus {
    Aligned,
    /// Side 1 of the reference branch is side 2 of the market-based branch
    AlignedWithSwappedSides,
    /// Terminal voltage levels do not correspond, nothing copied
    VoltageLevelMismatch,
}

/// Copies terminal connection states of every branch present in both
/// networks, matching terminals by voltage level.
#[derive(Debug, Clone, Default)]
pub struct BranchConnectionStateAligner;

impl BranchConnectionStateAligner {
    pub fn new() -> Self {
        Self
    }
}

fn terminal_voltage_levels(network: &Network, id: &str) -> Option<(String, String)> {
    let branch = network.branch(id)?;
    let vl1 = network.voltage_level_of(&branch.terminal1.bus_id)?;
    let vl2 = network.voltage_level_of(&branch.terminal2.bus_id)?;
    Some((vl1.to_string(), vl2.to_string()))
}

impl OperationalConditionAligner for BranchConnectionStateAligner {
    fn name(&self) -> &str {
        "branch-connection-state"
    }

    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport> {
        let mut ids: Vec<String> = market.branches().into_iter().map(|b| b.id.clone()).collect();
        ids.sort();

        let mut result = BTreeMap::new();
        for id in ids {
            let Some(reference_branch) = reference.branch(&id) else {
                debug!(branch = id.as_str(), "branch absent from reference network");
                continue;
            };
            let (Some(reference_levels), Some(market_levels)) = (
                terminal_voltage_levels(reference, &id),
                terminal_voltage_levels(market, &id),
            ) else {
                continue;
            };

            let (status, market_sides) = if reference_levels == market_levels {
                (BranchConnectionStatus::Aligned, [Side::One, Side::Two])
            } else if reference_levels.0 == market_levels.1 && reference_levels.1 == market_levels.0 {
                (BranchConnectionStatus::AlignedWithSwappedSides, [Side::Two, Side::One])
            } else {
                warn!(
                    branch = id.as_str(),
                    reference = ?reference_levels,
                    market_based = ?market_levels,
                    "terminal voltage levels do not correspond, connection state not aligned"
                );
                result.insert(id, BranchConnectionStatus::VoltageLevelMismatch);
                continue;
            };

            let connected = [
                reference_branch.terminal1.connected,
                reference_branch.terminal2.connected,
            ];
            if let Some(market_branch) = market.branch_mut(&id) {
                for (side, state) in market_sides.into_iter().zip(connected) {
                    market_branch.terminal_mut(side).connected = state;
                }
            }
            result.insert(id, status);
        }
        Ok(AlignmentReport::BranchConnectionState(result))
    }
}
