use super::load_flow::LoadFlowParameters;
use crate::{Country, Network, Scalable, TrmResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One area of a balance computation: a country, the net position it must
/// reach and the generation allowed to move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceArea {
    pub name: String,
    pub country: Country,
    pub target_net_position_mw: f64,
    pub scalable: Scalable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceAdjustmentParameters {
    /// Maximum number of scale-then-load-flow iterations
    pub max_iterations: usize,
    /// Accepted net position mismatch per area (MW)
    pub threshold_net_position_mw: f64,
    pub load_flow: LoadFlowParameters,
}

impl Default for BalanceAdjustmentParameters {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            threshold_net_position_mw: 1.0,
            load_flow: LoadFlowParameters::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceComputationStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceComputationResult {
    pub status: BalanceComputationStatus,
    pub iteration_count: usize,
    /// Remaining mismatch per area name (MW)
    pub balances: BTreeMap<String, f64>,
}

impl BalanceComputationResult {
    pub fn is_success(&self) -> bool {
        self.status == BalanceComputationStatus::Success
    }
}

/// Redispatch solver driving each area to its target net position.
///
/// On success the network holds the adjusted set points and the flows of a
/// final load flow.
pub trait BalanceAdjuster: Send + Sync {
    /// Engine identifier, used in log and error messages
    fn id(&self) -> &str;

    fn adjust(
        &self,
        network: &mut Network,
        areas: &[BalanceArea],
        parameters: &BalanceAdjustmentParameters,
    ) -> TrmResult<BalanceComputationResult>;
}
