use super::{AlignmentReport, OperationalConditionAligner};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use trm_core::{Network, TrmError, TrmResult};

/// Copies the tap position of every reference phase shifter onto the
/// market-based transformer with the same id.
///
/// A transformer missing from the market-based network is reported `false`.
/// A market element with that id but without phase tap changer is a
/// configuration error.
#[derive(Debug, Clone, Default)]
pub struct PstAligner;

impl PstAligner {
    pub fn new() -> Self {
        Self
    }
}

impl OperationalConditionAligner for PstAligner {
    fn name(&self) -> &str {
        "pst"
    }

    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport> {
        let mut taps: Vec<(String, i32)> = reference
            .phase_shifters()
            .into_iter()
            .filter_map(|b| {
                b.phase_tap_changer
                    .as_ref()
                    .map(|ptc| (b.id.clone(), ptc.tap_position))
            })
            .collect();
        taps.sort();

        let mut result = BTreeMap::new();
        for (id, tap_position) in taps {
            let Some(branch) = market.branch_mut(&id) else {
                warn!(pst = id.as_str(), "PST not found in market-based network");
                result.insert(id, false);
                continue;
            };
            let ptc = branch.phase_tap_changer.as_mut().ok_or_else(|| {
                TrmError::Configuration(format!(
                    "'{}' is a PST in the reference network but has no phase tap changer in the market-based network",
                    id
                ))
            })?;
            ptc.set_tap_position(tap_position).map_err(|e| {
                TrmError::Inconsistency(format!("aligning PST '{}': {}", id, e))
            })?;
            debug!(pst = id.as_str(), tap_position, "PST tap aligned");
            result.insert(id, true);
        }
        Ok(AlignmentReport::Pst(result))
    }
}
