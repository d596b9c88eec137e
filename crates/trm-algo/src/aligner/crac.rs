use super::{AlignmentReport, OperationalConditionAligner};
use crate::crac::Crac;
use std::collections::BTreeMap;
use tracing::debug;
use trm_core::{Network, TrmResult};

/// Applies to the market-based network the CRAC network actions that the
/// reference network already embodies.
///
/// An action is applied iff it has no impact on the reference network and has
/// an impact on the market-based network. Actions are visited in CRAC order.
#[derive(Debug, Clone)]
pub struct CracAligner {
    crac: Crac,
}

impl CracAligner {
    pub fn new(crac: Crac) -> Self {
        Self { crac }
    }
}

impl OperationalConditionAligner for CracAligner {
    fn name(&self) -> &str {
        "crac"
    }

    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport> {
        let mut result = BTreeMap::new();
        for action in &self.crac.network_actions {
            let applied = !action.has_impact_on_network(reference)
                && action.has_impact_on_network(market);
            if applied {
                action.apply(market)?;
                debug!(network_action = action.id.as_str(), "network action applied");
            }
            result.insert(action.id.clone(), applied);
        }
        Ok(AlignmentReport::Crac(result))
    }
}
