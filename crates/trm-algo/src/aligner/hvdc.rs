use super::{AlignmentReport, OperationalConditionAligner};
use std::collections::BTreeMap;
use tracing::debug;
use trm_core::{Network, TrmError, TrmResult};

/// Copies active power set point, converters mode and angle-droop control of
/// every reference HVDC line onto the market-based line with the same id.
///
/// Both networks must describe the same HVDC lines: a reference line missing
/// from the market-based network is a configuration error.
#[derive(Debug, Clone, Default)]
pub struct HvdcAligner;

impl HvdcAligner {
    pub fn new() -> Self {
        Self
    }
}

impl OperationalConditionAligner for HvdcAligner {
    fn name(&self) -> &str {
        "hvdc"
    }

    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport> {
        let mut lines = reference.hvdc_lines();
        lines.sort_by(|a, b| a.id.cmp(&b.id));

        let mut result = BTreeMap::new();
        for line in lines {
            let target = market.hvdc_line_mut(&line.id).ok_or_else(|| {
                TrmError::Configuration(format!(
                    "HVDC line '{}' of the reference network is missing from the market-based network",
                    line.id
                ))
            })?;
            target.active_power_setpoint_mw = line.active_power_setpoint_mw;
            target.converters_mode = line.converters_mode;
            target.angle_droop = line.angle_droop.clone();
            debug!(
                hvdc = line.id.as_str(),
                setpoint_mw = line.active_power_setpoint_mw,
                angle_droop = line.angle_droop.is_some(),
                "HVDC line aligned"
            );
            result.insert(line.id.clone(), true);
        }
        Ok(AlignmentReport::Hvdc(result))
    }
}
