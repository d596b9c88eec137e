//! Zonal PTDF extraction on the reference network.
//!
//! For each branch, the sensitivity of its side-1 flow to the injection of every
//! GLSK zone is computed in one engine call. The zonal PTDF of the branch is the
//! spread of those sensitivities:
//!
//! ```text
//! zonal_ptdf(branch) = max_z PTDF(branch, z) - min_z PTDF(branch, z)
//! ```
//!
//! The engine also reports the base-case branch flow with every factor; all of
//! them must agree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use trm_core::{
    Network, SensitivityEngine, SensitivityFactor, SensitivityParameters, SensitivityVariableSet,
    TrmError, TrmResult, ZonalGlsk,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZonalPtdfAndFlow {
    pub zonal_ptdf: f64,
    /// Base-case side-1 flow (MW)
    pub flow: f64,
}

pub struct ZonalPtdfExtractor {
    engine: Arc<dyn SensitivityEngine>,
    parameters: SensitivityParameters,
}

/// Values with duplicates removed; all NaNs count as a single value.
fn distinct_values(values: &[f64]) -> Vec<f64> {
    let mut distinct: Vec<f64> = Vec::new();
    for &value in values {
        if !distinct
            .iter()
            .any(|&seen| seen == value || (seen.is_nan() && value.is_nan()))
        {
            distinct.push(value);
        }
    }
    distinct
}

impl ZonalPtdfExtractor {
    pub fn new(engine: Arc<dyn SensitivityEngine>, parameters: SensitivityParameters) -> Self {
        Self { engine, parameters }
    }

    pub fn extract(
        &self,
        network: &Network,
        branch_ids: &[String],
        glsk: &ZonalGlsk,
    ) -> TrmResult<BTreeMap<String, ZonalPtdfAndFlow>> {
        if glsk.is_empty() {
            return Err(TrmError::Configuration(
                "Reference zonal GLSK is empty, no zonal PTDF can be computed".to_string(),
            ));
        }
        let variable_sets: Vec<SensitivityVariableSet> = glsk
            .iter()
            .map(|(zone, elements)| SensitivityVariableSet {
                id: zone.to_string(),
                variables: elements.clone(),
            })
            .collect();
        let factors: Vec<SensitivityFactor> = branch_ids
            .iter()
            .flat_map(|id| {
                glsk.iter()
                    .map(move |(zone, _)| SensitivityFactor::branch_flow_per_zone(id.as_str(), zone))
            })
            .collect();

        let values = self
            .engine
            .compute(network, &factors, &variable_sets, &self.parameters)?;

        let mut sensitivities: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        let mut flows: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for value in &values {
            let factor = factors.get(value.factor_index).ok_or_else(|| {
                TrmError::Engine(format!(
                    "sensitivity engine '{}' returned unknown factor index {}",
                    self.engine.id(),
                    value.factor_index
                ))
            })?;
            let branch = factor.function_id.as_str();
            sensitivities
                .entry(branch)
                .or_default()
                .push(value.sensitivity);
            flows.entry(branch).or_default().push(value.function_reference);
        }

        let mut result = BTreeMap::new();
        for id in branch_ids {
            let (Some(branch_sensitivities), Some(branch_flows)) =
                (sensitivities.get(id.as_str()), flows.get(id.as_str()))
            else {
                return Err(TrmError::Engine(format!(
                    "sensitivity engine '{}' returned no value for branch '{}'",
                    self.engine.id(),
                    id
                )));
            };
            let distinct_flows = distinct_values(branch_flows);
            let flow = match distinct_flows.as_slice() {
                [flow] => *flow,
                _ => {
                    return Err(TrmError::Inconsistency(format!(
                        "Multiple flows found for branch '{}': {:?}",
                        id, distinct_flows
                    )))
                }
            };
            let max = branch_sensitivities
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let min = branch_sensitivities
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min);
            let zonal_ptdf = max - min;
            debug!(branch = id.as_str(), zonal_ptdf, flow_mw = flow, "zonal PTDF");
            result.insert(id.clone(), ZonalPtdfAndFlow { zonal_ptdf, flow });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn extractor(engine: TableSensitivityEngine) -> ZonalPtdfExtractor {
        ZonalPtdfExtractor::new(Arc::new(engine), SensitivityParameters::default())
    }

    #[test]
    fn zonal_ptdf_is_the_spread_of_zone_sensitivities() {
        let network = with_flows(three_country_network(), &[(FR_BE, 112.0)]);
        let engine = TableSensitivityEngine::new()
            .with_sensitivity(FR_BE, "FR", 0.4)
            .with_sensitivity(FR_BE, "BE", -0.35)
            .with_sensitivity(FR_BE, "DE", 0.05);
        let result = extractor(engine)
            .extract(&network, &[FR_BE.to_string()], &country_glsk(&network))
            .unwrap();
        let value = result[FR_BE];
        assert!((value.zonal_ptdf - 0.75).abs() < 1e-12);
        assert_eq!(value.flow, 112.0);
    }

    #[test]
    fn one_engine_call_for_all_branches() {
        let network = with_flows(
            three_country_network(),
            &[(FR_BE, 1.0), (BE_DE, 2.0), (DE_FR, 3.0)],
        );
        let engine = Arc::new(TableSensitivityEngine::new());
        let extractor = ZonalPtdfExtractor::new(engine.clone(), SensitivityParameters::default());
        let ids = vec![FR_BE.to_string(), BE_DE.to_string(), DE_FR.to_string()];
        let result = extractor
            .extract(&network, &ids, &country_glsk(&network))
            .unwrap();
        assert_eq!(engine.calls(), 1);
        assert_eq!(result.len(), 3);
        assert_eq!(result[DE_FR].flow, 3.0);
        assert_eq!(result[DE_FR].zonal_ptdf, 0.0);
    }

    #[test]
    fn nan_flows_count_as_one_value() {
        let mut network = three_country_network();
        network.set_connected(FR_BE, false).unwrap();
        let result = extractor(TableSensitivityEngine::new())
            .extract(&network, &[FR_BE.to_string()], &country_glsk(&network))
            .unwrap();
        assert!(result[FR_BE].flow.is_nan());
    }

    #[test]
    fn disagreeing_flows_are_fatal() {
        let network = with_flows(three_country_network(), &[(FR_BE, 100.0)]);
        let engine = TableSensitivityEngine::new().with_function_reference(FR_BE, "BE", 99.0);
        let err = extractor(engine)
            .extract(&network, &[FR_BE.to_string()], &country_glsk(&network))
            .unwrap_err();
        assert!(matches!(err, TrmError::Inconsistency(_)));
        assert!(err.to_string().contains(FR_BE));
    }

    #[test]
    fn empty_glsk_is_fatal() {
        let network = three_country_network();
        let err = extractor(TableSensitivityEngine::new())
            .extract(&network, &[FR_BE.to_string()], &ZonalGlsk::new())
            .unwrap_err();
        assert!(matches!(err, TrmError::Configuration(_)));
    }

    #[test]
    fn distinct_values_treats_nan_as_equal() {
        let values = distinct_values(&[f64::NAN, 1.0, f64::NAN, 1.0, 2.0]);
        assert_eq!(values.len(), 3);
    }
}
