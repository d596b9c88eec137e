use super::load_flow::LoadFlowParameters;
use crate::{Network, TrmResult, WeightedElement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensitivityFunctionType {
    /// Active power flow on side 1 of a branch
    BranchActivePower1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensitivityVariableType {
    /// Active power injection (generator, load or weighted set of them)
    InjectionActivePower,
}

/// One (function, variable) pair whose sensitivity is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityFactor {
    pub function_type: SensitivityFunctionType,
    pub function_id: String,
    pub variable_type: SensitivityVariableType,
    pub variable_id: String,
    /// `variable_id` names a [`SensitivityVariableSet`] rather than an element
    pub variable_set: bool,
}

impl SensitivityFactor {
    /// Side-1 flow of `branch_id` with respect to the injection of the set `zone`.
    pub fn branch_flow_per_zone(branch_id: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            function_type: SensitivityFunctionType::BranchActivePower1,
            function_id: branch_id.into(),
            variable_type: SensitivityVariableType::InjectionActivePower,
            variable_id: zone.into(),
            variable_set: true,
        }
    }
}

/// Weighted injections shifted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityVariableSet {
    pub id: String,
    pub variables: Vec<WeightedElement>,
}

/// Engine output for one factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityValue {
    /// Position of the factor in the request
    pub factor_index: usize,
    pub sensitivity: f64,
    /// Value of the function itself in the base case (the branch flow)
    pub function_reference: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityParameters {
    pub load_flow: LoadFlowParameters,
}

/// Linear sensitivity-analysis engine.
pub trait SensitivityEngine: Send + Sync {
    /// Engine identifier, used in log and error messages
    fn id(&self) -> &str;

    fn compute(
        &self,
        network: &Network,
        factors: &[SensitivityFactor],
        variable_sets: &[SensitivityVariableSet],
        parameters: &SensitivityParameters,
    ) -> TrmResult<Vec<SensitivityValue>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_factor_targets_a_variable_set() {
        let factor = SensitivityFactor::branch_flow_per_zone("L1", "FR");
        assert_eq!(factor.function_id, "L1");
        assert_eq!(factor.variable_id, "FR");
        assert!(factor.variable_set);
        assert_eq!(
            factor.function_type,
            SensitivityFunctionType::BranchActivePower1
        );
    }
}
