use crate::{Network, TrmError, TrmResult};
use serde::{Deserialize, Serialize};

/// Parameters forwarded to the load-flow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadFlowParameters {
    /// Run a DC approximation instead of a full AC load flow
    pub dc: bool,
    /// Distribute the active power mismatch over generators instead of a single slack
    pub distributed_slack: bool,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Convergence tolerance
    pub tolerance: f64,
}

impl Default for LoadFlowParameters {
    fn default() -> Self {
        Self {
            dc: false,
            distributed_slack: true,
            max_iterations: 30,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadFlowStatus {
    Converged,
    MaxIterationsReached,
    Failed,
}

impl LoadFlowStatus {
    pub fn is_converged(self) -> bool {
        self == LoadFlowStatus::Converged
    }
}

/// Physical load-flow solver.
///
/// A successful run writes the terminal flows (`Terminal::p_mw`) of the network.
pub trait LoadFlowEngine: Send + Sync {
    /// Engine identifier, used in log and error messages
    fn id(&self) -> &str;

    fn run(&self, network: &mut Network, parameters: &LoadFlowParameters)
        -> TrmResult<LoadFlowStatus>;
}

/// Run a load flow and turn anything but convergence into an engine error.
///
/// `context` names the network in the error message ("reference", "market-based", ...).
pub fn run_load_flow(
    engine: &dyn LoadFlowEngine,
    network: &mut Network,
    parameters: &LoadFlowParameters,
    context: &str,
) -> TrmResult<()> {
    let status = engine.run(network, parameters)?;
    if !status.is_converged() {
        return Err(TrmError::Engine(format!(
            "load flow '{}' on the {} network ended with status {:?}",
            engine.id(),
            context,
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Diverging;

    impl LoadFlowEngine for Diverging {
        fn id(&self) -> &str {
            "diverging"
        }

        fn run(&self, _: &mut Network, _: &LoadFlowParameters) -> TrmResult<LoadFlowStatus> {
            Ok(LoadFlowStatus::MaxIterationsReached)
        }
    }

    #[test]
    fn non_converged_run_is_an_engine_error() {
        let mut network = Network::new();
        let err = run_load_flow(
            &Diverging,
            &mut network,
            &LoadFlowParameters::default(),
            "market-based",
        )
        .unwrap_err();
        assert!(matches!(err, TrmError::Engine(_)));
        assert!(err.to_string().contains("market-based"));
        assert!(err.to_string().contains("MaxIterationsReached"));
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let params: LoadFlowParameters = serde_json::from_str(r#"{"dc": true}"#).unwrap();
        assert!(params.dc);
        assert!(params.distributed_slack);
        assert_eq!(params.max_iterations, 30);
    }
}
