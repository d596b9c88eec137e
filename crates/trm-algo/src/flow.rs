//! Branch flow extraction after a load flow.

use std::collections::BTreeMap;
use tracing::debug;
use trm_core::{
    run_load_flow, Edge, LoadFlowEngine, LoadFlowParameters, Network, TrmError, TrmResult,
};

/// Side-1 active power of a branch, tie line or HVDC line (MW).
///
/// `NaN` when the side-1 terminal is disconnected or no flow was computed;
/// `None` when the id names no such element.
pub fn branch_flow(network: &Network, id: &str) -> Option<f64> {
    match network.graph.edge_weights().find(|e| e.id() == id)? {
        Edge::Branch(branch) => Some(branch.terminal1.flow()),
        Edge::Hvdc(hvdc) => Some(hvdc.terminal1.flow()),
        Edge::TieLine(tie_line) => network
            .dangling_line(&tie_line.dangling_line_1)
            .map(|dl| dl.terminal.flow()),
    }
}

/// Run a load flow on `network` and read the side-1 flow of every id.
pub fn extract_branch_flows(
    engine: &dyn LoadFlowEngine,
    network: &mut Network,
    parameters: &LoadFlowParameters,
    ids: &[String],
) -> TrmResult<BTreeMap<String, f64>> {
    run_load_flow(engine, network, parameters, "market-based")?;
    ids.iter()
        .map(|id| {
            let flow = branch_flow(network, id).ok_or_else(|| {
                TrmError::Network(format!("no branch or tie line '{}' to read a flow from", id))
            })?;
            debug!(branch = id.as_str(), flow_mw = flow, "branch flow");
            Ok((id.clone(), flow))
        })
        .collect()
}
