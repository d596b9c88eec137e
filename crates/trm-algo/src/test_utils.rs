//! Fixtures and scripted engines shared by unit and integration tests.
//!
//! The engines do not solve anything: flows are read from tables, so that a
//! test states the operating point it needs instead of deriving it.

use crate::flow::branch_flow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use trm_core::{
    BalanceAdjuster, BalanceAdjustmentParameters, BalanceArea, BalanceComputationResult,
    BalanceComputationStatus, Branch, Bus, ConvertersMode, Country, Gen, LoadFlowEngine,
    LoadFlowParameters, LoadFlowStatus, Network, PhaseTapChanger, Scalable, SensitivityEngine,
    SensitivityFactor, SensitivityParameters, SensitivityValue, SensitivityVariableSet, TrmError,
    TrmResult, WeightedElement, ZonalGlsk, ZonalScalable,
};

pub const FR_BE: &str = "FFR1AA1  BBE1AA1  1";
pub const BE_DE: &str = "BBE1AA1  DDE1AA1  1";
pub const DE_FR: &str = "DDE1AA1  FFR1AA1  1";
pub const FR_PST: &str = "FFR1AA1  FFR2AA1  1";
pub const HVDC_FR_DE: &str = "HVDC_FR_DE";
pub const DL_FR: &str = "XFRBE11 FFR1AA1  1";
pub const DL_BE: &str = "XFRBE11 BBE1AA1  1";
pub const TIE_LINE: &str = "XFRBE11 FFR1AA1  1 + XFRBE11 BBE1AA1  1";

const BUSES: [(&str, Country); 4] = [
    ("FFR1AA1 ", Country::FR),
    ("FFR2AA1 ", Country::FR),
    ("BBE1AA1 ", Country::BE),
    ("DDE1AA1 ", Country::DE),
];

/// Generator id of a test bus.
pub fn generator_id(bus_id: &str) -> String {
    format!("{}_generator", bus_id)
}

/// Buses, generators and lines of the given countries among FR, BE and DE.
///
/// Every bus hosts a 1000 MW generator; lines are only added when both ends
/// exist. FR also has an internal phase shifter, tap range [-16, 16].
pub fn network_of(countries: &[Country]) -> Network {
    let mut network = Network::new();
    for (bus_id, country) in BUSES {
        if !countries.contains(&country) {
            continue;
        }
        network
            .add_bus(Bus::new(bus_id, bus_id.trim_end(), 400.0).in_country(country))
            .unwrap();
        network
            .add_generator(
                Gen::new(generator_id(bus_id), bus_id, 1000.0).with_p_limits(0.0, 10000.0),
            )
            .unwrap();
    }
    let branches = [
        Branch::line(FR_BE, "FFR1AA1 ", "BBE1AA1 "),
        Branch::line(BE_DE, "BBE1AA1 ", "DDE1AA1 "),
        Branch::line(DE_FR, "DDE1AA1 ", "FFR1AA1 "),
        Branch::transformer(FR_PST, "FFR1AA1 ", "FFR2AA1 ")
            .with_phase_tap_changer(PhaseTapChanger::new(-16, 16, 0)),
    ];
    for branch in branches {
        let both_ends = network.bus(&branch.terminal1.bus_id).is_some()
            && network.bus(&branch.terminal2.bus_id).is_some();
        if both_ends {
            network.add_branch(branch).unwrap();
        }
    }
    network
}

/// FR, BE and DE meshed by three interconnections.
pub fn three_country_network() -> Network {
    network_of(&[Country::FR, Country::BE, Country::DE])
}

/// Store `p1` on side 1 and `-p1` on side 2 of a branch, tie line or HVDC line.
pub fn set_flow(network: &mut Network, id: &str, p1: f64) -> TrmResult<()> {
    if let Some(branch) = network.branch_mut(id) {
        branch.terminal1.p_mw = p1;
        branch.terminal2.p_mw = -p1;
        return Ok(());
    }
    if let Some(hvdc) = network.hvdc_line_mut(id) {
        hvdc.terminal1.p_mw = p1;
        hvdc.terminal2.p_mw = -p1;
        return Ok(());
    }
    let tie_line = network
        .tie_line(id)
        .cloned()
        .ok_or_else(|| TrmError::Network(format!("no flow can be set on '{}'", id)))?;
    for (half, p) in [(&tie_line.dangling_line_1, p1), (&tie_line.dangling_line_2, -p1)] {
        if let Some(dl) = network.dangling_line_mut(half) {
            dl.terminal.p_mw = p;
        }
    }
    Ok(())
}

pub fn with_flows(mut network: Network, flows: &[(&str, f64)]) -> Network {
    for (id, p1) in flows {
        set_flow(&mut network, id, *p1).unwrap();
    }
    network
}

fn generators_per_country(network: &Network) -> BTreeMap<Country, Vec<WeightedElement>> {
    let mut per_country: BTreeMap<Country, Vec<WeightedElement>> = BTreeMap::new();
    let mut generators = network.generators();
    generators.sort_by(|a, b| a.id.cmp(&b.id));
    for gen in generators {
        if let Some(country) = network.bus_country(&gen.bus_id) {
            per_country
                .entry(country)
                .or_default()
                .push(WeightedElement::new(gen.id.clone(), 1.0));
        }
    }
    per_country
}

/// Equal shift keys over the generators of each country.
pub fn country_glsk(network: &Network) -> ZonalGlsk {
    generators_per_country(network)
        .into_iter()
        .map(|(country, elements)| (country.to_string(), elements))
        .collect()
}

/// Proportional scalables over the generators of each country.
pub fn country_scalables(network: &Network) -> ZonalScalable {
    generators_per_country(network)
        .into_iter()
        .map(|(country, elements)| (country.to_string(), Scalable::proportional(elements)))
        .collect()
}

/// Structural equality of two networks, element by element.
///
/// NaN flows make `PartialEq` useless here, so elements are compared through
/// their debug rendering.
pub fn assert_same_network(left: &Network, right: &Network) {
    fn rendered(network: &Network) -> (Vec<String>, Vec<String>) {
        let mut nodes: Vec<String> = network
            .graph
            .node_weights()
            .map(|n| format!("{:?}", n))
            .collect();
        let mut edges: Vec<String> = network
            .graph
            .edge_weights()
            .map(|e| format!("{:?}", e))
            .collect();
        nodes.sort();
        edges.sort();
        (nodes, edges)
    }
    assert_eq!(rendered(left), rendered(right));
}

// ============================================================================
// Scripted engines
// ============================================================================

/// Load flow writing flows from a table.
///
/// Flows already stored on the network are kept unless the table overrides
/// them. HVDC terminals take their set point and unpaired boundary lines their
/// `p0`, which is what a real load flow would give.
#[derive(Debug)]
pub struct FlowTableLoadFlow {
    flows: BTreeMap<String, f64>,
    status: LoadFlowStatus,
    calls: AtomicUsize,
}

impl Default for FlowTableLoadFlow {
    fn default() -> Self {
        Self {
            flows: BTreeMap::new(),
            status: LoadFlowStatus::Converged,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FlowTableLoadFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flow(mut self, id: &str, p1: f64) -> Self {
        self.flows.insert(id.to_string(), p1);
        self
    }

    pub fn with_status(mut self, status: LoadFlowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LoadFlowEngine for FlowTableLoadFlow {
    fn id(&self) -> &str {
        "flow-table"
    }

    fn run(&self, network: &mut Network, _: &LoadFlowParameters) -> TrmResult<LoadFlowStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.status.is_converged() {
            return Ok(self.status);
        }
        let hvdc_flows: Vec<(String, f64)> = network
            .hvdc_lines()
            .into_iter()
            .map(|h| {
                let p1 = match h.converters_mode {
                    ConvertersMode::Side1RectifierSide2Inverter => h.active_power_setpoint_mw,
                    ConvertersMode::Side1InverterSide2Rectifier => -h.active_power_setpoint_mw,
                };
                (h.id.clone(), p1)
            })
            .collect();
        for (id, p1) in hvdc_flows {
            set_flow(network, &id, p1)?;
        }
        let boundary: Vec<(String, f64)> = network
            .dangling_lines()
            .into_iter()
            .filter(|dl| !network.is_paired(&dl.id))
            .map(|dl| (dl.id.clone(), dl.p0_mw))
            .collect();
        for (id, p0) in boundary {
            if let Some(dl) = network.dangling_line_mut(&id) {
                dl.terminal.p_mw = p0;
            }
        }
        for (id, p1) in &self.flows {
            set_flow(network, id, *p1)?;
        }
        Ok(self.status)
    }
}

/// Sensitivity engine answering from a table.
///
/// Unlisted sensitivities are 0. The function reference is the side-1 flow
/// stored on the network unless overridden.
#[derive(Debug, Default)]
pub struct TableSensitivityEngine {
    sensitivities: BTreeMap<(String, String), f64>,
    function_references: BTreeMap<(String, String), f64>,
    calls: AtomicUsize,
}

impl TableSensitivityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensitivity(mut self, function_id: &str, variable_id: &str, value: f64) -> Self {
        self.sensitivities
            .insert((function_id.to_string(), variable_id.to_string()), value);
        self
    }

    pub fn with_function_reference(
        mut self,
        function_id: &str,
        variable_id: &str,
        value: f64,
    ) -> Self {
        self.function_references
            .insert((function_id.to_string(), variable_id.to_string()), value);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SensitivityEngine for TableSensitivityEngine {
    fn id(&self) -> &str {
        "sensitivity-table"
    }

    fn compute(
        &self,
        network: &Network,
        factors: &[SensitivityFactor],
        variable_sets: &[SensitivityVariableSet],
        _: &SensitivityParameters,
    ) -> TrmResult<Vec<SensitivityValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        factors
            .iter()
            .enumerate()
            .map(|(factor_index, factor)| {
                if factor.variable_set
                    && !variable_sets.iter().any(|set| set.id == factor.variable_id)
                {
                    return Err(TrmError::Engine(format!(
                        "unknown variable set '{}'",
                        factor.variable_id
                    )));
                }
                let key = (factor.function_id.clone(), factor.variable_id.clone());
                let function_reference = match self.function_references.get(&key) {
                    Some(value) => *value,
                    None => branch_flow(network, &factor.function_id).ok_or_else(|| {
                        TrmError::Engine(format!("unknown function '{}'", factor.function_id))
                    })?,
                };
                Ok(SensitivityValue {
                    factor_index,
                    sensitivity: self.sensitivities.get(&key).copied().unwrap_or(0.0),
                    function_reference,
                })
            })
            .collect()
    }
}

/// Balance adjuster scaling each area towards its target then writing scripted
/// flows, as if the load flow had redistributed them.
#[derive(Debug)]
pub struct FlowScriptBalanceAdjuster {
    status: BalanceComputationStatus,
    flows: BTreeMap<String, f64>,
    calls: AtomicUsize,
    last_areas: Mutex<Vec<BalanceArea>>,
}

impl FlowScriptBalanceAdjuster {
    pub fn new(status: BalanceComputationStatus) -> Self {
        Self {
            status,
            flows: BTreeMap::new(),
            calls: AtomicUsize::new(0),
            last_areas: Mutex::new(Vec::new()),
        }
    }

    pub fn converging() -> Self {
        Self::new(BalanceComputationStatus::Success)
    }

    pub fn with_flow(mut self, id: &str, p1: f64) -> Self {
        self.flows.insert(id.to_string(), p1);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Areas of the last call.
    pub fn last_areas(&self) -> Vec<BalanceArea> {
        self.last_areas
            .lock()
            .map(|areas| areas.clone())
            .unwrap_or_default()
    }
}

impl BalanceAdjuster for FlowScriptBalanceAdjuster {
    fn id(&self) -> &str {
        "flow-script"
    }

    fn adjust(
        &self,
        network: &mut Network,
        areas: &[BalanceArea],
        _: &BalanceAdjustmentParameters,
    ) -> TrmResult<BalanceComputationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_areas.lock() {
            *last = areas.to_vec();
        }
        for area in areas {
            let current = network.net_position(area.country);
            area.scalable
                .scale(network, area.target_net_position_mw - current)?;
        }
        if self.status == BalanceComputationStatus::Success {
            for (id, p1) in &self.flows {
                set_flow(network, id, *p1)?;
            }
        }
        let balances = areas
            .iter()
            .map(|area| {
                (
                    area.name.clone(),
                    area.target_net_position_mw - network.net_position(area.country),
                )
            })
            .collect();
        Ok(BalanceComputationResult {
            status: self.status,
            iteration_count: 1,
            balances,
        })
    }
}
