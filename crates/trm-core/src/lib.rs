//! # trm-core: Network Model for TRM Uncertainty Computation
//!
//! Provides the network data structures that the TRM alignment pipeline reads
//! and mutates, together with the narrow interfaces through which external
//! engines (load flow, sensitivity analysis, balance adjustment) are consumed.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Buses, Generators, Loads and Dangling lines
//! - **Edges**: Branches (lines and two-winding transformers), HVDC lines between
//!   buses, and tie lines between two dangling-line nodes
//!
//! Every element is named by an opaque string identifier, unique across all
//! element kinds of one network. Two networks built independently (a reference
//! state and a market-based state) usually share most identifiers, but not all;
//! correspondence between them is established by `trm-algo`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trm_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new("FFI1AA1 ", "FFI1AA1", 400.0).in_country(Country::FR))?;
//! network.add_bus(Bus::new("BBE1AA1 ", "BBE1AA1", 400.0).in_country(Country::BE))?;
//! network.add_branch(Branch::line("FFI1AA1  BBE1AA1  1", "FFI1AA1 ", "BBE1AA1 "))?;
//! assert_eq!(network.countries().len(), 2);
//! # Ok::<(), TrmError>(())
//! ```
//!
//! ## Modules
//!
//! - [`country`] - Country codes
//! - [`engine`] - Load flow, sensitivity and balance-adjustment engine interfaces
//! - [`error`] - Unified error type
//! - [`flows`] - Net position and border flow queries
//! - [`zonal`] - Zonal data (GLSK, scalables)

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod country;
pub mod engine;
pub mod error;
pub mod flows;
pub mod zonal;

pub use country::Country;
pub use engine::*;
pub use error::{TrmError, TrmResult};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use zonal::{Scalable, WeightedElement, ZonalData, ZonalGlsk, ZonalScalable};

/// Which of the two compared networks a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkSide {
    Reference,
    MarketBased,
}

impl fmt::Display for NetworkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkSide::Reference => f.write_str("reference"),
            NetworkSide::MarketBased => f.write_str("market-based"),
        }
    }
}

/// Side of a two-terminal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    One,
    Two,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    pub voltage_level_id: String,
    /// Nominal voltage in kilovolts
    pub nominal_kv: f64,
    /// Country of the hosting substation
    pub country: Option<Country>,
}

impl Bus {
    pub fn new(
        id: impl Into<String>,
        voltage_level_id: impl Into<String>,
        nominal_kv: f64,
    ) -> Self {
        Self {
            id: id.into(),
            voltage_level_id: voltage_level_id.into(),
            nominal_kv,
            country: None,
        }
    }

    pub fn in_country(mut self, country: Country) -> Self {
        self.country = Some(country);
        self
    }
}

/// Connection point of an element to a bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    pub bus_id: String,
    pub connected: bool,
    /// Active power entering the element at this terminal (MW), NaN until computed
    pub p_mw: f64,
}

impl Terminal {
    pub fn new(bus_id: impl Into<String>) -> Self {
        Self {
            bus_id: bus_id.into(),
            connected: true,
            p_mw: f64::NAN,
        }
    }

    /// Measured flow, NaN when the terminal is disconnected.
    pub fn flow(&self) -> f64 {
        if self.connected {
            self.p_mw
        } else {
            f64::NAN
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Line,
    Transformer,
}

/// Phase tap changer of a phase-shifting transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTapChanger {
    pub low_tap: i32,
    pub high_tap: i32,
    pub tap_position: i32,
}

impl PhaseTapChanger {
    pub fn new(low_tap: i32, high_tap: i32, tap_position: i32) -> Self {
        Self {
            low_tap,
            high_tap,
            tap_position,
        }
    }

    pub fn accepts(&self, tap_position: i32) -> bool {
        (self.low_tap..=self.high_tap).contains(&tap_position)
    }

    pub fn set_tap_position(&mut self, tap_position: i32) -> TrmResult<()> {
        if !self.accepts(tap_position) {
            return Err(TrmError::Inconsistency(format!(
                "tap position {} is outside of range [{}, {}]",
                tap_position, self.low_tap, self.high_tap
            )));
        }
        self.tap_position = tap_position;
        Ok(())
    }
}

/// AC line or two-winding transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    /// Alternate name carried by some exchange formats (UCTE element name)
    pub element_name: Option<String>,
    pub kind: BranchKind,
    pub terminal1: Terminal,
    pub terminal2: Terminal,
    pub phase_tap_changer: Option<PhaseTapChanger>,
}

impl Branch {
    pub fn line(id: impl Into<String>, bus1: impl Into<String>, bus2: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_name: None,
            kind: BranchKind::Line,
            terminal1: Terminal::new(bus1),
            terminal2: Terminal::new(bus2),
            phase_tap_changer: None,
        }
    }

    pub fn transformer(
        id: impl Into<String>,
        bus1: impl Into<String>,
        bus2: impl Into<String>,
    ) -> Self {
        Self {
            kind: BranchKind::Transformer,
            ..Self::line(id, bus1, bus2)
        }
    }

    pub fn with_element_name(mut self, name: impl Into<String>) -> Self {
        self.element_name = Some(name.into());
        self
    }

    /// Turn the branch into a phase-shifting transformer.
    pub fn with_phase_tap_changer(mut self, ptc: PhaseTapChanger) -> Self {
        self.kind = BranchKind::Transformer;
        self.phase_tap_changer = Some(ptc);
        self
    }

    pub fn is_phase_shifter(&self) -> bool {
        self.phase_tap_changer.is_some()
    }

    pub fn terminal(&self, side: Side) -> &Terminal {
        match side {
            Side::One => &self.terminal1,
            Side::Two => &self.terminal2,
        }
    }

    pub fn terminal_mut(&mut self, side: Side) -> &mut Terminal {
        match side {
            Side::One => &mut self.terminal1,
            Side::Two => &mut self.terminal2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gen {
    pub id: String,
    pub bus_id: String,
    /// Active power set point (MW)
    pub target_p_mw: f64,
    pub min_p_mw: f64,
    pub max_p_mw: f64,
    pub connected: bool,
}

impl Gen {
    /// Create a generator without active power limits.
    pub fn new(id: impl Into<String>, bus_id: impl Into<String>, target_p_mw: f64) -> Self {
        Self {
            id: id.into(),
            bus_id: bus_id.into(),
            target_p_mw,
            min_p_mw: f64::NEG_INFINITY,
            max_p_mw: f64::INFINITY,
            connected: true,
        }
    }

    pub fn with_p_limits(mut self, min_p_mw: f64, max_p_mw: f64) -> Self {
        self.min_p_mw = min_p_mw;
        self.max_p_mw = max_p_mw;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub id: String,
    pub bus_id: String,
    /// Active power demand (MW)
    pub p0_mw: f64,
    /// Reactive power demand (Mvar)
    pub q0_mvar: f64,
    pub connected: bool,
}

impl Load {
    pub fn new(id: impl Into<String>, bus_id: impl Into<String>, p0_mw: f64) -> Self {
        Self {
            id: id.into(),
            bus_id: bus_id.into(),
            p0_mw,
            q0_mvar: 0.0,
            connected: true,
        }
    }
}

/// Line connected on one side only; the other side is a boundary node
/// (X-node) modeled as a fixed injection `p0`/`q0`.
///
/// Two dangling lines sharing a boundary node may be merged into a tie line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanglingLine {
    pub id: String,
    /// Code of the boundary node, shared by the two halves of a tie line
    pub pairing_key: Option<String>,
    /// Boundary active power consumption (MW)
    pub p0_mw: f64,
    /// Boundary reactive power consumption (Mvar)
    pub q0_mvar: f64,
    pub terminal: Terminal,
}

impl DanglingLine {
    pub fn new(id: impl Into<String>, bus_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pairing_key: None,
            p0_mw: 0.0,
            q0_mvar: 0.0,
            terminal: Terminal::new(bus_id),
        }
    }

    pub fn with_boundary_injection(mut self, p0_mw: f64, q0_mvar: f64) -> Self {
        self.p0_mw = p0_mw;
        self.q0_mvar = q0_mvar;
        self
    }

    pub fn with_pairing_key(mut self, key: impl Into<String>) -> Self {
        self.pairing_key = Some(key.into());
        self
    }
}

/// Tie line merging two dangling lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieLine {
    pub id: String,
    pub dangling_line_1: String,
    pub dangling_line_2: String,
}

impl TieLine {
    /// Id of the half that is not `dangling_line_id`.
    pub fn other_half(&self, dangling_line_id: &str) -> Option<&str> {
        if self.dangling_line_1 == dangling_line_id {
            Some(&self.dangling_line_2)
        } else if self.dangling_line_2 == dangling_line_id {
            Some(&self.dangling_line_1)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvertersMode {
    Side1RectifierSide2Inverter,
    Side1InverterSide2Rectifier,
}

/// Emulation of an AC line by an HVDC link: `P = p0 + droop * (θ1 - θ2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleDroopControl {
    pub p0_mw: f64,
    /// Droop in MW/degree
    pub droop: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HvdcLine {
    pub id: String,
    pub converters_mode: ConvertersMode,
    /// Active power set point (MW)
    pub active_power_setpoint_mw: f64,
    pub max_p_mw: f64,
    pub angle_droop: Option<AngleDroopControl>,
    /// Converter station terminals
    pub terminal1: Terminal,
    pub terminal2: Terminal,
}

impl HvdcLine {
    pub fn new(
        id: impl Into<String>,
        converter_bus_1: impl Into<String>,
        converter_bus_2: impl Into<String>,
        active_power_setpoint_mw: f64,
    ) -> Self {
        Self {
            id: id.into(),
            converters_mode: ConvertersMode::Side1RectifierSide2Inverter,
            active_power_setpoint_mw,
            max_p_mw: f64::INFINITY,
            angle_droop: None,
            terminal1: Terminal::new(converter_bus_1),
            terminal2: Terminal::new(converter_bus_2),
        }
    }

    pub fn with_angle_droop(mut self, control: AngleDroopControl) -> Self {
        self.angle_droop = Some(control);
        self
    }
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
    DanglingLine(DanglingLine),
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    Branch(Branch),
    TieLine(TieLine),
    Hvdc(HvdcLine),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.id,
            Node::Gen(gen) => &gen.id,
            Node::Load(load) => &load.id,
            Node::DanglingLine(dl) => &dl.id,
        }
    }
}

impl Edge {
    pub fn id(&self) -> &str {
        match self {
            Edge::Branch(branch) => &branch.id,
            Edge::TieLine(tie_line) => &tie_line.id,
            Edge::Hvdc(hvdc) => &hvdc.id,
        }
    }
}

/// The power network graph
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
}

// Generators, loads and dangling lines are nodes that reference their bus by id,
// exactly like branch terminals do; only branches and HVDC lines link bus nodes,
// and tie lines link the two dangling-line nodes they merge.

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
        }
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(_) => stats.num_gens += 1,
                Node::Load(_) => stats.num_loads += 1,
                Node::DanglingLine(_) => stats.num_dangling_lines += 1,
            }
        }
        for edge in self.graph.edge_weights() {
            match edge {
                Edge::Branch(branch) => {
                    stats.num_branches += 1;
                    if branch.is_phase_shifter() {
                        stats.num_phase_shifters += 1;
                    }
                }
                Edge::TieLine(_) => stats.num_tie_lines += 1,
                Edge::Hvdc(_) => stats.num_hvdc_lines += 1,
            }
        }
        stats.num_countries = self.countries().len();
        stats
    }

    fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].id() == id)
    }

    fn edge_index(&self, id: &str) -> Option<EdgeIndex> {
        self.graph
            .edge_indices()
            .find(|&idx| self.graph[idx].id() == id)
    }

    /// Whether any element (node or edge) carries this id.
    pub fn contains(&self, id: &str) -> bool {
        self.node_index(id).is_some() || self.edge_index(id).is_some()
    }

    fn ensure_unique(&self, id: &str) -> TrmResult<()> {
        if self.contains(id) {
            return Err(TrmError::Network(format!(
                "an element with id '{}' already exists",
                id
            )));
        }
        Ok(())
    }

    fn bus_index(&self, bus_id: &str) -> TrmResult<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| matches!(&self.graph[idx], Node::Bus(b) if b.id == bus_id))
            .ok_or_else(|| TrmError::Network(format!("bus '{}' not found", bus_id)))
    }

    // =========================================================================
    // Construction
    // =========================================================================

    pub fn add_bus(&mut self, bus: Bus) -> TrmResult<NodeIndex> {
        self.ensure_unique(&bus.id)?;
        Ok(self.graph.add_node(Node::Bus(bus)))
    }

    pub fn add_branch(&mut self, branch: Branch) -> TrmResult<EdgeIndex> {
        self.ensure_unique(&branch.id)?;
        let from = self.bus_index(&branch.terminal1.bus_id)?;
        let to = self.bus_index(&branch.terminal2.bus_id)?;
        Ok(self.graph.add_edge(from, to, Edge::Branch(branch)))
    }

    pub fn add_generator(&mut self, gen: Gen) -> TrmResult<NodeIndex> {
        self.ensure_unique(&gen.id)?;
        self.bus_index(&gen.bus_id)?;
        Ok(self.graph.add_node(Node::Gen(gen)))
    }

    pub fn add_load(&mut self, load: Load) -> TrmResult<NodeIndex> {
        self.ensure_unique(&load.id)?;
        self.bus_index(&load.bus_id)?;
        Ok(self.graph.add_node(Node::Load(load)))
    }

    pub fn add_dangling_line(&mut self, dangling_line: DanglingLine) -> TrmResult<NodeIndex> {
        self.ensure_unique(&dangling_line.id)?;
        self.bus_index(&dangling_line.terminal.bus_id)?;
        Ok(self.graph.add_node(Node::DanglingLine(dangling_line)))
    }

    /// Merge two unpaired dangling lines into a tie line.
    pub fn add_tie_line(
        &mut self,
        id: impl Into<String>,
        dangling_line_1: &str,
        dangling_line_2: &str,
    ) -> TrmResult<EdgeIndex> {
        let id = id.into();
        self.ensure_unique(&id)?;
        if dangling_line_1 == dangling_line_2 {
            return Err(TrmError::Network(format!(
                "tie line '{}' cannot merge dangling line '{}' with itself",
                id, dangling_line_1
            )));
        }
        let mut halves = [NodeIndex::end(); 2];
        for (slot, dl_id) in halves.iter_mut().zip([dangling_line_1, dangling_line_2]) {
            *slot = self
                .graph
                .node_indices()
                .find(|&idx| matches!(&self.graph[idx], Node::DanglingLine(dl) if dl.id == dl_id))
                .ok_or_else(|| {
                    TrmError::Network(format!("dangling line '{}' not found", dl_id))
                })?;
            if self.is_paired(dl_id) {
                return Err(TrmError::Network(format!(
                    "dangling line '{}' is already paired",
                    dl_id
                )));
            }
        }
        Ok(self.graph.add_edge(
            halves[0],
            halves[1],
            Edge::TieLine(TieLine {
                id,
                dangling_line_1: dangling_line_1.to_string(),
                dangling_line_2: dangling_line_2.to_string(),
            }),
        ))
    }

    pub fn add_hvdc_line(&mut self, hvdc: HvdcLine) -> TrmResult<EdgeIndex> {
        self.ensure_unique(&hvdc.id)?;
        let from = self.bus_index(&hvdc.terminal1.bus_id)?;
        let to = self.bus_index(&hvdc.terminal2.bus_id)?;
        Ok(self.graph.add_edge(from, to, Edge::Hvdc(hvdc)))
    }

    // =========================================================================
    // Lookup by id
    // =========================================================================

    pub fn bus(&self, id: &str) -> Option<&Bus> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Bus(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.graph.edge_weights().find_map(|e| match e {
            Edge::Branch(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    pub fn branch_mut(&mut self, id: &str) -> Option<&mut Branch> {
        self.graph.edge_weights_mut().find_map(|e| match e {
            Edge::Branch(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    pub fn generator(&self, id: &str) -> Option<&Gen> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Gen(g) if g.id == id => Some(g),
            _ => None,
        })
    }

    pub fn generator_mut(&mut self, id: &str) -> Option<&mut Gen> {
        self.graph.node_weights_mut().find_map(|n| match n {
            Node::Gen(g) if g.id == id => Some(g),
            _ => None,
        })
    }

    pub fn load(&self, id: &str) -> Option<&Load> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Load(l) if l.id == id => Some(l),
            _ => None,
        })
    }

    pub fn load_mut(&mut self, id: &str) -> Option<&mut Load> {
        self.graph.node_weights_mut().find_map(|n| match n {
            Node::Load(l) if l.id == id => Some(l),
            _ => None,
        })
    }

    pub fn dangling_line(&self, id: &str) -> Option<&DanglingLine> {
        self.graph.node_weights().find_map(|n| match n {
            Node::DanglingLine(dl) if dl.id == id => Some(dl),
            _ => None,
        })
    }

    pub fn dangling_line_mut(&mut self, id: &str) -> Option<&mut DanglingLine> {
        self.graph.node_weights_mut().find_map(|n| match n {
            Node::DanglingLine(dl) if dl.id == id => Some(dl),
            _ => None,
        })
    }

    pub fn tie_line(&self, id: &str) -> Option<&TieLine> {
        self.graph.edge_weights().find_map(|e| match e {
            Edge::TieLine(t) if t.id == id => Some(t),
            _ => None,
        })
    }

    /// Tie line merging the given dangling line, if it is paired.
    pub fn tie_line_of(&self, dangling_line_id: &str) -> Option<&TieLine> {
        self.graph.edge_weights().find_map(|e| match e {
            Edge::TieLine(t) if t.other_half(dangling_line_id).is_some() => Some(t),
            _ => None,
        })
    }

    pub fn is_paired(&self, dangling_line_id: &str) -> bool {
        self.tie_line_of(dangling_line_id).is_some()
    }

    pub fn hvdc_line(&self, id: &str) -> Option<&HvdcLine> {
        self.graph.edge_weights().find_map(|e| match e {
            Edge::Hvdc(h) if h.id == id => Some(h),
            _ => None,
        })
    }

    pub fn hvdc_line_mut(&mut self, id: &str) -> Option<&mut HvdcLine> {
        self.graph.edge_weights_mut().find_map(|e| match e {
            Edge::Hvdc(h) if h.id == id => Some(h),
            _ => None,
        })
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn branches(&self) -> Vec<&Branch> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Branch(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Transformers carrying a phase tap changer
    pub fn phase_shifters(&self) -> Vec<&Branch> {
        self.branches()
            .into_iter()
            .filter(|b| b.is_phase_shifter())
            .collect()
    }

    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn dangling_lines(&self) -> Vec<&DanglingLine> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::DanglingLine(dl) => Some(dl),
                _ => None,
            })
            .collect()
    }

    pub fn tie_lines(&self) -> Vec<&TieLine> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::TieLine(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn hvdc_lines(&self) -> Vec<&HvdcLine> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Hvdc(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    /// Ids of branches and tie lines, sorted.
    pub fn branch_like_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graph
            .edge_weights()
            .filter(|e| matches!(e, Edge::Branch(_) | Edge::TieLine(_)))
            .map(|e| e.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    // =========================================================================
    // Topology queries
    // =========================================================================

    /// Countries of all buses, sorted.
    pub fn countries(&self) -> BTreeSet<Country> {
        self.buses().into_iter().filter_map(|b| b.country).collect()
    }

    pub fn bus_country(&self, bus_id: &str) -> Option<Country> {
        self.bus(bus_id).and_then(|b| b.country)
    }

    pub fn voltage_level_of(&self, bus_id: &str) -> Option<&str> {
        self.bus(bus_id).map(|b| b.voltage_level_id.as_str())
    }

    /// Bus ids on side 1 and side 2 of a branch, tie line or HVDC line.
    pub fn side_buses(&self, id: &str) -> Option<(String, String)> {
        match self.graph.edge_weights().find(|e| e.id() == id)? {
            Edge::Branch(b) => Some((b.terminal1.bus_id.clone(), b.terminal2.bus_id.clone())),
            Edge::Hvdc(h) => Some((h.terminal1.bus_id.clone(), h.terminal2.bus_id.clone())),
            Edge::TieLine(t) => {
                let dl1 = self.dangling_line(&t.dangling_line_1)?;
                let dl2 = self.dangling_line(&t.dangling_line_2)?;
                Some((dl1.terminal.bus_id.clone(), dl2.terminal.bus_id.clone()))
            }
        }
    }

    /// Countries on side 1 and side 2 of a branch, tie line or HVDC line.
    pub fn branch_countries(&self, id: &str) -> Option<(Option<Country>, Option<Country>)> {
        let (bus1, bus2) = self.side_buses(id)?;
        Some((self.bus_country(&bus1), self.bus_country(&bus2)))
    }

    /// Maximum nominal voltage of the buses a branch-like element connects.
    pub fn nominal_kv_of(&self, id: &str) -> Option<f64> {
        let (bus1, bus2) = self.side_buses(id)?;
        let kv1 = self.bus(&bus1).map(|b| b.nominal_kv).unwrap_or(0.0);
        let kv2 = self.bus(&bus2).map(|b| b.nominal_kv).unwrap_or(0.0);
        Some(kv1.max(kv2))
    }

    /// Element name of a branch, if any.
    pub fn element_name(&self, id: &str) -> Option<&str> {
        self.branch(id).and_then(|b| b.element_name.as_deref())
    }

    // =========================================================================
    // Connection state
    // =========================================================================

    /// Connection state of every terminal of an element, `None` if unknown id.
    ///
    /// Tie lines report the terminals of both of their dangling lines.
    pub fn connection_states(&self, id: &str) -> Option<Vec<bool>> {
        if let Some(node) = self.graph.node_weights().find(|n| n.id() == id) {
            return match node {
                Node::Bus(_) => None,
                Node::Gen(g) => Some(vec![g.connected]),
                Node::Load(l) => Some(vec![l.connected]),
                Node::DanglingLine(dl) => Some(vec![dl.terminal.connected]),
            };
        }
        match self.graph.edge_weights().find(|e| e.id() == id)? {
            Edge::Branch(b) => Some(vec![b.terminal1.connected, b.terminal2.connected]),
            Edge::Hvdc(h) => Some(vec![h.terminal1.connected, h.terminal2.connected]),
            Edge::TieLine(t) => {
                let dl1 = self.dangling_line(&t.dangling_line_1)?;
                let dl2 = self.dangling_line(&t.dangling_line_2)?;
                Some(vec![dl1.terminal.connected, dl2.terminal.connected])
            }
        }
    }

    /// Connect or disconnect every terminal of an element.
    pub fn set_connected(&mut self, id: &str, connected: bool) -> TrmResult<()> {
        let tie_line_halves = match self.graph.edge_weights().find(|e| e.id() == id) {
            Some(Edge::TieLine(t)) => Some([t.dangling_line_1.clone(), t.dangling_line_2.clone()]),
            _ => None,
        };
        if let Some(halves) = tie_line_halves {
            for half in halves {
                self.set_connected(&half, connected)?;
            }
            return Ok(());
        }
        if let Some(edge) = self.graph.edge_weights_mut().find(|e| e.id() == id) {
            match edge {
                Edge::Branch(b) => {
                    b.terminal1.connected = connected;
                    b.terminal2.connected = connected;
                }
                Edge::Hvdc(h) => {
                    h.terminal1.connected = connected;
                    h.terminal2.connected = connected;
                }
                Edge::TieLine(_) => {}
            }
            return Ok(());
        }
        match self.graph.node_weights_mut().find(|n| n.id() == id) {
            Some(Node::Gen(g)) => g.connected = connected,
            Some(Node::Load(l)) => l.connected = connected,
            Some(Node::DanglingLine(dl)) => dl.terminal.connected = connected,
            Some(Node::Bus(_)) => {
                return Err(TrmError::Network(format!(
                    "'{}' is a bus and cannot be connected or disconnected",
                    id
                )))
            }
            None => return Err(TrmError::Network(format!("element '{}' not found", id))),
        }
        Ok(())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a tie line; both dangling lines stay in the network, unpaired.
    pub fn remove_tie_line(&mut self, id: &str) -> TrmResult<TieLine> {
        let idx = self
            .graph
            .edge_indices()
            .find(|&idx| matches!(&self.graph[idx], Edge::TieLine(t) if t.id == id))
            .ok_or_else(|| TrmError::Network(format!("tie line '{}' not found", id)))?;
        match self.graph.remove_edge(idx) {
            Some(Edge::TieLine(t)) => Ok(t),
            _ => Err(TrmError::Network(format!("tie line '{}' not found", id))),
        }
    }

    /// Remove an unpaired dangling line.
    pub fn remove_dangling_line(&mut self, id: &str) -> TrmResult<DanglingLine> {
        if self.is_paired(id) {
            return Err(TrmError::Network(format!(
                "dangling line '{}' is paired and cannot be removed",
                id
            )));
        }
        let idx = self
            .graph
            .node_indices()
            .find(|&idx| matches!(&self.graph[idx], Node::DanglingLine(dl) if dl.id == id))
            .ok_or_else(|| TrmError::Network(format!("dangling line '{}' not found", id)))?;
        match self.graph.remove_node(idx) {
            Some(Node::DanglingLine(dl)) => Ok(dl),
            _ => Err(TrmError::Network(format!("dangling line '{}' not found", id))),
        }
    }
}

/// Statistics about a network's size
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_phase_shifters: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub num_dangling_lines: usize,
    pub num_tie_lines: usize,
    pub num_hvdc_lines: usize,
    pub num_countries: usize,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses, {} branches ({} PSTs), {} dangling lines, {} tie lines, {} HVDC lines, {} countries",
            self.num_buses,
            self.num_branches,
            self.num_phase_shifters,
            self.num_dangling_lines,
            self.num_tie_lines,
            self.num_hvdc_lines,
            self.num_countries
        )
    }
}
