//! Area balance queries: border flows and country net positions.
//!
//! Both are derived from the terminal flows stored on the network, so a load
//! flow must have populated them first. Non-finite flows (never computed, or
//! disconnected terminals) contribute nothing.
//!
//! ```text
//! leaving_flow(a, b) = Σ p(side in a)   over elements linking a and b
//! net_position(a)    = Σ_x leaving_flow(a, x) + Σ p(unpaired boundary lines in a)
//! ```

use crate::{Country, Edge, Network, Node};

/// Countries and side-1/side-2 flows of a branch-like edge.
struct BorderCrossing {
    country1: Option<Country>,
    country2: Option<Country>,
    p1: f64,
    p2: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl Network {
    fn border_crossings(&self) -> Vec<BorderCrossing> {
        self.graph
            .edge_weights()
            .filter_map(|edge| {
                let (p1, p2) = match edge {
                    Edge::Branch(b) => (b.terminal1.flow(), b.terminal2.flow()),
                    Edge::Hvdc(h) => (h.terminal1.flow(), h.terminal2.flow()),
                    Edge::TieLine(t) => (
                        self.dangling_line(&t.dangling_line_1)?.terminal.flow(),
                        self.dangling_line(&t.dangling_line_2)?.terminal.flow(),
                    ),
                };
                let (country1, country2) = self.branch_countries(edge.id())?;
                Some(BorderCrossing {
                    country1,
                    country2,
                    p1,
                    p2,
                })
            })
            .filter(|crossing| crossing.country1 != crossing.country2)
            .collect()
    }

    /// Active power leaving `from` towards `to` (MW).
    pub fn leaving_flow(&self, from: Country, to: Country) -> f64 {
        if from == to {
            return 0.0;
        }
        self.border_crossings()
            .iter()
            .map(|c| {
                if c.country1 == Some(from) && c.country2 == Some(to) {
                    finite_or_zero(c.p1)
                } else if c.country2 == Some(from) && c.country1 == Some(to) {
                    finite_or_zero(c.p2)
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Net export of `country` (MW): positive when the country exports.
    pub fn net_position(&self, country: Country) -> f64 {
        let interconnections: f64 = self
            .countries()
            .into_iter()
            .filter(|&other| other != country)
            .map(|other| self.leaving_flow(country, other))
            .sum();

        let boundary: f64 = self
            .graph
            .node_weights()
            .filter_map(|n| match n {
                Node::DanglingLine(dl) if !self.is_paired(&dl.id) => Some(dl),
                _ => None,
            })
            .filter(|dl| self.bus_country(&dl.terminal.bus_id) == Some(country))
            .map(|dl| finite_or_zero(dl.terminal.flow()))
            .sum();

        interconnections + boundary
    }
}
