//! Network actions of a CRAC (contingency and remedial action catalogue).
//!
//! Only what the alignment needs is modeled: named bundles of elementary
//! actions that open/close elements or move phase-shifter taps, together with
//! the "would this change the network" predicate.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use trm_core::{Network, TrmError, TrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementaryAction {
    Topological {
        element_id: String,
        action: ActionType,
    },
    PstTapPosition {
        transformer_id: String,
        tap_position: i32,
    },
}

impl ElementaryAction {
    pub fn open(element_id: impl Into<String>) -> Self {
        ElementaryAction::Topological {
            element_id: element_id.into(),
            action: ActionType::Open,
        }
    }

    pub fn close(element_id: impl Into<String>) -> Self {
        ElementaryAction::Topological {
            element_id: element_id.into(),
            action: ActionType::Close,
        }
    }

    pub fn pst_tap(transformer_id: impl Into<String>, tap_position: i32) -> Self {
        ElementaryAction::PstTapPosition {
            transformer_id: transformer_id.into(),
            tap_position,
        }
    }

    /// Whether applying the action would change `network`.
    ///
    /// An element unknown to the network is never impacted.
    pub fn has_impact_on_network(&self, network: &Network) -> bool {
        match self {
            ElementaryAction::Topological { element_id, action } => {
                match network.connection_states(element_id) {
                    Some(states) => match action {
                        ActionType::Open => states.iter().any(|&connected| connected),
                        ActionType::Close => states.iter().any(|&connected| !connected),
                    },
                    None => false,
                }
            }
            ElementaryAction::PstTapPosition {
                transformer_id,
                tap_position,
            } => network
                .branch(transformer_id)
                .and_then(|b| b.phase_tap_changer.as_ref())
                .map(|ptc| ptc.tap_position != *tap_position)
                .unwrap_or(false),
        }
    }

    pub fn apply(&self, network: &mut Network) -> TrmResult<()> {
        match self {
            ElementaryAction::Topological { element_id, action } => {
                network.set_connected(element_id, *action == ActionType::Close)
            }
            ElementaryAction::PstTapPosition {
                transformer_id,
                tap_position,
            } => {
                let branch = network.branch_mut(transformer_id).ok_or_else(|| {
                    TrmError::Network(format!("transformer '{}' not found", transformer_id))
                })?;
                let ptc = branch.phase_tap_changer.as_mut().ok_or_else(|| {
                    TrmError::Configuration(format!(
                        "'{}' has no phase tap changer",
                        transformer_id
                    ))
                })?;
                ptc.set_tap_position(*tap_position)
            }
        }
    }
}

/// Named bundle of elementary actions applied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAction {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub elementary_actions: Vec<ElementaryAction>,
}

impl NetworkAction {
    pub fn new(id: impl Into<String>, elementary_actions: Vec<ElementaryAction>) -> Self {
        Self {
            id: id.into(),
            name: None,
            elementary_actions,
        }
    }

    pub fn has_impact_on_network(&self, network: &Network) -> bool {
        self.elementary_actions
            .iter()
            .any(|action| action.has_impact_on_network(network))
    }

    pub fn apply(&self, network: &mut Network) -> TrmResult<()> {
        for action in &self.elementary_actions {
            action.apply(network)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crac {
    pub id: String,
    #[serde(default)]
    pub network_actions: Vec<NetworkAction>,
}

impl Crac {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network_actions: Vec::new(),
        }
    }

    pub fn with_network_action(mut self, action: NetworkAction) -> Self {
        self.network_actions.push(action);
        self
    }

    pub fn network_action(&self, id: &str) -> Option<&NetworkAction> {
        self.network_actions.iter().find(|a| a.id == id)
    }
}

/// Read a CRAC from a YAML or JSON file, chosen by extension.
pub fn load_crac_from_path(path: &Path) -> Result<Crac> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading CRAC '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing CRAC json")
        }
        _ => serde_yaml::from_str(&data).context("parsing CRAC yaml"),
    }
}
