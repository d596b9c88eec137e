//! UCTE structured branch keys and the reference topology index.
//!
//! A UCTE branch id reads `NODE1(8) ' ' NODE2(8) ' ' ORDER`, e.g.
//! `FFI1AA1  BBE1AA1  1`. The last character of a node code is the busbar
//! letter, which exchange processes do not keep stable between two models of
//! the same grid, so it is ignored when comparing keys.

use super::MatchOutcome;
use std::collections::{BTreeSet, HashMap};
use trm_core::{Edge, Network};

const NODE_LENGTH: usize = 8;
const SUFFIX_START: usize = 2 * NODE_LENGTH + 2;

/// Character position inside a node code that matches anything.
pub const WILDCARD_POSITION: usize = 7;
pub const WILDCARD: char = '*';

/// `(side1, side2, suffix)` triple of a branch, node codes normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UcteBranchKey {
    pub node1: String,
    pub node2: String,
    pub suffix: String,
}

fn normalize_node(node: &[char]) -> String {
    node.iter()
        .enumerate()
        .map(|(i, &c)| if i == WILDCARD_POSITION { WILDCARD } else { c })
        .collect()
}

impl UcteBranchKey {
    /// Split an id into its node codes and order suffix.
    ///
    /// Returns `None` when the id does not follow the UCTE layout.
    pub fn parse(id: &str) -> Option<Self> {
        let chars: Vec<char> = id.chars().collect();
        if chars.len() <= SUFFIX_START
            || chars[NODE_LENGTH] != ' '
            || chars[2 * NODE_LENGTH + 1] != ' '
        {
            return None;
        }
        let suffix: String = chars[SUFFIX_START..].iter().collect();
        let suffix = suffix.trim().to_string();
        if suffix.is_empty() {
            return None;
        }
        Some(Self {
            node1: normalize_node(&chars[..NODE_LENGTH]),
            node2: normalize_node(&chars[NODE_LENGTH + 1..2 * NODE_LENGTH + 1]),
            suffix,
        })
    }

    /// Same nodes, different suffix (element name key).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            node1: self.node1.clone(),
            node2: self.node2.clone(),
            suffix: suffix.trim().to_string(),
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            node1: self.node2.clone(),
            node2: self.node1.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

/// Branches and tie lines of a network, indexed by their order-suffix key and
/// by their element-name key, under both orientations.
#[derive(Debug, Default)]
pub struct UcteTopologyIndex {
    by_order: HashMap<UcteBranchKey, BTreeSet<String>>,
    by_element_name: HashMap<UcteBranchKey, BTreeSet<String>>,
}

impl UcteTopologyIndex {
    pub fn new(network: &Network) -> Self {
        let mut index = Self::default();
        for edge in network.graph.edge_weights() {
            let element_name = match edge {
                Edge::Branch(branch) => branch.element_name.as_deref(),
                Edge::TieLine(_) => None,
                Edge::Hvdc(_) => continue,
            };
            let Some(key) = UcteBranchKey::parse(edge.id()) else {
                continue;
            };
            insert_both_orientations(&mut index.by_order, &key, edge.id());
            if let Some(name) = element_name.filter(|n| !n.trim().is_empty()) {
                insert_both_orientations(
                    &mut index.by_element_name,
                    &key.with_suffix(name),
                    edge.id(),
                );
            }
        }
        index
    }

    pub fn match_order_code(&self, key: &UcteBranchKey) -> MatchOutcome {
        outcome(self.by_order.get(key))
    }

    pub fn match_element_name(&self, key: &UcteBranchKey) -> MatchOutcome {
        outcome(self.by_element_name.get(key))
    }
}

fn insert_both_orientations(
    index: &mut HashMap<UcteBranchKey, BTreeSet<String>>,
    key: &UcteBranchKey,
    id: &str,
) {
    index.entry(key.clone()).or_default().insert(id.to_string());
    index.entry(key.swapped()).or_default().insert(id.to_string());
}

fn outcome(candidates: Option<&BTreeSet<String>>) -> MatchOutcome {
    let ids: Vec<String> = candidates.into_iter().flatten().cloned().collect();
    MatchOutcome::from_candidates(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_nodes_and_suffix() {
        let key = UcteBranchKey::parse("FFI1AA1  BBE1AA1  1").unwrap();
        assert_eq!(key.node1, "FFI1AA1*");
        assert_eq!(key.node2, "BBE1AA1*");
        assert_eq!(key.suffix, "1");
    }

    #[test]
    fn busbar_character_is_ignored() {
        let a = UcteBranchKey::parse("FFI1AA11 BBE1AA1  1").unwrap();
        let b = UcteBranchKey::parse("FFI1AA12 BBE1AA1  1").unwrap();
        assert_eq!(a, b);
        let c = UcteBranchKey::parse("FFI1AB11 BBE1AA1  1").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(UcteBranchKey::parse("LINE_1").is_none());
        assert!(UcteBranchKey::parse("FFI1AA1 _BBE1AA1  1").is_none());
        assert!(UcteBranchKey::parse("FFI1AA1  BBE1AA1   ").is_none());
        assert!(UcteBranchKey::parse("FFI1AA1  BBE1AA1 ").is_none());
    }

    #[test]
    fn element_name_key_keeps_nodes() {
        let key = UcteBranchKey::parse("FFI1AA1  BBE1AA1  1").unwrap();
        let named = key.with_suffix(" NAME ");
        assert_eq!(named.node1, key.node1);
        assert_eq!(named.suffix, "NAME");
        assert_eq!(named.swapped().node1, key.node2);
    }
}
