//! Identifier correspondence between a reference and a market-based network.
//!
//! Two independently built models of the same grid do not always name their
//! elements the same way. [`IdentifiableMapping`] pairs each market-based
//! branch with at most one reference branch, and each reference branch with at
//! most one market-based branch:
//!
//! 1. every market branch proposes the reference branches found under its
//!    UCTE order-suffix key, then under its element-name key (see [`ucte`]);
//! 2. only unambiguous candidates ([`MatchOutcome::SingleMatch`]) are proposed;
//! 3. proposals are folded by [`MappingAccumulator`]: a pairing that conflicts
//!    with an earlier one invalidates both, and invalidated ids never come back.
//!
//! The fold is order sensitive; proposals are produced per market branch in id
//! order, order-suffix key before element-name key.

pub mod ucte;

use crate::params::MappingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use trm_core::{Country, Network, NetworkSide, TrmError, TrmResult};
use ucte::{UcteBranchKey, UcteTopologyIndex};

/// Outcome of looking up one market element among the reference candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    SingleMatch(String),
    MultipleMatches(Vec<String>),
}

impl MatchOutcome {
    pub fn from_candidates(mut candidates: Vec<String>) -> Self {
        match candidates.len() {
            0 => MatchOutcome::NoMatch,
            1 => MatchOutcome::SingleMatch(candidates.remove(0)),
            _ => {
                candidates.sort();
                MatchOutcome::MultipleMatches(candidates)
            }
        }
    }
}

/// Duplicate-resolution fold over proposed `(market, reference)` pairings.
#[derive(Debug, Clone, Default)]
pub struct MappingAccumulator {
    market_to_reference: BTreeMap<String, String>,
    reference_to_market: BTreeMap<String, String>,
    invalidated_market_ids: BTreeSet<String>,
    invalidated_reference_ids: BTreeSet<String>,
}

impl MappingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold step: record the pairing, or invalidate it together with every
    /// pairing it conflicts with.
    pub fn with_pairing(mut self, market_id: &str, reference_id: &str) -> Self {
        self.add_mapping_or_invalidate_duplicates(market_id, reference_id);
        self
    }

    pub fn add_mapping_or_invalidate_duplicates(&mut self, market_id: &str, reference_id: &str) {
        if self.invalidated_market_ids.contains(market_id)
            || self.invalidated_reference_ids.contains(reference_id)
        {
            debug!(
                market_id,
                reference_id, "dropping pairing of an already invalidated element"
            );
            return;
        }

        let previous_reference = self.market_to_reference.get(market_id).cloned();
        let previous_market = self.reference_to_market.get(reference_id).cloned();
        if previous_reference.as_deref() == Some(reference_id) {
            return;
        }

        let conflicting_reference = previous_reference.filter(|r| r != reference_id);
        let conflicting_market = previous_market.filter(|m| m != market_id);
        if conflicting_reference.is_none() && conflicting_market.is_none() {
            self.market_to_reference
                .insert(market_id.to_string(), reference_id.to_string());
            self.reference_to_market
                .insert(reference_id.to_string(), market_id.to_string());
            return;
        }

        if let Some(other_reference) = conflicting_reference {
            warn!(
                market_id,
                reference_id,
                previous = other_reference.as_str(),
                "market element matches several reference elements, invalidating"
            );
            self.reference_to_market.remove(&other_reference);
            self.invalidated_reference_ids.insert(other_reference);
        }
        if let Some(other_market) = conflicting_market {
            warn!(
                market_id,
                reference_id,
                previous = other_market.as_str(),
                "reference element matches several market elements, invalidating"
            );
            self.market_to_reference.remove(&other_market);
            self.invalidated_market_ids.insert(other_market);
        }
        self.market_to_reference.remove(market_id);
        self.reference_to_market.remove(reference_id);
        self.invalidated_market_ids.insert(market_id.to_string());
        self.invalidated_reference_ids
            .insert(reference_id.to_string());
    }

    pub fn finish(self) -> IdentifiableMapping {
        IdentifiableMapping {
            market_to_reference: self.market_to_reference,
            reference_to_market: self.reference_to_market,
            invalidated_market_ids: self.invalidated_market_ids,
            invalidated_reference_ids: self.invalidated_reference_ids,
        }
    }
}

/// Bijective correspondence between market-based and reference element ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifiableMapping {
    market_to_reference: BTreeMap<String, String>,
    reference_to_market: BTreeMap<String, String>,
    invalidated_market_ids: BTreeSet<String>,
    invalidated_reference_ids: BTreeSet<String>,
}

impl IdentifiableMapping {
    /// Fold `(market, reference)` proposals, in order.
    pub fn from_pairings<I, M, R>(pairings: I) -> Self
    where
        I: IntoIterator<Item = (M, R)>,
        M: AsRef<str>,
        R: AsRef<str>,
    {
        pairings
            .into_iter()
            .fold(MappingAccumulator::new(), |acc, (m, r)| {
                acc.with_pairing(m.as_ref(), r.as_ref())
            })
            .finish()
    }

    /// Match market branches and tie lines onto reference ones through their
    /// UCTE keys.
    ///
    /// With a country filter, only market elements with at least one side in
    /// one of the countries are considered.
    pub fn build(
        reference: &Network,
        market: &Network,
        country_filter: Option<&BTreeSet<Country>>,
    ) -> Self {
        let index = UcteTopologyIndex::new(reference);
        let mut proposals = Vec::new();

        for market_id in market.branch_like_ids() {
            if let Some(filter) = country_filter {
                let touches_filter = market
                    .branch_countries(&market_id)
                    .map(|(c1, c2)| [c1, c2].into_iter().flatten().any(|c| filter.contains(&c)))
                    .unwrap_or(false);
                if !touches_filter {
                    continue;
                }
            }
            let Some(key) = UcteBranchKey::parse(&market_id) else {
                debug!(market_id = market_id.as_str(), "not a UCTE branch id, skipped");
                continue;
            };

            let mut outcomes = vec![("order code", index.match_order_code(&key))];
            if let Some(name) = market.element_name(&market_id) {
                let by_name = index.match_element_name(&key.with_suffix(name));
                outcomes.push(("element name", by_name));
            }
            for (key_kind, outcome) in outcomes {
                match outcome {
                    MatchOutcome::SingleMatch(reference_id) => {
                        proposals.push((market_id.clone(), reference_id));
                    }
                    MatchOutcome::MultipleMatches(candidates) => warn!(
                        market_id = market_id.as_str(),
                        key = key_kind,
                        "several reference candidates: {:?}",
                        candidates
                    ),
                    MatchOutcome::NoMatch => debug!(
                        market_id = market_id.as_str(),
                        key = key_kind,
                        "no reference candidate"
                    ),
                }
            }
        }

        let mapping = Self::from_pairings(proposals);
        debug!(
            mapped = mapping.len(),
            invalidated = mapping.invalidated_market_ids.len(),
            "identifiable mapping built"
        );
        mapping
    }

    /// Pair every branch and tie line whose id exists in both networks.
    pub fn identity(reference: &Network, market: &Network) -> Self {
        let reference_ids: BTreeSet<String> = reference.branch_like_ids().into_iter().collect();
        Self::from_pairings(
            market
                .branch_like_ids()
                .into_iter()
                .filter(|id| reference_ids.contains(id))
                .map(|id| (id.clone(), id)),
        )
    }

    pub fn with_strategy(
        strategy: MappingStrategy,
        reference: &Network,
        market: &Network,
        country_filter: Option<&BTreeSet<Country>>,
    ) -> Self {
        match strategy {
            MappingStrategy::Ucte => Self::build(reference, market, country_filter),
            MappingStrategy::Identity => Self::identity(reference, market),
        }
    }

    pub fn id_in_reference(&self, market_id: &str) -> TrmResult<&str> {
        self.try_id_in_reference(market_id)
            .ok_or_else(|| TrmError::MappingNotFound {
                id: market_id.to_string(),
                side: NetworkSide::Reference,
            })
    }

    pub fn id_in_market_based(&self, reference_id: &str) -> TrmResult<&str> {
        self.try_id_in_market_based(reference_id)
            .ok_or_else(|| TrmError::MappingNotFound {
                id: reference_id.to_string(),
                side: NetworkSide::MarketBased,
            })
    }

    pub fn try_id_in_reference(&self, market_id: &str) -> Option<&str> {
        self.market_to_reference.get(market_id).map(String::as_str)
    }

    pub fn try_id_in_market_based(&self, reference_id: &str) -> Option<&str> {
        self.reference_to_market.get(reference_id).map(String::as_str)
    }

    /// `(market, reference)` pairs, by market id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.market_to_reference
            .iter()
            .map(|(m, r)| (m.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.market_to_reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.market_to_reference.is_empty()
    }

    pub fn invalidated_market_ids(&self) -> &BTreeSet<String> {
        &self.invalidated_market_ids
    }

    pub fn invalidated_reference_ids(&self) -> &BTreeSet<String> {
        &self.invalidated_reference_ids
    }
}
