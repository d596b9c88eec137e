//! Selection of the monitored branches of the reference network.

use std::collections::BTreeSet;
use trm_core::{Country, Network};

/// Source of the critical network elements on which uncertainties are computed.
pub trait CriticalElementProvider: Send + Sync {
    /// Ids of reference-network elements, sorted.
    fn network_elements(&self, network: &Network) -> BTreeSet<String>;
}

/// A fixed list of ids, restricted to the branch-like elements that exist.
#[derive(Debug, Clone, Default)]
pub struct ElementIdsProvider {
    ids: BTreeSet<String>,
}

impl ElementIdsProvider {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl CriticalElementProvider for ElementIdsProvider {
    fn network_elements(&self, network: &Network) -> BTreeSet<String> {
        network
            .branch_like_ids()
            .into_iter()
            .filter(|id| self.ids.contains(id))
            .collect()
    }
}

/// Branches and tie lines whose two sides lie in different countries.
///
/// With a country restriction, at least one side must be in one of them.
#[derive(Debug, Clone, Default)]
pub struct InterconnectionsProvider {
    countries: Option<BTreeSet<Country>>,
}

impl InterconnectionsProvider {
    pub fn all() -> Self {
        Self { countries: None }
    }

    pub fn for_countries(countries: impl IntoIterator<Item = Country>) -> Self {
        Self {
            countries: Some(countries.into_iter().collect()),
        }
    }
}

impl CriticalElementProvider for InterconnectionsProvider {
    fn network_elements(&self, network: &Network) -> BTreeSet<String> {
        network
            .branch_like_ids()
            .into_iter()
            .filter(|id| {
                let Some((Some(c1), Some(c2))) = network.branch_countries(id) else {
                    return false;
                };
                c1 != c2
                    && self
                        .countries
                        .as_ref()
                        .map_or(true, |set| set.contains(&c1) || set.contains(&c2))
            })
            .collect()
    }
}

/// Branches touching one of the given countries at or above a nominal voltage.
#[derive(Debug, Clone)]
pub struct CountryBranchesProvider {
    countries: BTreeSet<Country>,
    min_nominal_kv: f64,
}

impl CountryBranchesProvider {
    pub fn new(countries: impl IntoIterator<Item = Country>, min_nominal_kv: f64) -> Self {
        Self {
            countries: countries.into_iter().collect(),
            min_nominal_kv,
        }
    }
}

impl CriticalElementProvider for CountryBranchesProvider {
    fn network_elements(&self, network: &Network) -> BTreeSet<String> {
        network
            .branch_like_ids()
            .into_iter()
            .filter(|id| {
                let in_country = network
                    .branch_countries(id)
                    .map(|(c1, c2)| {
                        [c1, c2]
                            .into_iter()
                            .flatten()
                            .any(|c| self.countries.contains(&c))
                    })
                    .unwrap_or(false);
                in_country
                    && network
                        .nominal_kv_of(id)
                        .is_some_and(|kv| kv >= self.min_nominal_kv)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use trm_core::{Branch, Bus};

    #[test]
    fn fixed_ids_are_filtered_to_existing_branches() {
        let network = three_country_network();
        let provider = ElementIdsProvider::new([FR_BE, "NOT_THERE", DE_FR]);
        let ids: Vec<String> = provider.network_elements(&network).into_iter().collect();
        assert_eq!(ids, vec![DE_FR.to_string(), FR_BE.to_string()]);
    }

    #[test]
    fn interconnections_exclude_internal_branches() {
        let network = three_country_network();
        let ids = InterconnectionsProvider::all().network_elements(&network);
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(FR_PST));
    }

    #[test]
    fn interconnections_restricted_to_countries() {
        let network = three_country_network();
        let ids = InterconnectionsProvider::for_countries([Country::BE]).network_elements(&network);
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec![BE_DE, FR_BE]);
    }

    #[test]
    fn country_branches_apply_voltage_threshold() {
        let mut network = three_country_network();
        network
            .add_bus(Bus::new("FFR3AA2 ", "FFR3AA2", 225.0).in_country(Country::FR))
            .unwrap();
        network
            .add_bus(Bus::new("FFR4AA2 ", "FFR4AA2", 225.0).in_country(Country::FR))
            .unwrap();
        network
            .add_branch(Branch::line("FFR3AA2  FFR4AA2  1", "FFR3AA2 ", "FFR4AA2 "))
            .unwrap();

        let high = CountryBranchesProvider::new([Country::FR], 380.0).network_elements(&network);
        assert!(!high.contains("FFR3AA2  FFR4AA2  1"));
        assert!(high.contains(FR_PST));
        assert!(high.contains(FR_BE));
        assert!(!high.contains(BE_DE));

        let all = CountryBranchesProvider::new([Country::FR], 0.0).network_elements(&network);
        assert!(all.contains("FFR3AA2  FFR4AA2  1"));
    }
}
