//! Zonal data: generation shift keys and scalables indexed by zone.
//!
//! A zone is named by a string; for country-based bidding zones the name is the
//! country code (`"FR"`, `"BE"`, ...), see [`ZonalData::get_country`].

use crate::{Country, Network, TrmError, TrmResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element id with a participation weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedElement {
    pub id: String,
    pub weight: f64,
}

impl WeightedElement {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }
}

/// Data of type `T` indexed by zone name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZonalData<T> {
    zones: BTreeMap<String, T>,
}

impl<T> Default for ZonalData<T> {
    fn default() -> Self {
        Self {
            zones: BTreeMap::new(),
        }
    }
}

impl<T> ZonalData<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, zone: impl Into<String>, data: T) -> Self {
        self.zones.insert(zone.into(), data);
        self
    }

    pub fn insert(&mut self, zone: impl Into<String>, data: T) {
        self.zones.insert(zone.into(), data);
    }

    pub fn get(&self, zone: &str) -> Option<&T> {
        self.zones.get(zone)
    }

    pub fn get_country(&self, country: Country) -> Option<&T> {
        self.get(country.as_str())
    }

    /// Zones in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.zones.iter().map(|(zone, data)| (zone.as_str(), data))
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl<T, Z: Into<String>> FromIterator<(Z, T)> for ZonalData<T> {
    fn from_iter<I: IntoIterator<Item = (Z, T)>>(iter: I) -> Self {
        Self {
            zones: iter.into_iter().map(|(z, t)| (z.into(), t)).collect(),
        }
    }
}

/// Generation (and load) shift keys: per zone, the weighted injections whose
/// combined shift defines the zone's injection variable.
pub type ZonalGlsk = ZonalData<Vec<WeightedElement>>;

/// Per zone, the generators allowed to move to reach a target net position.
pub type ZonalScalable = ZonalData<Scalable>;

/// Proportional allocation of an active power shift over generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalable {
    pub generators: Vec<WeightedElement>,
}

impl Scalable {
    pub fn proportional(generators: Vec<WeightedElement>) -> Self {
        Self { generators }
    }

    /// Shift the set points of the scalable generators by `asked_mw` in total,
    /// in proportion to their weights and clipped to their limits.
    ///
    /// Returns the shift actually applied.
    pub fn scale(&self, network: &mut Network, asked_mw: f64) -> TrmResult<f64> {
        let total_weight: f64 = self.generators.iter().map(|g| g.weight).sum();
        if total_weight.abs() < 1e-12 {
            return Err(TrmError::Configuration(
                "scalable weights sum to zero".to_string(),
            ));
        }
        let mut done = 0.0;
        for element in &self.generators {
            let gen = network.generator_mut(&element.id).ok_or_else(|| {
                TrmError::Network(format!("scalable generator '{}' not found", element.id))
            })?;
            let before = gen.target_p_mw;
            let wanted = before + asked_mw * element.weight / total_weight;
            gen.target_p_mw = wanted.clamp(gen.min_p_mw, gen.max_p_mw);
            done += gen.target_p_mw - before;
        }
        Ok(done)
    }
}
