//! Parameters of a TRM computation and their YAML/JSON loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use trm_core::{
    BalanceAdjustmentParameters, Country, LoadFlowParameters, SensitivityParameters, TrmError,
    TrmResult,
};

/// How market-based element ids are paired with reference ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStrategy {
    /// UCTE structured keys, busbar character ignored
    #[default]
    Ucte,
    /// Same id in both networks
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrmParameters {
    pub load_flow: LoadFlowParameters,
    pub sensitivity: SensitivityParameters,
    pub balance_adjustment: BalanceAdjustmentParameters,
    /// Tolerance on net positions and exchanges (MW)
    pub exchange_epsilon_mw: f64,
    pub mapping_strategy: MappingStrategy,
    /// Restrict identifier matching to elements touching these countries
    pub country_filter: Option<BTreeSet<Country>>,
}

fn default_exchange_epsilon() -> f64 {
    1e-3
}

impl Default for TrmParameters {
    fn default() -> Self {
        Self {
            load_flow: LoadFlowParameters::default(),
            sensitivity: SensitivityParameters::default(),
            balance_adjustment: BalanceAdjustmentParameters::default(),
            exchange_epsilon_mw: default_exchange_epsilon(),
            mapping_strategy: MappingStrategy::default(),
            country_filter: None,
        }
    }
}

impl TrmParameters {
    pub fn with_mapping_strategy(mut self, strategy: MappingStrategy) -> Self {
        self.mapping_strategy = strategy;
        self
    }

    pub fn with_country_filter(mut self, countries: impl IntoIterator<Item = Country>) -> Self {
        self.country_filter = Some(countries.into_iter().collect());
        self
    }

    pub fn validate(&self) -> TrmResult<()> {
        if self.exchange_epsilon_mw.is_nan() || self.exchange_epsilon_mw <= 0.0 {
            return Err(TrmError::Configuration(format!(
                "exchange epsilon must be strictly positive, got {}",
                self.exchange_epsilon_mw
            )));
        }
        if self.balance_adjustment.max_iterations == 0 {
            return Err(TrmError::Configuration(
                "balance adjustment needs at least one iteration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read parameters from a YAML or JSON file, chosen by extension.
pub fn load_parameters_from_path(path: &Path) -> Result<TrmParameters> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading TRM parameters '{}'", path.display()))?;
    let parameters: TrmParameters = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing TRM parameters yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing TRM parameters json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing TRM parameters")?,
    };
    parameters
        .validate()
        .with_context(|| format!("validating TRM parameters '{}'", path.display()))?;
    Ok(parameters)
}
