//! Net position and exchange reconciliation.
//!
//! The market-based network is redispatched so that each country reproduces
//! the flow pattern of the reference network:
//!
//! ```text
//! target(c) = NP_market(c) + Σ_x E_ref(c→x) - Σ_x E_market(c→x)
//! ```
//!
//! where `x` ranges over the other countries of the reference network. A
//! country unknown to the reference network keeps its market-based net
//! position. Net position equality does not imply exchange equality as soon as
//! three countries interact, hence the distinction between
//! [`ExchangeAlignerStatus::AlignedWithBalanceAdjustment`] and
//! [`ExchangeAlignerStatus::TargetNetPositionReachedButExchangeNotAligned`].

use super::{AlignmentReport, OperationalConditionAligner};
use crate::params::TrmParameters;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trm_core::{
    run_load_flow, BalanceAdjuster, BalanceAdjustmentParameters, BalanceArea,
    BalanceComputationResult, Country, LoadFlowEngine, LoadFlowParameters, Network, TrmError,
    TrmResult, ZonalScalable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeAlignerStatus {
    /// Net positions already matched, no balance computation run
    AlreadyAligned,
    AlignedWithBalanceAdjustment,
    TargetNetPositionReachedButExchangeNotAligned,
    /// Balance computation did not converge
    #[serde(alias = "NOT_ALIGNED")]
    Failed,
}

/// Net position per country and leaving flow per ordered country pair (MW).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeAndNetPosition {
    pub net_positions: BTreeMap<Country, f64>,
    pub exchanges: BTreeMap<Country, BTreeMap<Country, f64>>,
}

impl ExchangeAndNetPosition {
    /// Read net positions and exchanges of `countries` from the terminal flows
    /// of `network`.
    pub fn compute(network: &Network, countries: &BTreeSet<Country>) -> Self {
        let mut state = Self::default();
        for &country in countries {
            state
                .net_positions
                .insert(country, network.net_position(country));
            let leaving: BTreeMap<Country, f64> = countries
                .iter()
                .filter(|&&other| other != country)
                .map(|&other| (other, network.leaving_flow(country, other)))
                .collect();
            state.exchanges.insert(country, leaving);
        }
        state
    }

    pub fn net_position(&self, country: Country) -> f64 {
        self.net_positions.get(&country).copied().unwrap_or(0.0)
    }

    pub fn exchange(&self, from: Country, to: Country) -> f64 {
        self.exchanges
            .get(&from)
            .and_then(|leaving| leaving.get(&to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of the exchanges from `country` to every other country of `towards`.
    pub fn total_leaving_flow(&self, country: Country, towards: &BTreeSet<Country>) -> f64 {
        towards
            .iter()
            .filter(|&&other| other != country)
            .map(|&other| self.exchange(country, other))
            .sum()
    }

    /// Largest net position difference over the countries of either side.
    pub fn max_net_position_gap(&self, other: &Self) -> f64 {
        self.net_positions
            .keys()
            .chain(other.net_positions.keys())
            .map(|&c| (self.net_position(c) - other.net_position(c)).abs())
            .fold(0.0, f64::max)
    }

    /// Largest exchange difference over the ordered pairs of `countries`.
    pub fn max_exchange_gap(&self, other: &Self, countries: &BTreeSet<Country>) -> f64 {
        countries
            .iter()
            .flat_map(|&a| countries.iter().map(move |&b| (a, b)))
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (self.exchange(a, b) - other.exchange(a, b)).abs())
            .fold(0.0, f64::max)
    }
}

/// Outcome of an exchange alignment.
///
/// `target_net_positions` and `balance_computation` are absent when the
/// networks were already aligned; `new_market_based` is absent unless the
/// balance computation converged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeAlignerResult {
    pub reference: ExchangeAndNetPosition,
    pub initial_market_based: ExchangeAndNetPosition,
    pub target_net_positions: Option<BTreeMap<Country, f64>>,
    pub balance_computation: Option<BalanceComputationResult>,
    pub new_market_based: Option<ExchangeAndNetPosition>,
    pub status: ExchangeAlignerStatus,
}

impl ExchangeAlignerResult {
    pub fn already_aligned(
        reference: ExchangeAndNetPosition,
        initial_market_based: ExchangeAndNetPosition,
    ) -> Self {
        Self {
            reference,
            initial_market_based,
            target_net_positions: None,
            balance_computation: None,
            new_market_based: None,
            status: ExchangeAlignerStatus::AlreadyAligned,
        }
    }

    pub fn balance_failed(
        reference: ExchangeAndNetPosition,
        initial_market_based: ExchangeAndNetPosition,
        target_net_positions: BTreeMap<Country, f64>,
        balance_computation: BalanceComputationResult,
    ) -> Self {
        Self {
            reference,
            initial_market_based,
            target_net_positions: Some(target_net_positions),
            balance_computation: Some(balance_computation),
            new_market_based: None,
            status: ExchangeAlignerStatus::Failed,
        }
    }

    /// Result of a converged balance computation; `status` must be one of the
    /// post-adjustment outcomes.
    pub fn balanced(
        reference: ExchangeAndNetPosition,
        initial_market_based: ExchangeAndNetPosition,
        target_net_positions: BTreeMap<Country, f64>,
        balance_computation: BalanceComputationResult,
        new_market_based: ExchangeAndNetPosition,
        status: ExchangeAlignerStatus,
    ) -> TrmResult<Self> {
        if matches!(
            status,
            ExchangeAlignerStatus::AlreadyAligned | ExchangeAlignerStatus::Failed
        ) {
            return Err(TrmError::Inconsistency(format!(
                "{:?} is not the outcome of a converged balance computation",
                status
            )));
        }
        Ok(Self {
            reference,
            initial_market_based,
            target_net_positions: Some(target_net_positions),
            balance_computation: Some(balance_computation),
            new_market_based: Some(new_market_based),
            status,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeAlignerParameters {
    pub exchange_epsilon_mw: f64,
    pub load_flow: LoadFlowParameters,
    pub balance_adjustment: BalanceAdjustmentParameters,
}

impl Default for ExchangeAlignerParameters {
    fn default() -> Self {
        Self::from(&TrmParameters::default())
    }
}

impl From<&TrmParameters> for ExchangeAlignerParameters {
    fn from(params: &TrmParameters) -> Self {
        Self {
            exchange_epsilon_mw: params.exchange_epsilon_mw,
            load_flow: params.load_flow.clone(),
            balance_adjustment: params.balance_adjustment.clone(),
        }
    }
}

/// Drives the market-based net positions towards the reference flow pattern
/// through the external balance adjuster.
///
/// Flows are computed by the load-flow engine on the market-based network in
/// place and on a copy of the reference network.
pub struct ExchangeAligner {
    load_flow: Arc<dyn LoadFlowEngine>,
    balance_adjuster: Arc<dyn BalanceAdjuster>,
    market_scalable: ZonalScalable,
    parameters: ExchangeAlignerParameters,
}

fn format_countries<'a>(countries: impl IntoIterator<Item = &'a Country>) -> String {
    countries
        .into_iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ExchangeAligner {
    pub fn new(
        load_flow: Arc<dyn LoadFlowEngine>,
        balance_adjuster: Arc<dyn BalanceAdjuster>,
        market_scalable: ZonalScalable,
        parameters: ExchangeAlignerParameters,
    ) -> Self {
        Self {
            load_flow,
            balance_adjuster,
            market_scalable,
            parameters,
        }
    }

    pub fn parameters(&self) -> &ExchangeAlignerParameters {
        &self.parameters
    }

    fn target_net_positions(
        reference: &ExchangeAndNetPosition,
        initial: &ExchangeAndNetPosition,
        reference_countries: &BTreeSet<Country>,
        market_countries: &BTreeSet<Country>,
    ) -> BTreeMap<Country, f64> {
        market_countries
            .iter()
            .map(|&country| {
                let target = if reference_countries.contains(&country) {
                    initial.net_position(country)
                        + reference.total_leaving_flow(country, reference_countries)
                        - initial.total_leaving_flow(country, reference_countries)
                } else {
                    initial.net_position(country)
                };
                (country, target)
            })
            .collect()
    }

    fn balance_areas(
        &self,
        targets: &BTreeMap<Country, f64>,
    ) -> TrmResult<Vec<BalanceArea>> {
        let missing: Vec<&Country> = targets
            .keys()
            .filter(|c| self.market_scalable.get_country(**c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(TrmError::Configuration(format!(
                "No scalable found in the market-based zonal data for the following countries: [{}]",
                format_countries(missing)
            )));
        }
        Ok(targets
            .iter()
            .filter_map(|(&country, &target)| {
                self.market_scalable
                    .get_country(country)
                    .map(|scalable| BalanceArea {
                        name: country.to_string(),
                        country,
                        target_net_position_mw: target,
                        scalable: scalable.clone(),
                    })
            })
            .collect())
    }

    /// Align and return the typed result.
    pub fn align_exchanges(
        &self,
        reference: &Network,
        market: &mut Network,
    ) -> TrmResult<ExchangeAlignerResult> {
        let epsilon = self.parameters.exchange_epsilon_mw;
        let mut reference = reference.clone();
        run_load_flow(
            self.load_flow.as_ref(),
            &mut reference,
            &self.parameters.load_flow,
            "reference",
        )?;
        run_load_flow(
            self.load_flow.as_ref(),
            market,
            &self.parameters.load_flow,
            "market-based",
        )?;

        let reference_countries = reference.countries();
        let market_countries = market.countries();
        let all_countries: BTreeSet<Country> =
            reference_countries.union(&market_countries).copied().collect();
        let reference_state = ExchangeAndNetPosition::compute(&reference, &all_countries);
        let initial_state = ExchangeAndNetPosition::compute(market, &all_countries);

        let gap = initial_state.max_net_position_gap(&reference_state);
        if gap < epsilon {
            info!(gap_mw = gap, "net positions already aligned");
            return Ok(ExchangeAlignerResult::already_aligned(
                reference_state,
                initial_state,
            ));
        }

        let missing: Vec<&Country> = reference_countries.difference(&market_countries).collect();
        if !missing.is_empty() {
            return Err(TrmError::Configuration(format!(
                "Market-based network doesn't contain the following countries of the reference network: [{}]",
                format_countries(missing)
            )));
        }

        let targets = Self::target_net_positions(
            &reference_state,
            &initial_state,
            &reference_countries,
            &market_countries,
        );
        for (country, target) in &targets {
            debug!(
                country = %country,
                initial_mw = initial_state.net_position(*country),
                reference_mw = reference_state.net_position(*country),
                target_mw = target,
                "target net position"
            );
        }
        let areas = self.balance_areas(&targets)?;
        info!(
            adjuster = self.balance_adjuster.id(),
            areas = areas.len(),
            gap_mw = gap,
            "running balance adjustment"
        );
        let balance = self.balance_adjuster.adjust(
            market,
            &areas,
            &self.parameters.balance_adjustment,
        )?;
        if !balance.is_success() {
            warn!(
                iterations = balance.iteration_count,
                "balance adjustment did not converge"
            );
            return Ok(ExchangeAlignerResult::balance_failed(
                reference_state,
                initial_state,
                targets,
                balance,
            ));
        }

        let new_state = ExchangeAndNetPosition::compute(market, &all_countries);
        let missed_target = targets
            .iter()
            .map(|(&c, &target)| (new_state.net_position(c) - target).abs())
            .fold(0.0, f64::max);
        let exchange_gap = new_state.max_exchange_gap(&reference_state, &reference_countries);
        if missed_target > epsilon {
            warn!(
                missed_target_mw = missed_target,
                "balance adjustment converged away from the target net positions"
            );
        }
        let status = if exchange_gap > epsilon {
            ExchangeAlignerStatus::TargetNetPositionReachedButExchangeNotAligned
        } else {
            ExchangeAlignerStatus::AlignedWithBalanceAdjustment
        };
        info!(
            status = ?status,
            missed_target_mw = missed_target,
            exchange_gap_mw = exchange_gap,
            "exchange alignment done"
        );
        ExchangeAlignerResult::balanced(
            reference_state,
            initial_state,
            targets,
            balance,
            new_state,
            status,
        )
    }
}

impl OperationalConditionAligner for ExchangeAligner {
    fn name(&self) -> &str {
        "exchange"
    }

    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport> {
        self.align_exchanges(reference, market)
            .map(AlignmentReport::Exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use trm_core::BalanceComputationStatus;

    /// FR exports 120 MW, BE imports 70 MW and DE imports 50 MW:
    /// FR→BE 100, BE→DE 30, FR→DE 20.
    fn reference() -> Network {
        with_flows(
            three_country_network(),
            &[(FR_BE, 100.0), (BE_DE, 30.0), (DE_FR, -20.0)],
        )
    }

    fn aligner(adjuster: Arc<FlowScriptBalanceAdjuster>) -> (ExchangeAligner, Arc<FlowTableLoadFlow>) {
        let load_flow = Arc::new(FlowTableLoadFlow::new());
        let aligner = ExchangeAligner::new(
            load_flow.clone(),
            adjuster,
            country_scalables(&three_country_network()),
            ExchangeAlignerParameters::default(),
        );
        (aligner, load_flow)
    }

    #[test]
    fn already_aligned_skips_balance_adjustment() {
        let reference = reference();
        // different flow pattern, same net positions
        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 70.0), (BE_DE, 0.0), (DE_FR, -50.0)],
        );
        let adjuster = Arc::new(FlowScriptBalanceAdjuster::converging());
        let (aligner, load_flow) = aligner(adjuster.clone());

        let result = aligner.align_exchanges(&reference, &mut market).unwrap();
        assert_eq!(result.status, ExchangeAlignerStatus::AlreadyAligned);
        assert_eq!(adjuster.calls(), 0);
        assert_eq!(load_flow.calls(), 2);
        assert!(result.target_net_positions.is_none());
        assert!(result.balance_computation.is_none());
        assert!(result.new_market_based.is_none());
        assert!((result.reference.net_position(Country::FR) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn net_positions_reached_but_exchanges_differ() {
        let reference = reference();
        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
        );
        // reaches FR +120, BE -70, DE -50 through a different pattern
        let adjuster = Arc::new(
            FlowScriptBalanceAdjuster::converging()
                .with_flow(FR_BE, 70.0)
                .with_flow(BE_DE, 0.0)
                .with_flow(DE_FR, -50.0),
        );
        let (aligner, _) = aligner(adjuster.clone());

        let result = aligner.align_exchanges(&reference, &mut market).unwrap();
        assert_eq!(
            result.status,
            ExchangeAlignerStatus::TargetNetPositionReachedButExchangeNotAligned
        );
        assert_eq!(adjuster.calls(), 1);
        let targets = result.target_net_positions.as_ref().unwrap();
        assert!((targets[&Country::FR] - 120.0).abs() < 1e-9);
        assert!((targets[&Country::BE] + 70.0).abs() < 1e-9);
        assert!((targets[&Country::DE] + 50.0).abs() < 1e-9);
        let new_state = result.new_market_based.as_ref().unwrap();
        assert!((new_state.exchange(Country::FR, Country::BE) - 70.0).abs() < 1e-9);
        assert!((result.reference.exchange(Country::FR, Country::BE) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn aligned_with_balance_adjustment() {
        let reference = reference();
        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
        );
        let adjuster = Arc::new(
            FlowScriptBalanceAdjuster::converging()
                .with_flow(FR_BE, 100.0)
                .with_flow(BE_DE, 30.0)
                .with_flow(DE_FR, -20.0),
        );
        let (aligner, _) = aligner(adjuster.clone());
        let result = aligner.align_exchanges(&reference, &mut market).unwrap();
        assert_eq!(
            result.status,
            ExchangeAlignerStatus::AlignedWithBalanceAdjustment
        );
        let areas = adjuster.last_areas();
        assert_eq!(areas.len(), 3);
        assert!(areas.iter().all(|a| a.name == a.country.to_string()));
    }

    #[test]
    fn failed_balance_adjustment_keeps_diagnostics() {
        let reference = reference();
        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
        );
        let adjuster = Arc::new(FlowScriptBalanceAdjuster::new(
            BalanceComputationStatus::Failed,
        ));
        let (aligner, _) = aligner(adjuster);
        let result = aligner.align_exchanges(&reference, &mut market).unwrap();
        assert_eq!(result.status, ExchangeAlignerStatus::Failed);
        assert!(result.target_net_positions.is_some());
        assert!(result.balance_computation.is_some());
        assert!(result.new_market_based.is_none());
        assert!((result.initial_market_based.net_position(Country::FR) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn converged_balance_is_classified_on_exchanges() {
        let reference = reference();
        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
        );
        // flows untouched by the adjuster
        let adjuster = Arc::new(FlowScriptBalanceAdjuster::converging());
        let (aligner, _) = aligner(adjuster);
        let result = aligner.align_exchanges(&reference, &mut market).unwrap();
        assert_eq!(
            result.status,
            ExchangeAlignerStatus::TargetNetPositionReachedButExchangeNotAligned
        );
        assert!(result.new_market_based.is_some());
        assert!(result.balance_computation.unwrap().is_success());
    }

    #[test]
    fn country_missing_from_market_is_fatal() {
        let mut reference = reference();
        reference
            .add_bus(trm_core::Bus::new("NNL1AA1 ", "NNL1AA1", 400.0).in_country(Country::NL))
            .unwrap();
        reference
            .add_branch(trm_core::Branch::line("NNL1AA1  BBE1AA1  1", "NNL1AA1 ", "BBE1AA1 "))
            .unwrap();
        set_flow(&mut reference, "NNL1AA1  BBE1AA1  1", 10.0).unwrap();
        let mut market = three_country_network();
        let (aligner, _) = aligner(Arc::new(FlowScriptBalanceAdjuster::converging()));
        let err = aligner.align_exchanges(&reference, &mut market).unwrap_err();
        assert!(matches!(err, TrmError::Configuration(_)));
        assert!(err.to_string().contains("[NL]"));
    }

    #[test]
    fn missing_scalable_is_fatal() {
        let reference = reference();
        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
        );
        let adjuster = Arc::new(FlowScriptBalanceAdjuster::converging());
        let scalable: ZonalScalable = country_scalables(&market)
            .iter()
            .filter(|(zone, _)| *zone == "FR")
            .map(|(zone, s)| (zone.to_string(), s.clone()))
            .collect();
        let aligner = ExchangeAligner::new(
            Arc::new(FlowTableLoadFlow::new()),
            adjuster.clone(),
            scalable,
            ExchangeAlignerParameters::default(),
        );
        let err = aligner.align_exchanges(&reference, &mut market).unwrap_err();
        assert!(err.to_string().contains("[BE, DE]"));
        assert_eq!(adjuster.calls(), 0);
    }

    #[test]
    fn countries_unknown_to_the_reference_keep_their_net_position() {
        let reference = with_flows(
            network_of(&[Country::FR, Country::BE]),
            &[(FR_BE, 100.0)],
        );

        let mut market = with_flows(
            three_country_network(),
            &[(FR_BE, 60.0), (BE_DE, 10.0), (DE_FR, 0.0)],
        );
        let adjuster = Arc::new(FlowScriptBalanceAdjuster::converging());
        let (aligner, _) = aligner(adjuster.clone());
        let result = aligner.align_exchanges(&reference, &mut market).unwrap();

        let targets = result.target_net_positions.unwrap();
        assert!((targets[&Country::FR] - 100.0).abs() < 1e-9);
        // -50 + (-100) - (-60)
        assert!((targets[&Country::BE] + 90.0).abs() < 1e-9);
        assert!((targets[&Country::DE] + 10.0).abs() < 1e-9);
        let de_area = adjuster
            .last_areas()
            .into_iter()
            .find(|a| a.country == Country::DE)
            .unwrap();
        assert!((de_area.target_net_position_mw + 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_converged_load_flow_is_fatal() {
        let reference = reference();
        let mut market = three_country_network();
        let aligner = ExchangeAligner::new(
            Arc::new(
                FlowTableLoadFlow::new().with_status(trm_core::LoadFlowStatus::Failed),
            ),
            Arc::new(FlowScriptBalanceAdjuster::converging()),
            country_scalables(&market),
            ExchangeAlignerParameters::default(),
        );
        let err = aligner.align_exchanges(&reference, &mut market).unwrap_err();
        assert!(matches!(err, TrmError::Engine(_)));
    }

    #[test]
    fn result_constructor_rejects_non_balanced_status() {
        let state = ExchangeAndNetPosition::default();
        let balance = BalanceComputationResult {
            status: BalanceComputationStatus::Success,
            iteration_count: 1,
            balances: BTreeMap::new(),
        };
        assert!(ExchangeAlignerResult::balanced(
            state.clone(),
            state.clone(),
            BTreeMap::new(),
            balance,
            state,
            ExchangeAlignerStatus::AlreadyAligned,
        )
        .is_err());
    }

    #[test]
    fn result_serializes_with_country_keys() {
        let state = ExchangeAndNetPosition::compute(&reference(), &reference().countries());
        let result = ExchangeAlignerResult::already_aligned(state.clone(), state);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "ALREADY_ALIGNED");
        assert_eq!(json["reference"]["exchanges"]["FR"]["BE"], 100.0);
    }

    #[test]
    fn not_aligned_reads_as_failed() {
        let status: ExchangeAlignerStatus = serde_json::from_str("\"NOT_ALIGNED\"").unwrap();
        assert_eq!(status, ExchangeAlignerStatus::Failed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"FAILED\"");
    }
}
