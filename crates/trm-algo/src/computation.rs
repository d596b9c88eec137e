//! TRM uncertainty computation.
//!
//! 1. The critical elements are resolved on the reference network.
//! 2. Each of them is mapped onto the market-based network; every missing
//!    counterpart is reported at once, before anything is mutated.
//! 3. The aligner pipeline brings the market-based network onto the reference
//!    operating conditions.
//! 4. Market-based flows come from a load flow, reference flows and zonal PTDFs
//!    from a sensitivity analysis.
//! 5. One [`UncertaintyResult`] per critical element.

use crate::aligner::{AlignerPipeline, ExchangeAlignerParameters};
use crate::crac::Crac;
use crate::critical_elements::CriticalElementProvider;
use crate::flow::{branch_flow, extract_branch_flows};
use crate::mapping::IdentifiableMapping;
use crate::params::TrmParameters;
use crate::results::TrmResults;
use crate::uncertainty::UncertaintyResult;
use crate::zonal_ptdf::ZonalPtdfExtractor;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trm_core::{
    BalanceAdjuster, LoadFlowEngine, Network, SensitivityEngine, TrmError, TrmResult, ZonalGlsk,
    ZonalScalable,
};

/// Every reference element must have a mapped counterpart in `market`; the
/// missing ones are reported together.
fn check_market_elements(
    mapping: &IdentifiableMapping,
    market: &Network,
    reference_ids: &[String],
) -> TrmResult<()> {
    let missing: Vec<&str> = reference_ids
        .iter()
        .filter(|id| {
            mapping
                .try_id_in_market_based(id)
                .map_or(true, |market_id| branch_flow(market, market_id).is_none())
        })
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TrmError::Configuration(format!(
            "Market-based network doesn't contain the following elements: [{}]",
            missing.join(", ")
        )))
    }
}

pub struct TrmAlgorithm {
    load_flow: Arc<dyn LoadFlowEngine>,
    sensitivity: Arc<dyn SensitivityEngine>,
    balance_adjuster: Arc<dyn BalanceAdjuster>,
    parameters: TrmParameters,
}

impl TrmAlgorithm {
    pub fn new(
        load_flow: Arc<dyn LoadFlowEngine>,
        sensitivity: Arc<dyn SensitivityEngine>,
        balance_adjuster: Arc<dyn BalanceAdjuster>,
        parameters: TrmParameters,
    ) -> Self {
        Self {
            load_flow,
            sensitivity,
            balance_adjuster,
            parameters,
        }
    }

    pub fn parameters(&self) -> &TrmParameters {
        &self.parameters
    }

    /// Compute with the standard aligner sequence built from `crac` and
    /// `market_scalable`.
    pub fn compute_uncertainties(
        &self,
        reference: &Network,
        market: &mut Network,
        provider: &dyn CriticalElementProvider,
        reference_glsk: &ZonalGlsk,
        crac: &Crac,
        market_scalable: &ZonalScalable,
    ) -> TrmResult<TrmResults> {
        let pipeline = AlignerPipeline::standard(
            crac.clone(),
            self.load_flow.clone(),
            self.balance_adjuster.clone(),
            market_scalable.clone(),
            ExchangeAlignerParameters::from(&self.parameters),
        );
        self.compute_uncertainties_with_pipeline(
            reference,
            market,
            provider,
            reference_glsk,
            &pipeline,
        )
    }

    pub fn compute_uncertainties_with_pipeline(
        &self,
        reference: &Network,
        market: &mut Network,
        provider: &dyn CriticalElementProvider,
        reference_glsk: &ZonalGlsk,
        pipeline: &AlignerPipeline,
    ) -> TrmResult<TrmResults> {
        self.parameters.validate()?;

        let reference_ids: Vec<String> =
            provider.network_elements(reference).into_iter().collect();
        if reference_ids.is_empty() {
            return Err(TrmError::Configuration(
                "Reference critical elements list is empty".to_string(),
            ));
        }

        let mapping = IdentifiableMapping::with_strategy(
            self.parameters.mapping_strategy,
            reference,
            market,
            self.parameters.country_filter.as_ref(),
        );
        check_market_elements(&mapping, market, &reference_ids)?;
        let market_ids: Vec<String> = reference_ids
            .iter()
            .map(|id| mapping.id_in_market_based(id).map(str::to_string))
            .collect::<TrmResult<_>>()?;
        info!(
            critical_elements = reference_ids.len(),
            stages = pipeline.len(),
            "critical elements mapped, aligning market-based network"
        );

        let alignment = pipeline.align(reference, market)?;
        // a split tie line no longer exists in the market-based network
        check_market_elements(&mapping, market, &reference_ids).map_err(|err| {
            warn!("critical elements removed during alignment");
            err
        })?;

        let market_flows = extract_branch_flows(
            self.load_flow.as_ref(),
            market,
            &self.parameters.load_flow,
            &market_ids,
        )?;
        let reference_ptdfs = ZonalPtdfExtractor::new(
            self.sensitivity.clone(),
            self.parameters.sensitivity.clone(),
        )
        .extract(reference, &reference_ids, reference_glsk)?;

        let mut uncertainties = Vec::with_capacity(reference_ids.len());
        for (reference_id, market_id) in reference_ids.iter().zip(&market_ids) {
            let market_based_flow = market_flows.get(market_id).copied().ok_or_else(|| {
                TrmError::Inconsistency(format!("no market-based flow for '{}'", market_id))
            })?;
            let ptdf_and_flow = reference_ptdfs.get(reference_id).copied().ok_or_else(|| {
                TrmError::Inconsistency(format!("no zonal PTDF for '{}'", reference_id))
            })?;
            let result = UncertaintyResult::for_branch(
                reference,
                reference_id,
                market_based_flow,
                ptdf_and_flow.flow,
                ptdf_and_flow.zonal_ptdf,
            );
            debug!(
                branch = result.branch_id.as_str(),
                market_based_flow_mw = result.market_based_flow,
                reference_flow_mw = result.reference_flow,
                zonal_ptdf = result.reference_zonal_ptdf,
                uncertainty_mw = result.uncertainty,
                "uncertainty computed"
            );
            uncertainties.push(result);
        }

        TrmResults::new(uncertainties, alignment, mapping)
    }
}
