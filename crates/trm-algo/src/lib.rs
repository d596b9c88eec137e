//! # trm-algo: TRM Uncertainty Computation
//!
//! This crate computes the Total Reserve Margin (TRM) uncertainty of monitored
//! cross-border branches: how far the flow predicted on a *market-based* network
//! can deviate from the flow realized on a *reference* network, expressed in MW
//! per MW of zonal exchange:
//!
//! ```text
//! uncertainty = (market_based_flow - reference_flow) / reference_zonal_ptdf
//! ```
//!
//! ## Architecture
//!
//! | Stage | Module | Description |
//! |-------|--------|-------------|
//! | Identifier matching | [`mapping`] | UCTE key matching with duplicate invalidation |
//! | Operating conditions | [`aligner`] | PST taps, HVDC set points, boundary injections, topology, CRAC |
//! | Zonal balance | [`aligner::exchange`] | Net position / exchange reconciliation |
//! | Composition | [`aligner::pipeline`] | Ordered, fail-fast aligner sequence |
//! | Orchestration | [`computation`] | Validation, alignment, flow and PTDF extraction |
//!
//! Load flow, sensitivity analysis and balance adjustment are external engines,
//! consumed through the traits of [`trm_core::engine`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trm_algo::{TrmAlgorithm, TrmParameters, InterconnectionsProvider, Crac};
//!
//! let algorithm = TrmAlgorithm::new(load_flow, sensitivity, balance, TrmParameters::default());
//! let results = algorithm.compute_uncertainties(
//!     &reference,
//!     &mut market_based,
//!     &InterconnectionsProvider::all(),
//!     &reference_glsk,
//!     &Crac::new("crac"),
//!     &market_scalable,
//! )?;
//! for (branch, result) in results.uncertainties() {
//!     println!("{}: {:.1} MW", branch, result.uncertainty);
//! }
//! ```

pub mod aligner;
pub mod computation;
pub mod crac;
pub mod critical_elements;
#[cfg(feature = "csv")]
pub mod export;
pub mod flow;
pub mod mapping;
pub mod params;
pub mod results;
pub mod test_utils;
pub mod uncertainty;
pub mod zonal_ptdf;

pub use aligner::{
    AlignerPipeline, AlignmentRecord, AlignmentReport, BranchConnectionStateAligner,
    BranchConnectionStatus, CracAligner, DanglingLineAligner, DanglingLineStatus,
    ExchangeAligner, ExchangeAlignerParameters, ExchangeAlignerResult, ExchangeAlignerStatus,
    ExchangeAndNetPosition, HvdcAligner, OperationalConditionAligner, PstAligner,
};
pub use computation::TrmAlgorithm;
pub use crac::{load_crac_from_path, ActionType, Crac, ElementaryAction, NetworkAction};
pub use critical_elements::{
    CountryBranchesProvider, CriticalElementProvider, ElementIdsProvider,
    InterconnectionsProvider,
};
#[cfg(feature = "csv")]
pub use export::write_csv;
pub use flow::{branch_flow, extract_branch_flows};
pub use mapping::{IdentifiableMapping, MappingAccumulator, MatchOutcome};
pub use params::{load_parameters_from_path, MappingStrategy, TrmParameters};
pub use results::TrmResults;
pub use uncertainty::UncertaintyResult;
pub use zonal_ptdf::{ZonalPtdfAndFlow, ZonalPtdfExtractor};
