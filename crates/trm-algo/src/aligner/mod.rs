//! Operational-condition aligners.
//!
//! An aligner copies one category of operating condition from the reference
//! network onto the market-based network, in place. The reference network is
//! only read. Elements that exist on one side only are reported, not failed,
//! unless the category requires a strict correspondence (HVDC lines, phase
//! shifters without tap changer, paired boundary lines).
//!
//! | Aligner | Copies | Report |
//! |---------|--------|--------|
//! | [`CracAligner`] | Network actions the reference already embodies | `bool` per action |
//! | [`BranchConnectionStateAligner`] | Terminal connection states | [`BranchConnectionStatus`] |
//! | [`PstAligner`] | Phase tap positions | `bool` per PST |
//! | [`HvdcAligner`] | HVDC set points and angle droop | `bool` per HVDC line |
//! | [`DanglingLineAligner`] | Boundary injections, tie-line splitting | [`DanglingLineStatus`] |
//! | [`ExchangeAligner`] | Zonal net positions | [`ExchangeAlignerResult`] |

pub mod branch_connection_state;
pub mod crac;
pub mod dangling_line;
pub mod exchange;
pub mod hvdc;
pub mod pipeline;
pub mod pst;

pub use branch_connection_state::{BranchConnectionStateAligner, BranchConnectionStatus};
pub use crac::CracAligner;
pub use dangling_line::{DanglingLineAligner, DanglingLineStatus};
pub use exchange::{
    ExchangeAligner, ExchangeAlignerParameters, ExchangeAlignerResult, ExchangeAlignerStatus,
    ExchangeAndNetPosition,
};
pub use hvdc::HvdcAligner;
pub use pipeline::AlignerPipeline;
pub use pst::PstAligner;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trm_core::{Network, TrmResult};

/// Brings one category of operating condition of the market-based network in
/// line with the reference network.
pub trait OperationalConditionAligner: Send + Sync {
    /// Aligner name, used in logs and in the alignment records
    fn name(&self) -> &str;

    /// Mutates `market` only. Running it twice in a row leaves `market`
    /// unchanged the second time.
    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport>;
}

/// What an aligner did, per element (or per network action).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum AlignmentReport {
    Crac(BTreeMap<String, bool>),
    BranchConnectionState(BTreeMap<String, BranchConnectionStatus>),
    Pst(BTreeMap<String, bool>),
    Hvdc(BTreeMap<String, bool>),
    DanglingLine(BTreeMap<String, DanglingLineStatus>),
    Exchange(ExchangeAlignerResult),
}

/// Report of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub aligner: String,
    pub report: AlignmentReport,
}
