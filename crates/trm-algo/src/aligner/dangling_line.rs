use super::{AlignmentReport, OperationalConditionAligner};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use trm_core::{Network, TrmError, TrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DanglingLineStatus {
    /// Boundary injection copied
    Aligned,
    /// Market tie line split, injection copied onto the remaining half
    DanglingLineMergedInMarketBasedNetwork,
    NotFoundInMarketBasedNetwork,
    /// Nothing to copy, both networks model the interconnection explicitly
    PairedDanglingLineInBothNetworks,
}

/// Copies the boundary injection (`p0`, `q0`) of every reference dangling line.
///
/// | reference | market-based | outcome |
/// |-----------|--------------|---------|
/// | unpaired | unpaired | injection copied |
/// | unpaired | paired | tie line split, injection copied |
/// | paired | paired | nothing |
/// | paired | unpaired | error, merging cannot be inferred |
///
/// The other half of a split tie line is dropped from the market-based network
/// unless the reference network models it too.
#[derive(Debug, Clone, Default)]
pub struct DanglingLineAligner;

impl DanglingLineAligner {
    pub fn new() -> Self {
        Self
    }
}

fn copy_injection(market: &mut Network, id: &str, p0_mw: f64, q0_mvar: f64) -> TrmResult<()> {
    let dangling_line = market
        .dangling_line_mut(id)
        .ok_or_else(|| TrmError::Network(format!("dangling line '{}' not found", id)))?;
    dangling_line.p0_mw = p0_mw;
    dangling_line.q0_mvar = q0_mvar;
    Ok(())
}

impl OperationalConditionAligner for DanglingLineAligner {
    fn name(&self) -> &str {
        "dangling-line"
    }

    fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<AlignmentReport> {
        let mut dangling_lines = reference.dangling_lines();
        dangling_lines.sort_by(|a, b| a.id.cmp(&b.id));

        let mut result = BTreeMap::new();
        let mut split_halves = BTreeSet::new();
        for dl in dangling_lines {
            let id = dl.id.as_str();
            if market.dangling_line(id).is_none() {
                warn!(dangling_line = id, "dangling line not found in market-based network");
                result.insert(id.to_string(), DanglingLineStatus::NotFoundInMarketBasedNetwork);
                continue;
            }
            let paired_in_reference = reference.is_paired(id);
            let market_tie_line = market.tie_line_of(id).cloned();

            let status = match (paired_in_reference, market_tie_line) {
                (false, None) => {
                    copy_injection(market, id, dl.p0_mw, dl.q0_mvar)?;
                    if split_halves.contains(id) {
                        DanglingLineStatus::DanglingLineMergedInMarketBasedNetwork
                    } else {
                        DanglingLineStatus::Aligned
                    }
                }
                (false, Some(tie_line)) => {
                    market.remove_tie_line(&tie_line.id)?;
                    if let Some(other) = tie_line.other_half(id) {
                        if reference.dangling_line(other).is_some() {
                            split_halves.insert(other.to_string());
                        } else {
                            market.remove_dangling_line(other)?;
                        }
                    }
                    copy_injection(market, id, dl.p0_mw, dl.q0_mvar)?;
                    debug!(
                        dangling_line = id,
                        tie_line = tie_line.id.as_str(),
                        "market tie line split"
                    );
                    DanglingLineStatus::DanglingLineMergedInMarketBasedNetwork
                }
                (true, Some(_)) => DanglingLineStatus::PairedDanglingLineInBothNetworks,
                (true, None) => {
                    return Err(TrmError::Inconsistency(format!(
                        "dangling line '{}' is paired in the reference network but not in the market-based network",
                        id
                    )))
                }
            };
            result.insert(id.to_string(), status);
        }
        Ok(AlignmentReport::DanglingLine(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use trm_core::DanglingLine;

    /// FR and BE each carry a half of the FR-BE X-node interconnection.
    fn with_boundary(paired: bool, p0_fr: f64) -> Network {
        let mut network = three_country_network();
        network
            .add_dangling_line(
                DanglingLine::new(DL_FR, "FFR1AA1 ")
                    .with_pairing_key("XFRBE11")
                    .with_boundary_injection(p0_fr, 10.0),
            )
            .unwrap();
        network
            .add_dangling_line(
                DanglingLine::new(DL_BE, "BBE1AA1 ")
                    .with_pairing_key("XFRBE11")
                    .with_boundary_injection(-p0_fr, -10.0),
            )
            .unwrap();
        if paired {
            network.add_tie_line(TIE_LINE, DL_FR, DL_BE).unwrap();
        }
        network
    }

    fn statuses(report: AlignmentReport) -> BTreeMap<String, DanglingLineStatus> {
        match report {
            AlignmentReport::DanglingLine(map) => map,
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn unpaired_in_both_copies_injection() {
        let reference = with_boundary(false, 120.0);
        let mut market = with_boundary(false, 0.0);
        let result = statuses(DanglingLineAligner::new().align(&reference, &mut market).unwrap());
        assert_eq!(result[DL_FR], DanglingLineStatus::Aligned);
        assert_eq!(result[DL_BE], DanglingLineStatus::Aligned);
        let dl = market.dangling_line(DL_FR).unwrap();
        assert_eq!(dl.p0_mw, 120.0);
        assert_eq!(dl.q0_mvar, 10.0);
        assert_eq!(market.dangling_line(DL_BE).unwrap().p0_mw, -120.0);
    }

    #[test]
    fn merged_in_market_only_splits_the_tie_line() {
        let mut reference = with_boundary(false, 75.0);
        reference.remove_dangling_line(DL_BE).unwrap();
        let mut market = with_boundary(true, 0.0);

        let result = statuses(DanglingLineAligner::new().align(&reference, &mut market).unwrap());
        assert_eq!(
            result[DL_FR],
            DanglingLineStatus::DanglingLineMergedInMarketBasedNetwork
        );
        assert!(market.tie_line(TIE_LINE).is_none());
        assert!(market.dangling_line(DL_BE).is_none());
        assert!(!market.is_paired(DL_FR));
        assert_eq!(market.dangling_line(DL_FR).unwrap().p0_mw, 75.0);
    }

    #[test]
    fn split_keeps_the_other_half_modelled_by_the_reference() {
        let reference = with_boundary(false, 75.0);
        let mut market = with_boundary(true, 0.0);

        let result = statuses(DanglingLineAligner::new().align(&reference, &mut market).unwrap());
        assert_eq!(
            result[DL_FR],
            DanglingLineStatus::DanglingLineMergedInMarketBasedNetwork
        );
        assert_eq!(
            result[DL_BE],
            DanglingLineStatus::DanglingLineMergedInMarketBasedNetwork
        );
        assert!(market.tie_line(TIE_LINE).is_none());
        assert_eq!(market.dangling_line(DL_FR).unwrap().p0_mw, 75.0);
        assert_eq!(market.dangling_line(DL_BE).unwrap().p0_mw, -75.0);
    }

    #[test]
    fn paired_in_both_is_left_untouched() {
        let reference = with_boundary(true, 75.0);
        let mut market = with_boundary(true, 0.0);
        let result = statuses(DanglingLineAligner::new().align(&reference, &mut market).unwrap());
        assert_eq!(
            result[DL_FR],
            DanglingLineStatus::PairedDanglingLineInBothNetworks
        );
        assert_eq!(market.dangling_line(DL_FR).unwrap().p0_mw, 0.0);
        assert!(market.tie_line(TIE_LINE).is_some());
    }

    #[test]
    fn paired_in_reference_only_is_fatal() {
        let reference = with_boundary(true, 75.0);
        let mut market = with_boundary(false, 0.0);
        let err = DanglingLineAligner::new()
            .align(&reference, &mut market)
            .unwrap_err();
        assert!(matches!(err, TrmError::Inconsistency(_)));
    }

    #[test]
    fn missing_in_market_is_reported() {
        let reference = with_boundary(false, 75.0);
        let mut market = three_country_network();
        let result = statuses(DanglingLineAligner::new().align(&reference, &mut market).unwrap());
        assert_eq!(
            result[DL_FR],
            DanglingLineStatus::NotFoundInMarketBasedNetwork
        );
        assert_eq!(
            result[DL_BE],
            DanglingLineStatus::NotFoundInMarketBasedNetwork
        );
    }

    #[test]
    fn aligning_twice_is_a_no_op() {
        let mut reference = with_boundary(false, 75.0);
        reference.remove_dangling_line(DL_BE).unwrap();
        let mut market = with_boundary(true, 0.0);
        DanglingLineAligner::new()
            .align(&reference, &mut market)
            .unwrap();
        let snapshot = market.clone();
        let second = statuses(DanglingLineAligner::new().align(&reference, &mut market).unwrap());
        assert_eq!(second[DL_FR], DanglingLineStatus::Aligned);
        assert_same_network(&snapshot, &market);
    }
}
