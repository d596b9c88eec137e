//! Outcome of a TRM computation.

use crate::aligner::{
    AlignmentRecord, AlignmentReport, BranchConnectionStatus, DanglingLineStatus,
    ExchangeAlignerResult,
};
use crate::mapping::IdentifiableMapping;
use crate::uncertainty::UncertaintyResult;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use trm_core::{TrmError, TrmResult};

/// Uncertainties per reference branch id, together with what every aligner
/// did and the identifier mapping used.
///
/// Non-finite flows, PTDFs and uncertainties are written to JSON as `"NaN"`,
/// `"Infinity"` and `"-Infinity"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrmResults {
    uncertainties: BTreeMap<String, UncertaintyResult>,
    alignment: Vec<AlignmentRecord>,
    identifiable_mapping: IdentifiableMapping,
}

impl TrmResults {
    /// Fails when two results share a branch id.
    pub fn new(
        uncertainties: impl IntoIterator<Item = UncertaintyResult>,
        alignment: Vec<AlignmentRecord>,
        identifiable_mapping: IdentifiableMapping,
    ) -> TrmResult<Self> {
        let mut by_branch = BTreeMap::new();
        for result in uncertainties {
            let branch_id = result.branch_id.clone();
            if by_branch.insert(branch_id.clone(), result).is_some() {
                return Err(TrmError::Inconsistency(format!(
                    "more than one uncertainty result for branch '{}'",
                    branch_id
                )));
            }
        }
        Ok(Self {
            uncertainties: by_branch,
            alignment,
            identifiable_mapping,
        })
    }

    pub fn uncertainties(&self) -> &BTreeMap<String, UncertaintyResult> {
        &self.uncertainties
    }

    pub fn uncertainty(&self, branch_id: &str) -> Option<&UncertaintyResult> {
        self.uncertainties.get(branch_id)
    }

    pub fn alignment(&self) -> &[AlignmentRecord] {
        &self.alignment
    }

    pub fn identifiable_mapping(&self) -> &IdentifiableMapping {
        &self.identifiable_mapping
    }

    fn reports(&self) -> impl Iterator<Item = &AlignmentReport> {
        self.alignment.iter().map(|record| &record.report)
    }

    pub fn crac_results(&self) -> Option<&BTreeMap<String, bool>> {
        self.reports().find_map(|r| match r {
            AlignmentReport::Crac(map) => Some(map),
            _ => None,
        })
    }

    pub fn branch_connection_states(&self) -> Option<&BTreeMap<String, BranchConnectionStatus>> {
        self.reports().find_map(|r| match r {
            AlignmentReport::BranchConnectionState(map) => Some(map),
            _ => None,
        })
    }

    pub fn pst_results(&self) -> Option<&BTreeMap<String, bool>> {
        self.reports().find_map(|r| match r {
            AlignmentReport::Pst(map) => Some(map),
            _ => None,
        })
    }

    pub fn hvdc_results(&self) -> Option<&BTreeMap<String, bool>> {
        self.reports().find_map(|r| match r {
            AlignmentReport::Hvdc(map) => Some(map),
            _ => None,
        })
    }

    pub fn dangling_line_results(&self) -> Option<&BTreeMap<String, DanglingLineStatus>> {
        self.reports().find_map(|r| match r {
            AlignmentReport::DanglingLine(map) => Some(map),
            _ => None,
        })
    }

    pub fn exchange_result(&self) -> Option<&ExchangeAlignerResult> {
        self.reports().find_map(|r| match r {
            AlignmentReport::Exchange(result) => Some(result),
            _ => None,
        })
    }

    /// Export to JSON format
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing TrmResults to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing JSON to {}", path.display()))?;
        Ok(())
    }

    /// Convert to JSON value (for streaming/stdout)
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("converting TrmResults to JSON value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trm_core::Country;

    fn sample() -> TrmResults {
        let alignment = vec![
            AlignmentRecord {
                aligner: "pst".to_string(),
                report: AlignmentReport::Pst([("PST".to_string(), true)].into_iter().collect()),
            },
            AlignmentRecord {
                aligner: "hvdc".to_string(),
                report: AlignmentReport::Hvdc(BTreeMap::new()),
            },
        ];
        TrmResults::new(
            vec![UncertaintyResult::new(
                "toto",
                "toto",
                Some(Country::FR),
                Some(Country::BE),
                100.0,
                112.0,
                -1.0,
            )],
            alignment,
            IdentifiableMapping::from_pairings([("toto", "toto")]),
        )
        .unwrap()
    }

    #[test]
    fn accessors_find_each_family() {
        let results = sample();
        assert_eq!(results.uncertainty("toto").unwrap().uncertainty, 12.0);
        assert!(results.pst_results().unwrap()["PST"]);
        assert!(results.hvdc_results().unwrap().is_empty());
        assert!(results.crac_results().is_none());
        assert!(results.exchange_result().is_none());
        assert_eq!(
            results.identifiable_mapping().id_in_reference("toto").unwrap(),
            "toto"
        );
    }

    #[test]
    fn duplicate_branch_is_rejected() {
        let result = UncertaintyResult::new("x", "x", None, None, 1.0, 0.0, 1.0);
        let err = TrmResults::new(
            vec![result.clone(), result],
            Vec::new(),
            IdentifiableMapping::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn json_export() {
        let results = sample();
        let value = results.to_json_value().unwrap();
        assert_eq!(value["uncertainties"]["toto"]["uncertainty"], 12.0);
        assert_eq!(value["alignment"][0]["report"]["kind"], "pst");

        let file = tempfile::NamedTempFile::new().unwrap();
        results.to_json(file.path()).unwrap();
        let read: TrmResults =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(read, results);
    }

    #[test]
    fn json_keeps_infinite_uncertainty() {
        let results = TrmResults::new(
            vec![UncertaintyResult::new("zero", "zero", None, None, 100.0, 112.0, 0.0)],
            Vec::new(),
            IdentifiableMapping::default(),
        )
        .unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        results.to_json(file.path()).unwrap();
        let read: TrmResults =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(read.uncertainty("zero").unwrap().uncertainty, f64::NEG_INFINITY);
        assert_eq!(read, results);
    }
}
