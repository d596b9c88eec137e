use super::{
    AlignmentRecord, BranchConnectionStateAligner, CracAligner, DanglingLineAligner,
    ExchangeAligner, ExchangeAlignerParameters, HvdcAligner, OperationalConditionAligner,
    PstAligner,
};
use crate::crac::Crac;
use std::sync::Arc;
use tracing::info;
use trm_core::{BalanceAdjuster, LoadFlowEngine, Network, TrmResult, ZonalScalable};

/// Ordered sequence of aligners applied to the market-based network.
///
/// Stages run in insertion order; the first failure aborts the sequence and
/// leaves the market-based network in the state reached so far.
#[derive(Default)]
pub struct AlignerPipeline {
    aligners: Vec<Box<dyn OperationalConditionAligner>>,
}

impl AlignerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production sequence: topology first (CRAC, then connection states),
    /// then set points (PST, HVDC, boundary injections), zonal balance last.
    pub fn standard(
        crac: Crac,
        load_flow: Arc<dyn LoadFlowEngine>,
        balance_adjuster: Arc<dyn BalanceAdjuster>,
        market_scalable: ZonalScalable,
        exchange_parameters: ExchangeAlignerParameters,
    ) -> Self {
        Self::new()
            .with(CracAligner::new(crac))
            .with(BranchConnectionStateAligner::new())
            .with(PstAligner::new())
            .with(HvdcAligner::new())
            .with(DanglingLineAligner::new())
            .with(ExchangeAligner::new(
                load_flow,
                balance_adjuster,
                market_scalable,
                exchange_parameters,
            ))
    }

    pub fn with(mut self, aligner: impl OperationalConditionAligner + 'static) -> Self {
        self.push(Box::new(aligner));
        self
    }

    pub fn push(&mut self, aligner: Box<dyn OperationalConditionAligner>) {
        self.aligners.push(aligner);
    }

    pub fn len(&self) -> usize {
        self.aligners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aligners.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.aligners.iter().map(|a| a.name()).collect()
    }

    /// Run every stage, returning one record per stage in order.
    pub fn align(&self, reference: &Network, market: &mut Network) -> TrmResult<Vec<AlignmentRecord>> {
        let mut records = Vec::with_capacity(self.aligners.len());
        for (stage, aligner) in self.aligners.iter().enumerate() {
            info!(
                stage = stage + 1,
                stages = self.aligners.len(),
                aligner = aligner.name(),
                "aligning market-based network"
            );
            let report = aligner.align(reference, market)?;
            records.push(AlignmentRecord {
                aligner: aligner.name().to_string(),
                report,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignmentReport;
    use crate::test_utils::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use trm_core::TrmError;

    /// Appends its name to a shared journal.
    struct Journaling {
        name: &'static str,
        journal: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl OperationalConditionAligner for Journaling {
        fn name(&self) -> &str {
            self.name
        }

        fn align(&self, _: &Network, _: &mut Network) -> TrmResult<AlignmentReport> {
            self.journal.lock().unwrap().push(self.name);
            if self.fail {
                return Err(TrmError::Other(format!("{} failed", self.name)));
            }
            Ok(AlignmentReport::Pst(BTreeMap::new()))
        }
    }

    fn journaling(
        name: &'static str,
        journal: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Journaling {
        Journaling {
            name,
            journal: journal.clone(),
            fail,
        }
    }

    #[test]
    fn runs_stages_in_insertion_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = AlignerPipeline::new()
            .with(journaling("first", &journal, false))
            .with(journaling("second", &journal, false))
            .with(journaling("third", &journal, false));

        let reference = three_country_network();
        let mut market = three_country_network();
        let records = pipeline.align(&reference, &mut market).unwrap();

        assert_eq!(*journal.lock().unwrap(), vec!["first", "second", "third"]);
        let names: Vec<&str> = records.iter().map(|r| r.aligner.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn first_failure_stops_the_sequence() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = AlignerPipeline::new()
            .with(journaling("first", &journal, false))
            .with(journaling("broken", &journal, true))
            .with(journaling("never", &journal, false));

        let reference = three_country_network();
        let mut market = three_country_network();
        let err = pipeline.align(&reference, &mut market).unwrap_err();

        assert!(err.to_string().contains("broken failed"));
        assert_eq!(*journal.lock().unwrap(), vec!["first", "broken"]);
    }

    #[test]
    fn empty_pipeline_is_a_no_op() {
        let pipeline = AlignerPipeline::new();
        assert!(pipeline.is_empty());
        let reference = three_country_network();
        let mut market = three_country_network();
        assert!(pipeline.align(&reference, &mut market).unwrap().is_empty());
    }

    #[test]
    fn standard_sequence() {
        let pipeline = AlignerPipeline::standard(
            Crac::new("crac"),
            Arc::new(FlowTableLoadFlow::new()),
            Arc::new(FlowScriptBalanceAdjuster::converging()),
            country_scalables(&three_country_network()),
            ExchangeAlignerParameters::default(),
        );
        assert_eq!(pipeline.len(), 6);
        assert_eq!(
            pipeline.names(),
            vec![
                "crac",
                "branch-connection-state",
                "pst",
                "hvdc",
                "dangling-line",
                "exchange"
            ]
        );
    }
}
