//! Exchange alignment scenarios on a three-country grid

use std::sync::Arc;
use trm_algo::test_utils::*;
use trm_algo::{
    AlignmentReport, ExchangeAligner, ExchangeAlignerParameters, ExchangeAlignerStatus,
    OperationalConditionAligner,
};
use trm_core::{Country, DanglingLine, HvdcLine, Network};

fn aligner(
    adjuster: FlowScriptBalanceAdjuster,
) -> (ExchangeAligner, Arc<FlowScriptBalanceAdjuster>) {
    let adjuster = Arc::new(adjuster);
    let aligner = ExchangeAligner::new(
        Arc::new(FlowTableLoadFlow::new()),
        adjuster.clone(),
        country_scalables(&three_country_network()),
        ExchangeAlignerParameters::default(),
    );
    (aligner, adjuster)
}

#[test]
fn net_positions_reached_through_a_different_loop_flow() {
    // FR exports 120 to BE and DE, BE forwards 30 to DE
    let reference = with_flows(
        three_country_network(),
        &[(FR_BE, 100.0), (BE_DE, 30.0), (DE_FR, -20.0)],
    );
    let mut market = with_flows(
        three_country_network(),
        &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
    );
    let (aligner, adjuster) = aligner(
        FlowScriptBalanceAdjuster::converging()
            .with_flow(FR_BE, 70.0)
            .with_flow(BE_DE, 0.0)
            .with_flow(DE_FR, -50.0),
    );

    let report = aligner.align(&reference, &mut market).unwrap();
    let result = match report {
        AlignmentReport::Exchange(result) => result,
        other => panic!("exchange aligner returned {:?}", other),
    };
    assert_eq!(
        result.status,
        ExchangeAlignerStatus::TargetNetPositionReachedButExchangeNotAligned
    );
    assert_eq!(adjuster.calls(), 1);
    let new_state = result.new_market_based.unwrap();
    for country in [Country::FR, Country::BE, Country::DE] {
        assert!(
            (new_state.net_position(country) - result.reference.net_position(country)).abs()
                < 1e-9
        );
    }
    assert!((market.net_position(Country::FR) - 120.0).abs() < 1e-9);
}

#[test]
fn second_run_is_already_aligned() {
    let reference = with_flows(
        three_country_network(),
        &[(FR_BE, 100.0), (BE_DE, 30.0), (DE_FR, -20.0)],
    );
    let mut market = with_flows(
        three_country_network(),
        &[(FR_BE, 50.0), (BE_DE, 0.0), (DE_FR, 0.0)],
    );
    let (aligner, adjuster) = aligner(
        FlowScriptBalanceAdjuster::converging()
            .with_flow(FR_BE, 100.0)
            .with_flow(BE_DE, 30.0)
            .with_flow(DE_FR, -20.0),
    );
    let first = aligner.align_exchanges(&reference, &mut market).unwrap();
    assert_eq!(
        first.status,
        ExchangeAlignerStatus::AlignedWithBalanceAdjustment
    );
    let second = aligner.align_exchanges(&reference, &mut market).unwrap();
    assert_eq!(second.status, ExchangeAlignerStatus::AlreadyAligned);
    assert_eq!(adjuster.calls(), 1);
}

fn with_boundary_and_hvdc(mut network: Network, p0_fr: f64, hvdc_mw: f64) -> Network {
    network
        .add_dangling_line(
            DanglingLine::new(DL_FR, "FFR1AA1 ")
                .with_pairing_key("XFRBE11")
                .with_boundary_injection(p0_fr, 0.0),
        )
        .unwrap();
    network
        .add_hvdc_line(HvdcLine::new(HVDC_FR_DE, "FFR2AA1 ", "DDE1AA1 ", hvdc_mw))
        .unwrap();
    network
}

#[test]
fn boundary_injections_and_hvdc_count_in_net_positions() {
    // FR: 100 to BE, 40 through the HVDC, 25 into the boundary
    let reference = with_boundary_and_hvdc(
        with_flows(three_country_network(), &[(FR_BE, 100.0), (BE_DE, 0.0), (DE_FR, 0.0)]),
        25.0,
        40.0,
    );
    let mut market = with_boundary_and_hvdc(
        with_flows(three_country_network(), &[(FR_BE, 100.0), (BE_DE, 0.0), (DE_FR, 0.0)]),
        25.0,
        40.0,
    );
    let (aligner, adjuster) = aligner(FlowScriptBalanceAdjuster::converging());

    let result = aligner.align_exchanges(&reference, &mut market).unwrap();
    assert_eq!(result.status, ExchangeAlignerStatus::AlreadyAligned);
    assert!((result.reference.net_position(Country::FR) - 165.0).abs() < 1e-9);
    assert!((result.reference.exchange(Country::FR, Country::DE) - 40.0).abs() < 1e-9);
    assert!((result.reference.net_position(Country::DE) + 40.0).abs() < 1e-9);
    assert_eq!(adjuster.calls(), 0);
}

#[test]
fn hvdc_set_point_difference_triggers_rebalancing() {
    let reference = with_boundary_and_hvdc(three_country_network(), 0.0, 300.0);
    let mut market = with_boundary_and_hvdc(three_country_network(), 0.0, 100.0);
    let (aligner, adjuster) = aligner(FlowScriptBalanceAdjuster::converging());

    let result = aligner.align_exchanges(&reference, &mut market).unwrap();
    assert_eq!(adjuster.calls(), 1);
    let targets = result.target_net_positions.unwrap();
    assert!((targets[&Country::FR] - 300.0).abs() < 1e-9);
    assert!((targets[&Country::DE] + 300.0).abs() < 1e-9);
    assert!(targets[&Country::BE].abs() < 1e-9);
    // the adjuster does not touch the HVDC, so the FR-DE exchange stays apart
    assert_eq!(
        result.status,
        ExchangeAlignerStatus::TargetNetPositionReachedButExchangeNotAligned
    );
}
