//! Semicolon-separated export of uncertainty results (requires csv feature).

use crate::results::TrmResults;
use crate::uncertainty::{non_finite_name, UncertaintyResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;

const HEADER: [&str; 9] = [
    "Case date",
    "Branch ID",
    "Branch name",
    "Country Side 1",
    "Country Side 2",
    "Uncertainty",
    "Market-based flow",
    "Reference flow",
    "Zonal PTDF",
];

/// `2024-07-15T13:14:12Z[UTC]`
fn format_case_date(case_date: &DateTime<Utc>) -> String {
    format!("{}[UTC]", case_date.format("%Y-%m-%dT%H:%M:%SZ"))
}

/// Shortest representation with at least one fractional digit. Magnitudes
/// outside `[1e-3, 1e7)` use `1.0E20` notation.
fn format_number(value: f64) -> String {
    if let Some(name) = non_finite_name(value) {
        return name.to_string();
    }
    let magnitude = value.abs();
    if value == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return format!("{:?}", value);
    }
    let scientific = format!("{:e}", value);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            format!("{}E{}", mantissa, exponent)
        }
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

fn record(case_date: &str, result: &UncertaintyResult) -> [String; 9] {
    let country = |c: Option<trm_core::Country>| c.map(|c| c.to_string()).unwrap_or_default();
    [
        case_date.to_string(),
        result.branch_id.clone(),
        result.branch_name.clone(),
        country(result.country_side_1),
        country(result.country_side_2),
        format_number(result.uncertainty),
        format_number(result.market_based_flow),
        format_number(result.reference_flow),
        format_number(result.reference_zonal_ptdf),
    ]
}

/// Write one row per uncertainty result, in branch id order.
pub fn write_csv<W: Write>(
    results: &TrmResults,
    writer: W,
    case_date: &DateTime<Utc>,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(writer);
    wtr.write_record(HEADER).context("writing CSV header")?;

    let case_date = format_case_date(case_date);
    for result in results.uncertainties().values() {
        wtr.write_record(record(&case_date, result))
            .with_context(|| format!("writing CSV record for {}", result.branch_id))?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

impl TrmResults {
    /// Export the uncertainties to a semicolon-separated file
    pub fn to_csv(&self, path: &Path, case_date: &DateTime<Utc>) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating CSV file at {}", path.display()))?;
        write_csv(self, file, case_date)
    }
}
