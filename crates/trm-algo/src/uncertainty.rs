use serde::{Deserialize, Serialize};
use trm_core::{Country, Network};

/// `NaN`, `Infinity` or `-Infinity`; `None` for finite values.
pub(crate) fn non_finite_name(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NaN")
    } else if value == f64::INFINITY {
        Some("Infinity")
    } else if value == f64::NEG_INFINITY {
        Some("-Infinity")
    } else {
        None
    }
}

/// JSON has no literal for IEEE special values: they are written as the
/// strings `"NaN"`, `"Infinity"` and `"-Infinity"` and read back from them.
mod ieee_float {
    use super::non_finite_name;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match non_finite_name(*value) {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_f64(*value),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Name(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Name(name) => match name.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, NaN, Infinity or -Infinity",
                )),
            },
        }
    }
}

/// TRM uncertainty of one monitored branch.
///
/// `uncertainty = (market_based_flow - reference_flow) / reference_zonal_ptdf`,
/// IEEE special values included: a zero PTDF gives an infinite uncertainty and
/// a NaN flow gives a NaN uncertainty. Both survive a JSON round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyResult {
    pub branch_id: String,
    pub branch_name: String,
    pub country_side_1: Option<Country>,
    pub country_side_2: Option<Country>,
    #[serde(with = "ieee_float")]
    pub market_based_flow: f64,
    #[serde(with = "ieee_float")]
    pub reference_flow: f64,
    #[serde(with = "ieee_float")]
    pub reference_zonal_ptdf: f64,
    #[serde(with = "ieee_float")]
    pub uncertainty: f64,
}

impl UncertaintyResult {
    pub fn new(
        branch_id: impl Into<String>,
        branch_name: impl Into<String>,
        country_side_1: Option<Country>,
        country_side_2: Option<Country>,
        market_based_flow: f64,
        reference_flow: f64,
        reference_zonal_ptdf: f64,
    ) -> Self {
        Self {
            branch_id: branch_id.into(),
            branch_name: branch_name.into(),
            country_side_1,
            country_side_2,
            market_based_flow,
            reference_flow,
            reference_zonal_ptdf,
            uncertainty: (market_based_flow - reference_flow) / reference_zonal_ptdf,
        }
    }

    /// Name and side countries are read from the reference network. The name
    /// falls back to the id when the branch carries no element name.
    pub fn for_branch(
        reference: &Network,
        branch_id: &str,
        market_based_flow: f64,
        reference_flow: f64,
        reference_zonal_ptdf: f64,
    ) -> Self {
        let (country_side_1, country_side_2) =
            reference.branch_countries(branch_id).unwrap_or((None, None));
        let branch_name = reference.element_name(branch_id).unwrap_or(branch_id);
        Self::new(
            branch_id,
            branch_name,
            country_side_1,
            country_side_2,
            market_based_flow,
            reference_flow,
            reference_zonal_ptdf,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn result(market: f64, reference: f64, ptdf: f64) -> UncertaintyResult {
        UncertaintyResult::new("toto", "toto", None, None, market, reference, ptdf)
    }

    #[test]
    fn formula() {
        assert_eq!(result(100.0, 112.0, -1.0).uncertainty, 12.0);
        assert!((result(150.0, 100.0, 0.25).uncertainty - 200.0).abs() < 1e-12);
    }

    #[test]
    fn zero_ptdf_gives_infinity() {
        assert_eq!(result(100.0, 112.0, 0.0).uncertainty, f64::NEG_INFINITY);
        assert_eq!(result(112.0, 100.0, 0.0).uncertainty, f64::INFINITY);
    }

    #[test]
    fn nan_flow_propagates() {
        assert!(result(f64::NAN, 112.0, -1.0).uncertainty.is_nan());
        assert!(result(100.0, 100.0, 0.0).uncertainty.is_nan());
    }

    #[test]
    fn special_values_survive_json() {
        let infinite = result(100.0, 112.0, 0.0);
        let value = serde_json::to_value(&infinite).unwrap();
        assert_eq!(value["uncertainty"], "-Infinity");
        assert_eq!(value["market_based_flow"], 100.0);
        let read: UncertaintyResult = serde_json::from_value(value).unwrap();
        assert_eq!(read.uncertainty, f64::NEG_INFINITY);
        assert_eq!(read.reference_zonal_ptdf, 0.0);

        let text = serde_json::to_string(&result(f64::NAN, 112.0, -1.0)).unwrap();
        let read: UncertaintyResult = serde_json::from_str(&text).unwrap();
        assert!(read.market_based_flow.is_nan());
        assert!(read.uncertainty.is_nan());
        assert_eq!(read.reference_flow, 112.0);
    }

    #[test]
    fn unknown_number_names_are_rejected() {
        let text = r#"{"branch_id":"a","branch_name":"a","country_side_1":null,"country_side_2":null,
            "market_based_flow":"lots","reference_flow":1.0,"reference_zonal_ptdf":1.0,"uncertainty":0.0}"#;
        assert!(serde_json::from_str::<UncertaintyResult>(text).is_err());
    }

    #[test]
    fn branch_metadata_comes_from_the_reference() {
        let mut network = three_country_network();
        network.branch_mut(FR_BE).unwrap().element_name = Some("Avelin - Avelgem".to_string());
        let with_name = UncertaintyResult::for_branch(&network, FR_BE, 100.0, 112.0, -1.0);
        assert_eq!(with_name.branch_name, "Avelin - Avelgem");
        assert_eq!(with_name.country_side_1, Some(Country::FR));
        assert_eq!(with_name.country_side_2, Some(Country::BE));

        let without_name = UncertaintyResult::for_branch(&network, BE_DE, 0.0, 0.0, 1.0);
        assert_eq!(without_name.branch_name, BE_DE);
    }
}
