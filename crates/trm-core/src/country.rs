//! Country codes used to group buses into bidding zones.

use crate::{TrmError, TrmResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Two-letter upper-case ISO 3166 country code.
///
/// Substations carry a country; net positions and exchanges are computed per country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Country([u8; 2]);

impl Country {
    pub const AT: Country = Country(*b"AT");
    pub const BE: Country = Country(*b"BE");
    pub const CH: Country = Country(*b"CH");
    pub const CZ: Country = Country(*b"CZ");
    pub const DE: Country = Country(*b"DE");
    pub const ES: Country = Country(*b"ES");
    pub const FR: Country = Country(*b"FR");
    pub const IT: Country = Country(*b"IT");
    pub const NL: Country = Country(*b"NL");
    pub const PL: Country = Country(*b"PL");
    pub const PT: Country = Country(*b"PT");

    /// Parse a country code; lower-case input is accepted and normalized.
    pub fn new(code: &str) -> TrmResult<Self> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(TrmError::Parse(format!(
                "'{}' is not a two-letter country code",
                code
            )));
        }
        Ok(Country([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        // Always ASCII by construction.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl FromStr for Country {
    type Err = TrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::new(s)
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Country {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Country {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Country::new(&code).map_err(serde::de::Error::custom)
    }
}
