//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CommonError, CommonResult};

/// An authority-qualified spatial reference identifier, e.g. `EPSG:32633`.
///
/// Rasters only ever compare CRS identifiers for equality; no reprojection
/// happens in this workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub authority: String,
    pub code: u32,
}

impl Crs {
    pub fn new(authority: impl Into<String>, code: u32) -> Self {
        Self {
            authority: authority.into().to_uppercase(),
            code,
        }
    }

    /// Shorthand for an EPSG code.
    pub fn epsg(code: u32) -> Self {
        Self::new("EPSG", code)
    }

    /// WGS84 geographic.
    pub fn wgs84() -> Self {
        Self::epsg(4326)
    }

    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:32633"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "32633" (bare integer, as catalogs report `proj:epsg`)
    pub fn parse(s: &str) -> CommonResult<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("CRS:84") {
            return Ok(Self::wgs84());
        }

        let (authority, code) = match trimmed.split_once(':') {
            Some((authority, code)) => (authority, code),
            None => ("EPSG", trimmed),
        };

        if authority.is_empty() {
            return Err(CommonError::InvalidCrs(s.to_string()));
        }

        let code = code
            .parse()
            .map_err(|_| CommonError::InvalidCrs(s.to_string()))?;
        Ok(Self::new(authority, code))
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        self.authority == "EPSG" && matches!(self.code, 4326 | 4269)
    }

    /// UTM zone number for EPSG 326xx/327xx codes.
    pub fn utm_zone(&self) -> Option<u32> {
        if self.authority != "EPSG" {
            return None;
        }
        match self.code {
            32601..=32660 => Some(self.code - 32600),
            32701..=32760 => Some(self.code - 32700),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl std::str::FromStr for Crs {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::epsg(4326));
        assert_eq!(Crs::parse("epsg:32633").unwrap(), Crs::epsg(32633));
        assert_eq!(Crs::parse("CRS:84").unwrap(), Crs::wgs84());
        assert_eq!(Crs::parse("32633").unwrap(), Crs::epsg(32633));
        assert!(Crs::parse("EPSG:abc").is_err());
        assert!(Crs::parse(":4326").is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let crs = Crs::epsg(32719);
        assert_eq!(crs.to_string(), "EPSG:32719");
        assert_eq!(crs.to_string().parse::<Crs>().unwrap(), crs);
    }

    #[test]
    fn test_utm_zone() {
        assert_eq!(Crs::epsg(32633).utm_zone(), Some(33));
        assert_eq!(Crs::epsg(32719).utm_zone(), Some(19));
        assert_eq!(Crs::wgs84().utm_zone(), None);
        assert!(Crs::wgs84().is_geographic());
    }
}
