// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Converter configuration.

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// The default first port of the converted range.
pub const DEF_BASE_PORT: u16 = 1337;

/// The default number of ports in the converted range.
pub const DEF_PORT_COUNT: u16 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CfgError {
    /// The range would extend beyond port 65535.
    RangeOverflow { base: u16, count: u16 },
}

impl Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RangeOverflow { base, count } => write!(
                f,
                "port range {}+{} extends past port {}",
                base,
                count,
                u16::MAX
            ),
        }
    }
}

/// A contiguous window of transport ports: `[base, base + count)`.
///
/// A packet is subject to conversion when either its source or its
/// destination port falls inside this window. A `count` of zero is a
/// valid, empty window which matches nothing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "PortRangeRepr", into = "PortRangeRepr")]
pub struct PortRange {
    base: u16,
    count: u16,
}

#[derive(Clone, Copy, Deserialize, Serialize)]
struct PortRangeRepr {
    base: u16,
    count: u16,
}

impl TryFrom<PortRangeRepr> for PortRange {
    type Error = CfgError;

    fn try_from(repr: PortRangeRepr) -> Result<Self, Self::Error> {
        Self::new(repr.base, repr.count)
    }
}

impl From<PortRange> for PortRangeRepr {
    fn from(range: PortRange) -> Self {
        Self { base: range.base, count: range.count }
    }
}

impl PortRange {
    pub fn new(base: u16, count: u16) -> Result<Self, CfgError> {
        if u32::from(base) + u32::from(count) > u32::from(u16::MAX) + 1 {
            return Err(CfgError::RangeOverflow { base, count });
        }

        Ok(Self { base, count })
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Is `port` inside the window?
    #[inline]
    pub fn contains(&self, port: u16) -> bool {
        let port = u32::from(port);
        let base = u32::from(self.base);
        port >= base && port < base + u32::from(self.count)
    }

    /// Does either end of a transport flow fall inside the window?
    #[inline]
    pub fn matches(&self, src: u16, dst: u16) -> bool {
        self.contains(src) || self.contains(dst)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self { base: DEF_BASE_PORT, count: DEF_PORT_COUNT }
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}+{}", self.base, self.count)
    }
}

/// Parse either `<base>` (a single port) or `<base>+<count>`.
impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, count) = match s.split_once('+') {
            Some((base, count)) => (base, count),
            None => (s, "1"),
        };

        let base = base
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("bad base port {}: {}", base, e))?;
        let count = count
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("bad port count {}: {}", count, e))?;

        Self::new(base, count).map_err(|e| format!("{}", e))
    }
}

/// Configuration consumed, read-only, by the converter.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ConvCfg {
    /// The ports whose traffic is converted.
    pub ports: PortRange,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_range() {
        let range = PortRange::default();
        assert!(range.contains(1337));
        assert!(!range.contains(1336));
        assert!(!range.contains(1338));
    }

    #[test]
    fn range_bounds() {
        let range = PortRange::new(5000, 10).unwrap();
        assert!(!range.contains(4999));
        assert!(range.contains(5000));
        assert!(range.contains(5009));
        assert!(!range.contains(5010));
        assert!(range.matches(80, 5003));
        assert!(range.matches(5003, 80));
        assert!(!range.matches(80, 443));
    }

    #[test]
    fn range_top_of_port_space() {
        let range = PortRange::new(65535, 1).unwrap();
        assert!(range.contains(65535));
        assert!(!range.contains(0));

        assert_eq!(
            PortRange::new(65535, 2),
            Err(CfgError::RangeOverflow { base: 65535, count: 2 })
        );
    }

    #[test]
    fn empty_range_matches_nothing() {
        let range = PortRange::new(1337, 0).unwrap();
        assert!(!range.contains(1337));
    }

    #[test]
    fn range_from_str() {
        assert_eq!(
            "4000".parse::<PortRange>().unwrap(),
            PortRange::new(4000, 1).unwrap()
        );
        assert_eq!(
            "4000+16".parse::<PortRange>().unwrap(),
            PortRange::new(4000, 16).unwrap()
        );
        assert!("70000".parse::<PortRange>().is_err());
        assert!("65000+1000".parse::<PortRange>().is_err());
        assert!("abc+1".parse::<PortRange>().is_err());
    }

    #[test]
    fn cfg_from_toml() {
        let cfg: ConvCfg =
            toml::from_str("[ports]\nbase = 4000\ncount = 4\n").unwrap();
        assert_eq!(cfg.ports, PortRange::new(4000, 4).unwrap());

        let cfg: ConvCfg = toml::from_str("").unwrap();
        assert_eq!(cfg, ConvCfg::default());

        let bad =
            toml::from_str::<ConvCfg>("[ports]\nbase = 65535\ncount = 4\n");
        assert!(bad.is_err());
    }

    #[test]
    fn cfg_json_round_trip() {
        let cfg = ConvCfg { ports: PortRange::new(9000, 3).unwrap() };
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(json, r#"{"ports":{"base":9000,"count":3}}"#);
        assert_eq!(serde_json::from_str::<ConvCfg>(&json).unwrap(), cfg);
    }
}
