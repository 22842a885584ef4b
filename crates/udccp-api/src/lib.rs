// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod cfg;
pub mod ip;
pub mod stat;

pub use cfg::*;
pub use ip::*;
pub use stat::*;

/// The overall version of the API. Anytime an API type is added,
/// removed, or modified, this number should increment. Consumers
/// compare it to make sure the tooling and the engine agree on the
/// shape of configuration and statistics.
pub const API_VERSION: u64 = 1;

/// Major version of the converter package.
pub const MAJOR_VERSION: u64 = 0;

/// The interception point a packet was delivered from.
///
/// Outbound packets are seen at post-routing, right before they leave
/// the host; this is where DCCP is dressed up as UDP. Inbound packets
/// are seen at pre-routing, before the local stack classifies them;
/// this is where UDP-shaped DCCP is restored.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Hook {
    PreRouting = 1,
    PostRouting = 2,
}

impl core::str::FromStr for Hook {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pre-routing" | "prerouting" | "in" => Ok(Hook::PreRouting),
            "post-routing" | "postrouting" | "out" => Ok(Hook::PostRouting),
            _ => Err(format!("invalid hook: {}", s)),
        }
    }
}

impl Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hookstr = match self {
            Hook::PreRouting => "PRE_ROUTING",
            Hook::PostRouting => "POST_ROUTING",
        };

        write!(f, "{}", hookstr)
    }
}

/// The fate of a single packet handed to the converter.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Verdict {
    /// Reinject the packet, possibly rewritten in place.
    Accept,

    /// Discard the packet.
    Drop,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Accept => write!(f, "ACCEPT"),
            Verdict::Drop => write!(f, "DROP"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hook_from_str() {
        assert_eq!("pre-routing".parse::<Hook>().unwrap(), Hook::PreRouting);
        assert_eq!("POSTROUTING".parse::<Hook>().unwrap(), Hook::PostRouting);
        assert_eq!("out".parse::<Hook>().unwrap(), Hook::PostRouting);
        assert!("forward".parse::<Hook>().is_err());
    }
}
