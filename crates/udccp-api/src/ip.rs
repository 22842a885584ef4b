// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub use core::net::Ipv4Addr;

pub const IPV4_VERSION: u8 = 4;

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Protocol {
    TCP,
    UDP,
    DCCP,
    Unknown(u8),
}

pub const PROTO_TCP: u8 = 0x6;
pub const PROTO_UDP: u8 = 0x11;
pub const PROTO_DCCP: u8 = 0x21;

impl Default for Protocol {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::DCCP => write!(f, "DCCP"),
            Self::Unknown(p) => write!(f, "Unknown({})", p),
        }
    }
}

impl From<u8> for Protocol {
    fn from(proto: u8) -> Self {
        match proto {
            PROTO_TCP => Self::TCP,
            PROTO_UDP => Self::UDP,
            PROTO_DCCP => Self::DCCP,
            _ => Self::Unknown(proto),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(proto: Protocol) -> u8 {
        match proto {
            Protocol::TCP => PROTO_TCP,
            Protocol::UDP => PROTO_UDP,
            Protocol::DCCP => PROTO_DCCP,
            Protocol::Unknown(v) => v,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn proto_round_trip() {
        for p in [Protocol::TCP, Protocol::UDP, Protocol::DCCP] {
            assert_eq!(Protocol::from(u8::from(p)), p);
        }

        assert_eq!(Protocol::from(33), Protocol::DCCP);
        assert_eq!(Protocol::from(17), Protocol::UDP);
        assert_eq!(Protocol::from(132), Protocol::Unknown(132));
        assert_eq!(u8::from(Protocol::Unknown(132)), 132);
    }
}
