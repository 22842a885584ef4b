// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use serde::Deserialize;
use serde::Serialize;

/// A point-in-time copy of the converter's counters.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct ConvStatsSnap {
    /// Outbound DCCP packets re-encoded as UDP.
    pub dccp_to_udp: u64,
    /// Inbound UDP-shaped packets restored to DCCP.
    pub udp_to_dccp: u64,
    /// Packets accepted without modification.
    pub passed: u64,
    /// Inbound packets dropped for a bad UDP checksum.
    pub drop_bad_csum: u64,
    /// Inbound packets dropped because they could not be linearized.
    pub drop_linearize: u64,
}

impl ConvStatsSnap {
    pub fn converted(&self) -> u64 {
        self.dccp_to_udp + self.udp_to_dccp
    }

    pub fn dropped(&self) -> u64 {
        self.drop_bad_csum + self.drop_linearize
    }
}
