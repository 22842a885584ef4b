// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The converter: hook dispatch, statistics, and logging.
//!
//! A [`Converter`] is what the interception layer talks to. It is
//! handed one packet at a time along with the hook the packet was
//! seen on, runs the matching transcoder, and answers with a
//! [`Verdict`]. It keeps no per-packet or per-flow state; the
//! counters it maintains never feed back into a verdict.

use super::packet::PacketBuf;
use super::transcode::DropReason;
use super::transcode::Outcome;
use super::transcode::dccp_to_udp;
use super::transcode::udp_to_dccp;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;
use slog::Logger;
use slog::o;
use slog::trace;
use slog::warn;
use udccp_api::ConvCfg;
use udccp_api::ConvStatsSnap;
use udccp_api::Hook;
use udccp_api::Verdict;

/// Cumulative counters for a single [`Converter`].
#[derive(Debug, Default)]
pub struct ConvStats {
    /// The number of outbound DCCP packets rewritten as UDP.
    dccp_to_udp: AtomicU64,

    /// The number of inbound UDP-shaped packets restored to DCCP.
    udp_to_dccp: AtomicU64,

    /// The number of packets, in either direction, accepted without
    /// modification.
    passed: AtomicU64,

    /// The number of inbound packets dropped because their UDP
    /// checksum did not verify.
    drop_bad_csum: AtomicU64,

    /// The number of inbound packets dropped because they could not
    /// be made contiguous.
    drop_linearize: AtomicU64,
}

impl ConvStats {
    fn bump(ctr: &AtomicU64) {
        ctr.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConvStatsSnap {
        ConvStatsSnap {
            dccp_to_udp: self.dccp_to_udp.load(Ordering::Relaxed),
            udp_to_dccp: self.udp_to_dccp.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            drop_bad_csum: self.drop_bad_csum.load(Ordering::Relaxed),
            drop_linearize: self.drop_linearize.load(Ordering::Relaxed),
        }
    }
}

pub struct Converter {
    cfg: ConvCfg,
    stats: ConvStats,
    log: Logger,
}

impl Converter {
    pub fn new(cfg: ConvCfg, log: &Logger) -> Self {
        let log = log.new(o!("ports" => cfg.ports.to_string()));
        Self { cfg, stats: ConvStats::default(), log }
    }

    pub fn cfg(&self) -> &ConvCfg {
        &self.cfg
    }

    /// Process the packet.
    ///
    /// Packets seen at [`Hook::PostRouting`] carrying DCCP are
    /// re-encoded as UDP; packets seen at [`Hook::PreRouting`]
    /// carrying UDP are restored to DCCP. Everything else, including
    /// packets outside the configured port range, is accepted
    /// untouched. Only the inbound direction ever drops.
    pub fn process(&self, hook: Hook, pkt: &mut PacketBuf) -> Verdict {
        let ports = &self.cfg.ports;

        match hook {
            Hook::PostRouting => match dccp_to_udp(pkt, ports) {
                Outcome::Converted => {
                    ConvStats::bump(&self.stats.dccp_to_udp);
                    trace!(self.log, "DCCP -> UDP"; "len" => pkt.byte_len());
                }

                Outcome::Skipped(skip) => self.passed(hook, skip),
            },

            Hook::PreRouting => match udp_to_dccp(pkt, ports) {
                Ok(Outcome::Converted) => {
                    ConvStats::bump(&self.stats.udp_to_dccp);
                    trace!(self.log, "UDP -> DCCP"; "len" => pkt.byte_len());
                }

                Ok(Outcome::Skipped(skip)) => self.passed(hook, skip),

                Err(reason) => {
                    match reason {
                        DropReason::BadChecksum { .. } => {
                            ConvStats::bump(&self.stats.drop_bad_csum)
                        }

                        DropReason::Linearize(_) => {
                            ConvStats::bump(&self.stats.drop_linearize)
                        }
                    }

                    warn!(self.log, "dropping packet: {}", reason;
                        "hook" => %hook);
                    return Verdict::Drop;
                }
            },
        }

        Verdict::Accept
    }

    fn passed(&self, hook: Hook, skip: impl core::fmt::Display) {
        ConvStats::bump(&self.stats.passed);
        trace!(self.log, "pass: {}", skip; "hook" => %hook);
    }

    pub fn stats(&self) -> ConvStatsSnap {
        self.stats.snapshot()
    }
}
