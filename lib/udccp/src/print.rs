// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print converter state in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both udccpadm and integration tests.

use std::io::Write;
use tabwriter::TabWriter;
use udccp_api::ConvCfg;
use udccp_api::ConvStatsSnap;

/// Print a [`ConvCfg`].
pub fn print_cfg(cfg: &ConvCfg) -> std::io::Result<()> {
    print_cfg_into(&mut std::io::stdout(), cfg)
}

/// Print a [`ConvCfg`] into a given writer.
pub fn print_cfg_into(
    writer: &mut impl Write,
    cfg: &ConvCfg,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    let ports = cfg.ports;
    let last = u32::from(ports.base()) + u32::from(ports.count());

    writeln!(t, "BASE PORT\tPORT COUNT\tRANGE")?;
    writeln!(
        t,
        "{}\t{}\t[{}, {})",
        ports.base(),
        ports.count(),
        ports.base(),
        last
    )?;
    t.flush()
}

/// Print a [`ConvStatsSnap`].
pub fn print_stats(stats: &ConvStatsSnap) -> std::io::Result<()> {
    print_stats_into(&mut std::io::stdout(), stats)
}

/// Print a [`ConvStatsSnap`] into a given writer.
pub fn print_stats_into(
    writer: &mut impl Write,
    stats: &ConvStatsSnap,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "Converter Stats")?;
    write_hrb(&mut t)?;
    writeln!(t, "COUNTER\tVALUE")?;
    writeln!(t, "dccp_to_udp\t{}", stats.dccp_to_udp)?;
    writeln!(t, "udp_to_dccp\t{}", stats.udp_to_dccp)?;
    writeln!(t, "passed\t{}", stats.passed)?;
    writeln!(t, "drop_bad_csum\t{}", stats.drop_bad_csum)?;
    writeln!(t, "drop_linearize\t{}", stats.drop_linearize)?;
    write_hr(&mut t)?;
    writeln!(t, "converted\t{}", stats.converted())?;
    writeln!(t, "dropped\t{}", stats.dropped())?;
    t.flush()
}

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<40}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<40}", "-")
}
