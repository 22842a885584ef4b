// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use clap::Parser;
use slog::Drain;
use slog::Logger;
use slog::info;
use slog::o;

use udccp::api::Hook;
use udccp::engine::Converter;
use udccp::print::print_cfg;
use udccp::print::print_stats;
use udccpadm::API_VERSION;
use udccpadm::CfgOverrides;
use udccpadm::MAJOR_VERSION;

/// Run DCCP traffic through the UDP header converter.
#[derive(Debug, Parser)]
#[command(version = udccp_pkg_version())]
enum Command {
    /// Convert a packet capture, as seen on the given hook.
    ///
    /// Outbound (post-routing) DCCP packets in the port range are
    /// re-encoded as UDP; inbound (pre-routing) UDP packets in the
    /// port range are restored to DCCP. Dropped packets are left out
    /// of the output capture.
    Convert {
        /// pre-routing (inbound) or post-routing (outbound)
        #[arg(long)]
        hook: Hook,

        #[command(flatten)]
        cfg: CfgArgs,

        /// Input capture (legacy pcap: raw IPv4 or Ethernet)
        input: PathBuf,

        /// Output capture
        output: PathBuf,
    },

    /// Print the effective configuration.
    ShowConfig {
        #[command(flatten)]
        cfg: CfgArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Clone, Debug)]
struct CfgArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// The first port of the converted range
    #[arg(long)]
    base_port: Option<u16>,

    /// The number of ports in the converted range
    #[arg(long)]
    port_count: Option<u16>,
}

impl CfgArgs {
    fn load(&self) -> anyhow::Result<udccp::api::ConvCfg> {
        let overrides = CfgOverrides {
            base_port: self.base_port,
            port_count: self.port_count,
        };
        udccpadm::load_cfg(self.config.as_deref(), overrides)
    }
}

fn udccp_pkg_version() -> String {
    format!("{MAJOR_VERSION}.{API_VERSION}")
}

// Log to stderr, filtered by RUST_LOG.
fn root_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("component" => "udccpadm"))
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let log = root_logger();

    match cmd {
        Command::Convert { hook, cfg, input, output } => {
            let cfg = cfg.load()?;
            let conv = Converter::new(cfg, &log);
            let bytes = std::fs::read(&input).with_context(|| {
                format!("failed to read {}", input.display())
            })?;
            let out = std::fs::File::create(&output).with_context(|| {
                format!("failed to create {}", output.display())
            })?;
            let out = std::io::BufWriter::new(out);

            let summary =
                udccpadm::convert_capture(&conv, hook, &bytes, out)?;
            info!(log, "capture converted";
                "hook" => %hook,
                "read" => summary.read,
                "written" => summary.written,
                "dropped" => summary.dropped,
                "not_ipv4" => summary.not_ipv4
            );
            print_stats(&conv.stats())?;
        }

        Command::ShowConfig { cfg, json } => {
            let cfg = cfg.load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                print_cfg(&cfg)?;
            }
        }
    }

    Ok(())
}
