// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Offline driver for the DCCP/UDP converter.
//!
//! The converter normally sits behind a packet interception layer.
//! This library stands in for that layer, feeding packets from a
//! capture file through a [`Converter`] and collecting the accepted
//! ones into a new capture.

use anyhow::Context;
use anyhow::anyhow;
use anyhow::bail;
use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::io::Write;
use std::path::Path;
use udccp::api::ConvCfg;
use udccp::api::Hook;
use udccp::api::PortRange;
use udccp::api::Verdict;
use udccp::engine::Converter;
use udccp::engine::PacketBuf;
use udccp::engine::ip4::Ipv4Hdr;

pub use udccp::api::API_VERSION;
pub use udccp::api::MAJOR_VERSION;

const ETHER_HDR_LEN: usize = 14;
const ETHER_TYPE_IPV4: [u8; 2] = [0x08, 0x00];

/// Configuration overrides given on the command line.
#[derive(Clone, Copy, Debug, Default)]
pub struct CfgOverrides {
    pub base_port: Option<u16>,
    pub port_count: Option<u16>,
}

impl CfgOverrides {
    pub fn apply(&self, cfg: ConvCfg) -> anyhow::Result<ConvCfg> {
        let base = self.base_port.unwrap_or(cfg.ports.base());
        let count = self.port_count.unwrap_or(cfg.ports.count());
        let ports = PortRange::new(base, count).map_err(|e| anyhow!("{e}"))?;
        Ok(ConvCfg { ports })
    }
}

/// Parse a TOML configuration.
pub fn cfg_from_toml(s: &str) -> anyhow::Result<ConvCfg> {
    toml::from_str(s).context("failed to parse configuration")
}

/// Load the configuration at `path`, if any, and apply `overrides` on
/// top of it.
pub fn load_cfg(
    path: Option<&Path>,
    overrides: CfgOverrides,
) -> anyhow::Result<ConvCfg> {
    let cfg = match path {
        Some(path) => {
            let s = std::fs::read_to_string(path).with_context(|| {
                format!("failed to read {}", path.display())
            })?;
            cfg_from_toml(&s)
                .with_context(|| format!("in {}", path.display()))?
        }

        None => ConvCfg::default(),
    };

    overrides.apply(cfg)
}

/// What happened to the frames of a capture.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CaptureSummary {
    pub read: u64,
    pub written: u64,
    pub dropped: u64,
    /// Ethernet frames not carrying IPv4, copied through as is.
    pub not_ipv4: u64,
}

// Where the IP packet starts within a frame of the given link type.
fn l3_offset(linktype: Linktype) -> anyhow::Result<usize> {
    match linktype {
        Linktype::RAW | Linktype::IPV4 => Ok(0),
        Linktype::ETHERNET => Ok(ETHER_HDR_LEN),
        other => bail!("unsupported link type: {}", other.0),
    }
}

// Split an IPv4 packet from the link-layer padding that follows it,
// going by Total Length. Anything that does not parse, or claims more
// bytes than the frame holds, is passed on whole.
fn split_trailer(l3: &[u8]) -> (&[u8], &[u8]) {
    let mut hdr = [0u8; Ipv4Hdr::MAX_SIZE];
    let n = l3.len().min(hdr.len());
    hdr[..n].copy_from_slice(&l3[..n]);

    let Ok((ip, _)) = Ipv4Hdr::parse(&mut hdr[..n]) else {
        return (l3, &[]);
    };

    let total = usize::from(ip.total_len());
    if total < ip.hdr_len() || total > l3.len() {
        return (l3, &[]);
    }

    l3.split_at(total)
}

/// Run every frame of the legacy pcap capture in `input` through
/// `conv` as if seen at `hook`, writing accepted frames to `out`.
///
/// The output capture has the same link type as the input. Frames
/// the converter drops are left out of it. Only the IPv4 packet is
/// handed to the converter; any padding after it is put back
/// unchanged on the way out.
pub fn convert_capture(
    conv: &Converter,
    hook: Hook,
    input: &[u8],
    mut out: impl Write,
) -> anyhow::Result<CaptureSummary> {
    let (mut rest, in_hdr) = pcap::parse_pcap_header(input)
        .map_err(|e| anyhow!("bad pcap header: {e:?}"))?;
    let l3_off = l3_offset(in_hdr.network)?;

    let mut hdr = PcapHeader {
        magic_number: 0xa1b2c3d4,
        version_major: 2,
        version_minor: 4,
        thiszone: 0,
        sigfigs: 0,
        snaplen: in_hdr.snaplen,
        network: in_hdr.network,
    };
    out.write_all(&hdr.to_vec().map_err(|e| anyhow!("{e:?}"))?)?;

    let mut summary = CaptureSummary::default();
    while !rest.is_empty() {
        let (next, block) = pcap::parse_pcap_frame(rest).map_err(|e| {
            anyhow!("bad pcap frame {}: {e:?}", summary.read + 1)
        })?;
        rest = next;
        summary.read += 1;

        if block.caplen != block.origlen {
            bail!("frame {} is truncated", summary.read);
        }

        let frame = block.data;
        if frame.len() < l3_off {
            bail!("frame {} is too short for its link type", summary.read);
        }

        let (l2, l3) = frame.split_at(l3_off);
        if l3_off == ETHER_HDR_LEN && l2[12..14] != ETHER_TYPE_IPV4 {
            summary.not_ipv4 += 1;
            write_frame(&mut out, &block, frame)?;
            summary.written += 1;
            continue;
        }

        let (l3, trailer) = split_trailer(l3);
        let mut pkt = PacketBuf::copy(l3);
        match conv.process(hook, &mut pkt) {
            Verdict::Accept => {
                let mut bytes = l2.to_vec();
                bytes.extend_from_slice(&pkt.copy_all());
                bytes.extend_from_slice(trailer);
                write_frame(&mut out, &block, &bytes)?;
                summary.written += 1;
            }

            Verdict::Drop => summary.dropped += 1,
        }
    }

    out.flush()?;
    Ok(summary)
}

fn write_frame(
    out: &mut impl Write,
    orig: &LegacyPcapBlock,
    data: &[u8],
) -> anyhow::Result<()> {
    let len = u32::try_from(data.len()).context("frame too large")?;
    let mut block = LegacyPcapBlock {
        ts_sec: orig.ts_sec,
        ts_usec: orig.ts_usec,
        caplen: len,
        origlen: len,
        data,
    };
    out.write_all(&block.to_vec().map_err(|e| anyhow!("{e:?}"))?)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use udccp_test_utils::*;
    use udccp_test_utils::pcap;

    #[test]
    fn cfg_overrides() {
        let cfg = cfg_from_toml("[ports]\nbase = 9000\ncount = 4\n").unwrap();
        assert_eq!(cfg.ports, PortRange::new(9000, 4).unwrap());

        let ovr = CfgOverrides { base_port: None, port_count: Some(8) };
        let cfg = ovr.apply(cfg).unwrap();
        assert_eq!(cfg.ports, PortRange::new(9000, 8).unwrap());

        let ovr = CfgOverrides { base_port: Some(65530), port_count: None };
        assert!(ovr.apply(cfg).is_err());

        assert_eq!(cfg_from_toml("").unwrap(), ConvCfg::default());
        assert!(cfg_from_toml("[ports]\nbase = \"x\"\n").is_err());
    }

    #[test]
    fn load_cfg_defaults() {
        let cfg = load_cfg(None, CfgOverrides::default()).unwrap();
        assert_eq!(cfg, ConvCfg::default());
        let path = Path::new("/nonexistent/udccp.toml");
        assert!(load_cfg(Some(path), CfgOverrides::default()).is_err());
    }

    fn capture(linktype: pcap::Linktype, pkts: &[PacketBuf]) -> Vec<u8> {
        let mut b = pcap::PcapBuilder::with_writer(Vec::<u8>::new(), linktype);
        for pkt in pkts {
            b.add_pkt(pkt);
        }
        b.into_inner()
    }

    #[test]
    fn ethernet_capture_round_trip() {
        let conv = default_converter();
        let descs: Vec<DccpPkt> = (0..3)
            .map(|i| DccpPkt {
                seq: 100 + i,
                payload: vec![0xC0; i as usize * 5 + 1],
                ..Default::default()
            })
            .collect();
        let pkts: Vec<PacketBuf> = descs.iter().map(|s| s.pkt()).collect();
        let input = capture(pcap::Linktype::ETHERNET, &pkts);

        let mut udp: Vec<u8> = vec![];
        let summary =
            convert_capture(&conv, Hook::PostRouting, &input, &mut udp)
                .unwrap();
        assert_eq!(summary.read, 3);
        assert_eq!(summary.written, 3);

        let (linktype, frames) = pcap::read_frames(&udp);
        assert_eq!(linktype, pcap::Linktype::ETHERNET);
        for frame in &frames {
            assert_eq!(frame[..14], pcap::ETHER_HDR);
            assert!(smol_verify_udp(&PacketBuf::copy(&frame[14..])));
        }

        let mut dccp: Vec<u8> = vec![];
        convert_capture(&conv, Hook::PreRouting, &udp, &mut dccp).unwrap();
        let (_, frames) = pcap::read_frames(&dccp);
        for (frame, desc) in frames.iter().zip(&descs) {
            let pkt = PacketBuf::copy(&frame[14..]);
            assert!(verify_dccp(&pkt));
            // The test packets carry CsCov 0 and no reserved bits, so
            // the round trip is exact.
            assert_eq!(pkt.copy_all(), desc.build());
        }

        let stats = conv.stats();
        assert_eq!((stats.dccp_to_udp, stats.udp_to_dccp), (3, 3));
    }

    // Write a single Ethernet frame carrying `pkt`, padded out to the
    // 60-byte minimum.
    fn padded_capture(pkt: &PacketBuf) -> Vec<u8> {
        let mut frame = pcap::ETHER_HDR.to_vec();
        frame.extend_from_slice(&pkt.copy_all());
        frame.resize(frame.len().max(60), 0);

        let mut out = Vec::<u8>::new();
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 65535,
            network: pcap::Linktype::ETHERNET,
        };
        out.extend_from_slice(&hdr.to_vec().unwrap());
        let len = frame.len() as u32;
        let mut block = LegacyPcapBlock {
            ts_sec: 1,
            ts_usec: 0,
            caplen: len,
            origlen: len,
            data: &frame,
        };
        out.extend_from_slice(&block.to_vec().unwrap());
        out
    }

    #[test]
    fn ethernet_padding_not_converted() {
        let conv = default_converter();
        let desc = DccpPkt::default();
        assert_eq!(desc.build().len(), 36);
        let input = padded_capture(&desc.pkt());

        let mut udp: Vec<u8> = vec![];
        convert_capture(&conv, Hook::PostRouting, &input, &mut udp)
            .unwrap();
        let (_, frames) = pcap::read_frames(&udp);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.len(), 60);
        assert_eq!(frame[14 + 24..14 + 26], [0x00, 16]);
        assert_eq!(frame[14 + 36..], [0u8; 10]);
        assert!(smol_verify_udp(&PacketBuf::copy(&frame[14..50])));

        // A padded UDP-shaped packet verifies over its real length.
        let mut udp_pkt = desc.pkt();
        conv.process(Hook::PostRouting, &mut udp_pkt);
        let input = padded_capture(&udp_pkt);
        let mut dccp: Vec<u8> = vec![];
        let summary =
            convert_capture(&conv, Hook::PreRouting, &input, &mut dccp)
                .unwrap();
        assert_eq!(summary.dropped, 0);
        let (_, frames) = pcap::read_frames(&dccp);
        assert_eq!(frames[0][14..50], desc.build()[..]);
        assert_eq!(frames[0][50..], [0u8; 10]);
    }

    #[test]
    fn split_trailer_bounds() {
        let pkt = DccpPkt::default().build();
        let mut padded = pkt.clone();
        padded.extend_from_slice(&[0xEE; 6]);
        assert_eq!(split_trailer(&padded), (&pkt[..], &[0xEE; 6][..]));

        // Total Length claiming more than the frame holds.
        let short = &pkt[..30];
        assert_eq!(split_trailer(short), (short, &[][..]));

        let junk = [0xFFu8; 8];
        assert_eq!(split_trailer(&junk), (&junk[..], &[][..]));
    }

    #[test]
    fn dropped_frames_left_out() {
        let conv = default_converter();
        let good = DccpPkt::default().pkt();
        let mut fwd = good.clone();
        conv.process(Hook::PostRouting, &mut fwd);
        let mut bad = fwd.copy_all();
        *bad.last_mut().unwrap() ^= 0x01;

        let input =
            capture(pcap::Linktype::RAW, &[fwd, PacketBuf::copy(&bad)]);
        let mut out: Vec<u8> = vec![];
        let summary =
            convert_capture(&conv, Hook::PreRouting, &input, &mut out)
                .unwrap();
        assert_eq!(
            summary,
            CaptureSummary { read: 2, written: 1, dropped: 1, not_ipv4: 0 }
        );
        let (_, frames) = pcap::read_frames(&out);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], good.copy_all());
    }

    #[test]
    fn unsupported_linktype() {
        let conv = default_converter();
        let input = capture(pcap::Linktype(147), &[]);
        let out = Vec::<u8>::new();
        let err = convert_capture(&conv, Hook::PreRouting, &input, out)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported link type"));
    }
}
