// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Routines for building and reading packet capture files.

pub use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::fs::File;
use std::io::Write;
use udccp::engine::PacketBuf;

/// The Ethernet header prepended by [`PcapBuilder::add_pkt`] when
/// building an `ETHERNET` capture.
pub const ETHER_HDR: [u8; 14] = [
    0xA8, 0x40, 0x25, 0x00, 0x00, 0x02, 0xA8, 0x40, 0x25, 0x00, 0x00, 0x01,
    0x08, 0x00,
];

/// Build a packet capture file from a series of packets.
pub struct PcapBuilder<W: Write> {
    out: W,
    linktype: Linktype,
}

impl PcapBuilder<File> {
    /// Create a new pcap builder, writing all captures to `path`.
    pub fn new(path: &str) -> Self {
        Self::with_writer(File::create(path).unwrap(), Linktype::RAW)
    }
}

impl<W: Write> PcapBuilder<W> {
    /// Create a new pcap builder of the given link type, writing to
    /// `out`.
    pub fn with_writer(mut out: W, linktype: Linktype) -> Self {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 65535,
            network: linktype,
        };

        out.write_all(&hdr.to_vec().unwrap()).unwrap();

        Self { out, linktype }
    }

    /// Add a packet to the capture.
    pub fn add_pkt(&mut self, pkt: &PacketBuf) {
        let mut pkt_bytes = vec![];
        if self.linktype == Linktype::ETHERNET {
            pkt_bytes.extend_from_slice(&ETHER_HDR);
        }
        pkt_bytes.extend_from_slice(&pkt.copy_all());

        let mut block = LegacyPcapBlock {
            ts_sec: 7777,
            ts_usec: 7777,
            caplen: pkt_bytes.len() as u32,
            origlen: pkt_bytes.len() as u32,
            data: &pkt_bytes,
        };

        self.out.write_all(&block.to_vec().unwrap()).unwrap();
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Return the link type and raw frames of a legacy pcap capture.
pub fn read_frames(mut bytes: &[u8]) -> (Linktype, Vec<Vec<u8>>) {
    let (rest, hdr) = match pcap::parse_pcap_header(bytes) {
        Ok(res) => res,
        Err(e) => panic!("failed to get header: {e:?}"),
    };
    bytes = rest;

    let mut frames = vec![];
    while !bytes.is_empty() {
        match pcap::parse_pcap_frame(bytes) {
            Ok((rest, block)) => {
                // We always want access to the entire packet.
                assert_eq!(block.origlen, block.caplen);
                frames.push(block.data.to_vec());
                bytes = rest;
            }

            Err(e) => panic!("failed to get next block: {e:?}"),
        }
    }

    (hdr.network, frames)
}
