// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod pcap;

// Let's make our lives easier and pub use a bunch of stuff.
pub use udccp::api::ConvCfg;
pub use udccp::api::ConvStatsSnap;
pub use udccp::api::Hook;
pub use udccp::api::Ipv4Addr;
pub use udccp::api::PortRange;
pub use udccp::api::Protocol;
pub use udccp::api::Verdict;
pub use udccp::engine::Converter;
pub use udccp::engine::OffloadFlags;
pub use udccp::engine::PacketBuf;
pub use udccp::engine::checksum::HeaderChecksum;
pub use udccp::engine::dccp::DCCP_EXT_HDR_LEN;
pub use udccp::engine::dccp::DCCP_FIXED_HDR_LEN;
pub use udccp::engine::dccp::DccpType;
pub use udccp::engine::gate::Skip;
pub use udccp::engine::transcode::DropReason;
pub use udccp::engine::transcode::Outcome;
pub use udccp::engine::transcode::dccp_to_udp;
pub use udccp::engine::transcode::l4_csum_ok;
pub use udccp::engine::transcode::udp_to_dccp;

use slog::Logger;
use slog::o;
use smoltcp::wire::IpAddress;
use smoltcp::wire::Ipv4Address;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::UdpPacket;
use udccp::engine::dccp::DCCP_TYPE_SHIFT;
use udccp::engine::dccp::pack_nibbles;
use udccp::engine::ip4::Ipv4Hdr;
use udccp::engine::ip4::pseudo_csum;

pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(172, 30, 0, 5);
pub const SERVER_IP: Ipv4Addr = Ipv4Addr::new(172, 30, 0, 6);

/// A description of a DCCP/IPv4 packet with an extended header.
///
/// [`DccpPkt::build`] produces the bytes with correct IPv4 and
/// DCCP checksums; every field can be set to something odd to see
/// what the converter makes of it.
#[derive(Clone, Debug)]
pub struct DccpPkt {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ip_opts: Vec<u8>,
    pub proto: Protocol,
    pub src_port: u16,
    pub dst_port: u16,
    pub doff: u8,
    pub ccval: u8,
    pub cscov: u8,
    /// The 3 reserved bits ahead of Type.
    pub reserved: u8,
    pub pkt_type: DccpType,
    pub x: bool,
    /// The reserved byte following Type and X.
    pub reserved2: u8,
    /// Only the low 48 bits are used.
    pub seq: u64,
    /// End the packet after the 12-byte fixed region, leaving off the
    /// low sequence word. The payload must be empty.
    pub fixed_only: bool,
    pub payload: Vec<u8>,
}

impl Default for DccpPkt {
    fn default() -> Self {
        Self {
            src: CLIENT_IP,
            dst: SERVER_IP,
            ip_opts: vec![],
            proto: Protocol::DCCP,
            src_port: 1337,
            dst_port: 1337,
            doff: 4,
            ccval: 0,
            cscov: 0,
            reserved: 0,
            pkt_type: DccpType::Data,
            x: true,
            reserved2: 0,
            seq: 0,
            fixed_only: false,
            payload: vec![],
        }
    }
}

impl DccpPkt {
    pub fn ip_hdr_len(&self) -> usize {
        Ipv4Hdr::BASE_SIZE + self.ip_opts.len()
    }

    /// Produce the packet bytes.
    ///
    /// The IPv4 Total Length is clamped to 65535 so that oversized
    /// packets can still be built.
    pub fn build(&self) -> Vec<u8> {
        assert_eq!(self.ip_opts.len() % 4, 0, "IPv4 options must be padded");
        let ip_hdr_len = self.ip_hdr_len();
        let ulp_len = if self.fixed_only {
            assert!(self.payload.is_empty(), "no room for a payload");
            DCCP_FIXED_HDR_LEN
        } else {
            DCCP_EXT_HDR_LEN + self.payload.len()
        };
        let total = u16::try_from(ip_hdr_len + ulp_len).unwrap_or(u16::MAX);
        let ihl = 0x40 | (ip_hdr_len / 4) as u8;

        let mut bytes = Vec::with_capacity(ip_hdr_len + ulp_len);
        bytes.extend_from_slice(&[ihl, 0x00]);
        bytes.extend_from_slice(&total.to_be_bytes());
        bytes.extend_from_slice(&[0x1D, 0xE4, 0x40, 0x00]);
        bytes.extend_from_slice(&[64, u8::from(self.proto), 0x00, 0x00]);
        bytes.extend_from_slice(&self.src.octets());
        bytes.extend_from_slice(&self.dst.octets());
        bytes.extend_from_slice(&self.ip_opts);

        let res_type_x = ((self.reserved & 0x07) << 5)
            | ((u8::from(self.pkt_type) & 0x0F) << DCCP_TYPE_SHIFT)
            | u8::from(self.x);
        let seq = self.seq.to_be_bytes();
        bytes.extend_from_slice(&self.src_port.to_be_bytes());
        bytes.extend_from_slice(&self.dst_port.to_be_bytes());
        bytes.extend_from_slice(&[
            self.doff,
            pack_nibbles(self.ccval, self.cscov),
            0x00,
            0x00,
            res_type_x,
            self.reserved2,
        ]);
        bytes.extend_from_slice(&seq[2..4]);
        if !self.fixed_only {
            bytes.extend_from_slice(&seq[4..]);
        }
        bytes.extend_from_slice(&self.payload);

        let (mut ip, _) = Ipv4Hdr::parse(&mut bytes).unwrap();
        ip.compute_hdr_csum();

        let mut csum = pseudo_csum(
            self.src,
            self.dst,
            self.proto,
            ulp_len.min(usize::from(u16::MAX)) as u16,
        );
        csum.add_bytes(&bytes[ip_hdr_len..]);
        let hc = HeaderChecksum::from(csum).bytes();
        bytes[ip_hdr_len + 6..ip_hdr_len + 8].copy_from_slice(&hc);
        bytes
    }

    /// Produce the packet as a single segment.
    pub fn pkt(&self) -> PacketBuf {
        PacketBuf::copy(self.build())
    }

    /// Produce the packet split into segments at the given offsets.
    pub fn segmented(&self, splits: &[usize]) -> PacketBuf {
        split_at(&self.build(), splits)
    }
}

/// Split `bytes` into a multi-segment packet at the given ascending
/// offsets.
pub fn split_at(bytes: &[u8], splits: &[usize]) -> PacketBuf {
    let mut segs = vec![];
    let mut start = 0;
    for &at in splits {
        segs.push(bytes[start..at].to_vec());
        start = at;
    }
    segs.push(bytes[start..].to_vec());
    PacketBuf::from_segments(segs)
}

fn smol_addr(ip: [u8; 4]) -> IpAddress {
    IpAddress::Ipv4(Ipv4Address::from_bytes(&ip))
}

/// Verify a UDP/IPv4 packet with smoltcp: the IPv4 header checksum,
/// the protocol, the UDP Length, and the UDP checksum.
pub fn smol_verify_udp(pkt: &PacketBuf) -> bool {
    let bytes = pkt.copy_all();
    let Ok(ip) = Ipv4Packet::new_checked(&bytes[..]) else {
        return false;
    };

    if !ip.verify_checksum() || u8::from(ip.next_header()) != 0x11 {
        return false;
    }

    let src = ip.src_addr().0;
    let dst = ip.dst_addr().0;
    let payload = ip.payload();
    let Ok(udp) = UdpPacket::new_checked(payload) else {
        return false;
    };

    // smoltcp treats a zero checksum as "not present"; we never send
    // one, so insist on it being there.
    udp.checksum() != 0
        && usize::from(udp.len()) == payload.len()
        && udp.verify_checksum(&smol_addr(src), &smol_addr(dst))
}

/// Verify the IPv4 header checksum with smoltcp and the DCCP checksum
/// with the engine.
pub fn verify_dccp(pkt: &PacketBuf) -> bool {
    let bytes = pkt.copy_all();
    let Ok(ip) = Ipv4Packet::new_checked(&bytes[..]) else {
        return false;
    };

    ip.verify_checksum()
        && u8::from(ip.next_header()) == 0x21
        && l4_csum_ok(pkt, Protocol::DCCP)
}

/// Return the 16-byte transport header of a linear-or-not packet.
pub fn ulp_hdr(pkt: &PacketBuf, ip_hdr_len: usize) -> [u8; 16] {
    let mut hdr = [0u8; 16];
    assert!(pkt.read_at(ip_hdr_len, &mut hdr));
    hdr
}

/// Return the 48-bit sequence number of a packet with a full
/// extended header, in either encoding.
pub fn dccp_seq(pkt: &PacketBuf, ip_hdr_len: usize) -> u64 {
    let hdr = ulp_hdr(pkt, ip_hdr_len);
    let mut seq = [0u8; 8];
    seq[2..].copy_from_slice(&hdr[10..]);
    u64::from_be_bytes(seq)
}

/// A logger that goes nowhere.
pub fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// A converter for the default port range (1337/1).
pub fn default_converter() -> Converter {
    Converter::new(ConvCfg::default(), &test_logger())
}
