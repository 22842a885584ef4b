// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The DCCP <-> UDP-shaped header transcoders.
//!
//! Both directions rewrite the 12-byte fixed region of the extended
//! DCCP header in place, flip the IPv4 protocol number, and recompute
//! the IPv4 header checksum and the transport checksum. The packet
//! never changes size.
//!
//! The transport checksum is built from three pieces: the
//! pseudo-header for the protocol the packet is becoming, the
//! rewritten fixed region, and everything after it. The last piece is
//! summed before any header bytes are touched; the region is 12 bytes
//! long, so that sum stays word-aligned with the transport segment.

use super::checksum::HeaderChecksum;
use super::dccp::DCCP_CSUM_OFF;
use super::dccp::DCCP_FIXED_HDR_LEN;
use super::gate;
use super::gate::Skip;
use super::ip4::Ipv4Hdr;
use super::ip4::Protocol;
use super::ip4::pseudo_csum;
use super::packet::LinearizeError;
use super::packet::OffloadFlags;
use super::packet::PacketBuf;
use udccp_api::PortRange;

/// The result of a transcoder that did not drop the packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The headers were rewritten.
    Converted,

    /// The packet was left byte-for-byte as it was.
    Skipped(Skip),
}

/// Why the reverse transcoder dropped a packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DropReason {
    #[error("failed to linearize: {0}")]
    Linearize(#[from] LinearizeError),

    #[error("bad UDP checksum: {stored:02X?}")]
    BadChecksum { stored: [u8; 2] },
}

/// Re-encode an outbound DCCP packet as UDP.
///
/// The forward direction never drops: anything that cannot be
/// rewritten in place goes out as it came in.
pub fn dccp_to_udp(pkt: &mut PacketBuf, ports: &PortRange) -> Outcome {
    match try_dccp_to_udp(pkt, ports) {
        Ok(()) => Outcome::Converted,
        Err(skip) => Outcome::Skipped(skip),
    }
}

fn try_dccp_to_udp(
    pkt: &mut PacketBuf,
    ports: &PortRange,
) -> Result<(), Skip> {
    let elig = gate::check(pkt, Protocol::DCCP, ports)?;
    let ulp_len = elig.ulp_len_u16()?;

    // Header rewriting is done in place on the first segment. The
    // rest of the packet may be scattered, it is only ever read.
    let hdrs_end = elig.ip_hdr_len + DCCP_FIXED_HDR_LEN;
    if pkt.head().len() < hdrs_end {
        return Err(Skip::NotContiguous);
    }

    let body = pkt.checksum_from(hdrs_end);
    let mut view = pkt.view()?;

    let fields = view.dccp().ext_fields();
    let mut udp = view.udp_shaped();
    udp.encode(&fields, ulp_len);
    udp.set_csum([0; 2]);

    view.ip.set_proto(Protocol::UDP);
    view.ip.compute_hdr_csum();

    let mut csum = pseudo_csum(elig.src, elig.dst, Protocol::UDP, ulp_len);
    csum += view.ulp_hdr_csum();
    csum += body;
    view.udp_shaped().set_csum(HeaderChecksum::from(csum).udp_bytes());

    Ok(())
}

/// Restore an inbound UDP-shaped packet to DCCP.
///
/// The packet is linearized and its UDP checksum checked, unless a
/// lower layer already vouched for it, before anything is rewritten.
/// A packet that fails either step must be dropped.
pub fn udp_to_dccp(
    pkt: &mut PacketBuf,
    ports: &PortRange,
) -> Result<Outcome, DropReason> {
    let elig = match gate::check(pkt, Protocol::UDP, ports) {
        Ok(elig) => elig,
        Err(skip) => return Ok(Outcome::Skipped(skip)),
    };

    pkt.linearize()?;

    let ulp_len = match elig.ulp_len_u16() {
        Ok(len) => len,
        Err(skip) => return Ok(Outcome::Skipped(skip)),
    };

    let mut flags = pkt.offload_flags();
    if !flags.contains(OffloadFlags::L4_CSUM_OK) {
        let mut csum =
            pseudo_csum(elig.src, elig.dst, Protocol::UDP, ulp_len);
        csum += pkt.checksum_from(elig.ip_hdr_len);

        if !csum.verifies() {
            let mut stored = [0u8; 2];
            let read =
                pkt.read_at(elig.ip_hdr_len + DCCP_CSUM_OFF, &mut stored);
            debug_assert!(read, "gate passed a truncated header");
            return Err(DropReason::BadChecksum { stored });
        }

        flags |= OffloadFlags::L4_CSUM_OK;
        pkt.set_offload_flags(flags);
    }

    let body = pkt.checksum_from(elig.ip_hdr_len + DCCP_FIXED_HDR_LEN);
    let mut view = match pkt.view() {
        Ok(view) => view,
        Err(e) => return Ok(Outcome::Skipped(Skip::from(e))),
    };

    let fields = view.udp_shaped().ext_fields();
    let mut dccp = view.dccp();
    dccp.restore(&fields);
    dccp.set_csum([0; 2]);

    view.ip.set_proto(Protocol::DCCP);
    view.ip.compute_hdr_csum();

    // DCCP has no "no checksum" value, a zero result is stored as is.
    let mut csum = pseudo_csum(elig.src, elig.dst, Protocol::DCCP, ulp_len);
    csum += view.ulp_hdr_csum();
    csum += body;
    view.dccp().set_csum(HeaderChecksum::from(csum).bytes());

    Ok(Outcome::Converted)
}

/// Does the packet's transport checksum verify for `proto`?
///
/// This reads the packet as it stands; it is meant for checking the
/// output of a transcoder.
pub fn l4_csum_ok(pkt: &PacketBuf, proto: Protocol) -> bool {
    let mut prefix = [0u8; Ipv4Hdr::MAX_SIZE];
    let copy_len = pkt.byte_len().min(prefix.len());
    let prefix = &mut prefix[..copy_len];
    if !pkt.read_at(0, prefix) {
        return false;
    }

    let Ok((ip, _)) = Ipv4Hdr::parse(prefix) else {
        return false;
    };

    let hdr_len = ip.hdr_len();
    let Ok(ulp_len) = u16::try_from(pkt.byte_len() - hdr_len) else {
        return false;
    };

    let mut csum = pseudo_csum(ip.src(), ip.dst(), proto, ulp_len);
    csum += pkt.checksum_from(hdr_len);
    csum.verifies()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::dccp::DCCP_EXT_HDR_LEN;
    use crate::engine::dccp::DccpType;

    // Builds a DCCP/IPv4 packet with correct IP and DCCP checksums.
    #[rustfmt::skip]
    fn dccp_pkt(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        let ulp_len = (DCCP_EXT_HDR_LEN + payload.len()) as u16;
        let total = (20 + ulp_len).to_be_bytes();
        let [sp0, sp1] = sport.to_be_bytes();
        let [dp0, dp1] = dport.to_be_bytes();

        let mut bytes = vec![
            0x45, 0x00, total[0], total[1],
            0x12, 0x34, 0x40, 0x00,
            0x40, 0x21, 0x00, 0x00,
            192, 168, 1, 10,
            192, 168, 1, 20,
            sp0, sp1, dp0, dp1,
            // doff 4, CCVal 2, CsCov 3
            0x04, 0x23, 0x00, 0x00,
            // reserved 0b010, type DataAck, X=1
            0x49, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x2A,
        ];
        bytes.extend_from_slice(payload);

        let (mut ip, _) = Ipv4Hdr::parse(&mut bytes).unwrap();
        ip.compute_hdr_csum();

        let mut csum = pseudo_csum(
            [192, 168, 1, 10].into(),
            [192, 168, 1, 20].into(),
            Protocol::DCCP,
            ulp_len,
        );
        csum.add_bytes(&bytes[20..]);
        let hc = HeaderChecksum::from(csum).bytes();
        bytes[26..28].copy_from_slice(&hc);
        bytes
    }

    fn ports() -> PortRange {
        PortRange::new(1337, 1).unwrap()
    }

    #[test]
    fn forward_layout() {
        let mut pkt = PacketBuf::copy(dccp_pkt(1337, 5001, &[1, 2, 3]));
        assert!(l4_csum_ok(&pkt, Protocol::DCCP));
        assert_eq!(dccp_to_udp(&mut pkt, &ports()), Outcome::Converted);

        let bytes = pkt.copy_all();
        assert_eq!(bytes[9], 0x11);
        // ports untouched
        assert_eq!(&bytes[20..24], &[0x05, 0x39, 0x13, 0x89]);
        // Length
        assert_eq!(&bytes[24..26], &[0x00, 19]);
        // CCVal 2, type DataAck
        assert_eq!(bytes[28], 0x24);
        // doff
        assert_eq!(bytes[29], 0x04);
        // seq untouched
        assert_eq!(&bytes[30..36], &[0, 1, 0, 0, 0, 0x2A]);

        let mut view = pkt.view().unwrap();
        assert!(view.ip.hdr_csum_ok());
        assert_eq!(view.udp_shaped().len(), 19);
        assert!(l4_csum_ok(&pkt, Protocol::UDP));
    }

    #[test]
    fn round_trip() {
        let orig = dccp_pkt(80, 1337, b"hello, world");
        let mut pkt = PacketBuf::copy(&orig);
        assert_eq!(dccp_to_udp(&mut pkt, &ports()), Outcome::Converted);
        assert_eq!(udp_to_dccp(&mut pkt, &ports()), Ok(Outcome::Converted));
        assert!(pkt.offload_flags().contains(OffloadFlags::L4_CSUM_OK));

        let mut view = pkt.view().unwrap();
        assert_eq!(view.ip.proto(), Protocol::DCCP);
        assert!(view.ip.hdr_csum_ok());
        let dccp = view.dccp();
        assert_eq!(dccp.src_port(), 80);
        assert_eq!(dccp.dst_port(), 1337);
        assert_eq!(dccp.doff(), 4);
        assert_eq!(dccp.ccval(), 2);
        assert_eq!(dccp.pkt_type(), DccpType::DataAck);
        assert_eq!(dccp.seq_high(), 0x0001);
        assert!(dccp.x());
        // Not carried by the UDP-shaped encoding.
        assert_eq!(dccp.cscov(), 0);
        assert_eq!(dccp.reserved(), 0);
        assert_eq!(dccp.reserved2(), 0);
        assert!(l4_csum_ok(&pkt, Protocol::DCCP));

        // Nor are the low sequence word and the payload.
        let bytes = pkt.copy_all();
        assert_eq!(&bytes[32..36], &[0x00, 0x00, 0x00, 0x2A]);
        assert_eq!(&bytes[36..], b"hello, world");
    }

    #[test]
    fn fixed_region_only() {
        // Cut the packet off after the fixed region and fix up the IP
        // header to match; the DCCP checksum is never looked at going
        // out.
        let mut bytes = dccp_pkt(1337, 1337, &[]);
        bytes.truncate(32);
        bytes[3] = 32;
        let (mut ip, _) = Ipv4Hdr::parse(&mut bytes).unwrap();
        ip.compute_hdr_csum();

        let mut pkt = PacketBuf::copy(&bytes);
        assert_eq!(dccp_to_udp(&mut pkt, &ports()), Outcome::Converted);
        let mut view = pkt.view().unwrap();
        assert_eq!(view.udp_shaped().len(), 12);
        assert!(l4_csum_ok(&pkt, Protocol::UDP));

        assert_eq!(udp_to_dccp(&mut pkt, &ports()), Ok(Outcome::Converted));
        assert_eq!(pkt.byte_len(), 32);
        assert!(l4_csum_ok(&pkt, Protocol::DCCP));
        let mut view = pkt.view().unwrap();
        let dccp = view.dccp();
        assert_eq!(dccp.doff(), 4);
        assert_eq!(dccp.pkt_type(), DccpType::DataAck);
    }

    #[test]
    fn forward_twice_skips() {
        let mut pkt = PacketBuf::copy(dccp_pkt(1337, 1337, &[]));
        assert_eq!(dccp_to_udp(&mut pkt, &ports()), Outcome::Converted);
        let before = pkt.clone();
        assert_eq!(
            dccp_to_udp(&mut pkt, &ports()),
            Outcome::Skipped(Skip::Proto(Protocol::UDP))
        );
        assert_eq!(pkt, before);
    }

    #[test]
    fn bad_checksum_drops() {
        let mut pkt = PacketBuf::copy(dccp_pkt(1337, 1337, &[9; 7]));
        dccp_to_udp(&mut pkt, &ports());
        let mut bytes = pkt.copy_all();
        let stored = [bytes[26], bytes[27]];
        bytes[40] ^= 0x10;
        let mut pkt = PacketBuf::copy(bytes);
        assert_eq!(
            udp_to_dccp(&mut pkt, &ports()),
            Err(DropReason::BadChecksum { stored })
        );
    }

    #[test]
    fn certified_packet_skips_verification() {
        let mut pkt = PacketBuf::copy(dccp_pkt(1337, 1337, &[9; 7]));
        dccp_to_udp(&mut pkt, &ports());
        let mut bytes = pkt.copy_all();
        bytes[26] ^= 0xFF;
        let mut pkt = PacketBuf::copy(bytes);
        pkt.set_offload_flags(OffloadFlags::L4_CSUM_OK);
        assert_eq!(udp_to_dccp(&mut pkt, &ports()), Ok(Outcome::Converted));
        assert!(l4_csum_ok(&pkt, Protocol::DCCP));
    }

    #[test]
    fn forward_head_too_short() {
        let bytes = dccp_pkt(1337, 1337, &[1; 10]);
        let mut pkt = PacketBuf::from_segments([
            bytes[..30].to_vec(),
            bytes[30..].to_vec(),
        ]);
        let before = pkt.clone();
        assert_eq!(
            dccp_to_udp(&mut pkt, &ports()),
            Outcome::Skipped(Skip::NotContiguous)
        );
        assert_eq!(pkt, before);
    }

    #[test]
    fn forward_scattered_payload() {
        let bytes = dccp_pkt(1337, 1337, &[0xA5; 11]);
        let mut linear = PacketBuf::copy(&bytes);
        let mut pkt = PacketBuf::from_segments([
            bytes[..37].to_vec(),
            bytes[37..40].to_vec(),
            bytes[40..].to_vec(),
        ]);
        assert_eq!(dccp_to_udp(&mut linear, &ports()), Outcome::Converted);
        assert_eq!(dccp_to_udp(&mut pkt, &ports()), Outcome::Converted);
        assert_eq!(pkt.copy_all(), linear.copy_all());
    }
}
