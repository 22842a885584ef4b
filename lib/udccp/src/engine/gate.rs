// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Deciding whether a packet is ours to convert.
//!
//! The gate never looks at the packet in place. It copies the front
//! of the packet, IPv4 header plus the fixed DCCP region, to
//! the stack and reads that copy, so a packet whose headers straddle
//! segments can still be classified. Anything it cannot make sense
//! of is reported as a [`Skip`] and the packet is left alone.

use super::dccp::DCCP_FIXED_HDR_LEN;
use super::dccp::DccpHdr;
use super::dccp::ExtHdrRaw;
use super::ip4::Ipv4Addr;
use super::ip4::Ipv4Hdr;
use super::ip4::Ipv4HdrError;
use super::ip4::Protocol;
use super::packet::PacketBuf;
use super::packet::ViewError;
use core::fmt;
use core::fmt::Display;
use udccp_api::PortRange;
use zerocopy::FromBytes;

const PREFIX_LEN: usize = Ipv4Hdr::MAX_SIZE + DCCP_FIXED_HDR_LEN;

/// Why a packet was passed through untouched.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Skip {
    /// The IPv4 header could not be parsed.
    BadIp(Ipv4HdrError),

    /// The packet carries a protocol other than the one this
    /// direction converts.
    Proto(Protocol),

    /// Fewer than 12 bytes follow the IP header.
    UlpTruncated { len: usize },

    /// The DCCP header uses short sequence numbers.
    NotExtended,

    /// Neither port is in the configured range.
    Ports { src: u16, dst: u16 },

    /// The headers are not all in the first segment.
    NotContiguous,

    /// The transport segment does not fit a 16-bit Length field.
    TooLong { len: usize },
}

impl Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadIp(e) => write!(f, "{}", e),
            Self::Proto(proto) => write!(f, "protocol {}", proto),
            Self::UlpTruncated { len } => {
                write!(f, "transport header truncated ({} bytes)", len)
            }
            Self::NotExtended => write!(f, "short DCCP header (X=0)"),
            Self::Ports { src, dst } => {
                write!(f, "ports {}->{} out of range", src, dst)
            }
            Self::NotContiguous => write!(f, "headers not contiguous"),
            Self::TooLong { len } => {
                write!(f, "transport segment too long ({} bytes)", len)
            }
        }
    }
}

impl From<ViewError> for Skip {
    fn from(e: ViewError) -> Self {
        match e {
            ViewError::Ip(e) => Self::BadIp(e),
            ViewError::UlpTruncated { len } => Self::UlpTruncated { len },
        }
    }
}

/// What the gate learned about an eligible packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Eligible {
    pub ip_hdr_len: usize,
    /// Bytes from the start of the transport header to the end of the
    /// packet.
    pub ulp_len: usize,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl Eligible {
    /// The transport segment length as it goes into a Length field or
    /// pseudo-header.
    pub fn ulp_len_u16(&self) -> Result<u16, Skip> {
        u16::try_from(self.ulp_len)
            .map_err(|_| Skip::TooLong { len: self.ulp_len })
    }
}

/// Check whether `pkt` carries `expect` with a port in `ports`.
///
/// When `expect` is DCCP the header must also be extended (X=1); the
/// UDP-shaped encoding has no X bit to check.
pub fn check(
    pkt: &PacketBuf,
    expect: Protocol,
    ports: &PortRange,
) -> Result<Eligible, Skip> {
    let pkt_len = pkt.byte_len();
    let mut prefix = [0u8; PREFIX_LEN];
    let copy_len = pkt_len.min(PREFIX_LEN);
    let prefix = &mut prefix[..copy_len];
    if !pkt.read_at(0, prefix) {
        return Err(Skip::BadIp(Ipv4HdrError::Truncated { len: copy_len }));
    }

    let (ip, rest) = Ipv4Hdr::parse(prefix).map_err(Skip::BadIp)?;

    let proto = ip.proto();
    if proto != expect {
        return Err(Skip::Proto(proto));
    }

    let len = rest.len();
    let (raw, _) = ExtHdrRaw::mut_from_prefix(rest)
        .map_err(|_| Skip::UlpTruncated { len })?;
    let dccp = DccpHdr::new(raw);

    if expect == Protocol::DCCP && !dccp.x() {
        return Err(Skip::NotExtended);
    }

    // Ports sit at the same offsets in both encodings.
    let (src_port, dst_port) = (dccp.src_port(), dccp.dst_port());
    if !ports.matches(src_port, dst_port) {
        return Err(Skip::Ports { src: src_port, dst: dst_port });
    }

    let ip_hdr_len = ip.hdr_len();
    Ok(Eligible {
        ip_hdr_len,
        ulp_len: pkt_len - ip_hdr_len,
        src: ip.src(),
        dst: ip.dst(),
        src_port,
        dst_port,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[rustfmt::skip]
    fn pkt_bytes(proto: u8, res_type_x: u8) -> Vec<u8> {
        let mut bytes = vec![
            // IPv4: 20 byte header, total length 40
            0x45, 0x00, 0x00, 0x28,
            0x00, 0x00, 0x40, 0x00,
            0x40, proto, 0x00, 0x00,
            10, 0, 0, 1,
            10, 0, 0, 2,
            // ports 1337 -> 80
            0x05, 0x39, 0x00, 0x50,
            // doff, ccval/cscov, csum
            0x04, 0x00, 0x00, 0x00,
            // res/type/x, reserved, seq high
            res_type_x, 0x00, 0x00, 0x00,
            // seq low
            0x00, 0x00, 0x00, 0x2A,
        ];
        bytes.extend_from_slice(&[0xEE; 4]);
        bytes
    }

    fn ports() -> PortRange {
        PortRange::new(1337, 1).unwrap()
    }

    #[test]
    fn eligible_dccp() {
        let pkt = PacketBuf::copy(pkt_bytes(0x21, 0x01));
        let elig = check(&pkt, Protocol::DCCP, &ports()).unwrap();
        assert_eq!(elig.ip_hdr_len, 20);
        assert_eq!(elig.ulp_len, 20);
        assert_eq!(elig.src, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(elig.dst, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!((elig.src_port, elig.dst_port), (1337, 80));
        assert_eq!(elig.ulp_len_u16(), Ok(20));
    }

    #[test]
    fn wrong_proto() {
        let pkt = PacketBuf::copy(pkt_bytes(0x11, 0x01));
        assert_eq!(
            check(&pkt, Protocol::DCCP, &ports()),
            Err(Skip::Proto(Protocol::UDP))
        );
        assert!(check(&pkt, Protocol::UDP, &ports()).is_ok());
    }

    #[test]
    fn short_header_forward_only() {
        let pkt = PacketBuf::copy(pkt_bytes(0x21, 0x00));
        assert_eq!(
            check(&pkt, Protocol::DCCP, &ports()),
            Err(Skip::NotExtended)
        );

        // A UDP-shaped header has Type and CCVal in byte 8; X is not
        // a thing there.
        let pkt = PacketBuf::copy(pkt_bytes(0x11, 0x00));
        assert!(check(&pkt, Protocol::UDP, &ports()).is_ok());
    }

    #[test]
    fn ports_out_of_range() {
        let pkt = PacketBuf::copy(pkt_bytes(0x21, 0x01));
        let ports = PortRange::new(2000, 10).unwrap();
        assert_eq!(
            check(&pkt, Protocol::DCCP, &ports),
            Err(Skip::Ports { src: 1337, dst: 80 })
        );

        // Destination port alone is enough.
        let ports = PortRange::new(79, 2).unwrap();
        assert!(check(&pkt, Protocol::DCCP, &ports).is_ok());
    }

    #[test]
    fn truncated() {
        let bytes = pkt_bytes(0x21, 0x01);
        let pkt = PacketBuf::copy(&bytes[..31]);
        assert_eq!(
            check(&pkt, Protocol::DCCP, &ports()),
            Err(Skip::UlpTruncated { len: 11 })
        );

        let pkt = PacketBuf::copy(&bytes[..10]);
        assert_eq!(
            check(&pkt, Protocol::DCCP, &ports()),
            Err(Skip::BadIp(Ipv4HdrError::Truncated { len: 10 }))
        );

        let pkt = PacketBuf::copy([]);
        assert!(matches!(
            check(&pkt, Protocol::DCCP, &ports()),
            Err(Skip::BadIp(_))
        ));
    }

    #[test]
    fn fixed_region_is_enough() {
        let bytes = pkt_bytes(0x21, 0x01);
        let pkt = PacketBuf::copy(&bytes[..32]);
        let elig = check(&pkt, Protocol::DCCP, &ports()).unwrap();
        assert_eq!(elig.ulp_len, 12);
        assert_eq!(elig.ulp_len_u16(), Ok(12));
    }

    #[test]
    fn not_ipv4() {
        let mut bytes = pkt_bytes(0x21, 0x01);
        bytes[0] = 0x65;
        let pkt = PacketBuf::copy(bytes);
        assert_eq!(
            check(&pkt, Protocol::DCCP, &ports()),
            Err(Skip::BadIp(Ipv4HdrError::BadVersion { vsn: 6 }))
        );
    }

    #[test]
    fn headers_split_across_segments() {
        let bytes = pkt_bytes(0x21, 0x01);
        let pkt = PacketBuf::from_segments([
            bytes[..13].to_vec(),
            bytes[13..27].to_vec(),
            bytes[27..].to_vec(),
        ]);
        let elig = check(&pkt, Protocol::DCCP, &ports()).unwrap();
        assert_eq!(elig.ulp_len, 20);
    }
}
