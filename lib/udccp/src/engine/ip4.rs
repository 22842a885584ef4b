// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! IPv4 headers.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
pub use udccp_api::Ipv4Addr;
pub use udccp_api::Protocol;
use udccp_api::IPV4_VERSION;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Ipv4HdrError {
    #[error("bad IP version: {vsn}")]
    BadVersion { vsn: u8 },

    #[error("bad IPv4 header length: {hdr_len}")]
    BadHdrLen { hdr_len: usize },

    #[error("IPv4 header truncated: only {len} bytes available")]
    Truncated { len: usize },
}

/// A mutable view of an IPv4 header, options included.
#[derive(Debug)]
pub struct Ipv4Hdr<'a> {
    base: &'a mut Ipv4HdrRaw,
    opts: &'a mut [u8],
}

impl<'a> Ipv4Hdr<'a> {
    pub const BASE_SIZE: usize = Ipv4HdrRaw::SIZE;
    pub const MAX_SIZE: usize = 60;

    /// Parse the IPv4 header at the front of `buf`, returning the
    /// header and the bytes that follow it.
    pub fn parse(
        buf: &'a mut [u8],
    ) -> Result<(Self, &'a mut [u8]), Ipv4HdrError> {
        let len = buf.len();
        let (base, rest) = Ipv4HdrRaw::mut_from_prefix(buf)
            .map_err(|_| Ipv4HdrError::Truncated { len })?;

        let vsn = base.ver_hdr_len >> IPV4_HDR_VER_SHIFT;
        if vsn != IPV4_VERSION {
            return Err(Ipv4HdrError::BadVersion { vsn });
        }

        let hdr_len = usize::from(base.ver_hdr_len & IPV4_HDR_LEN_MASK) * 4;
        if hdr_len < Self::BASE_SIZE {
            return Err(Ipv4HdrError::BadHdrLen { hdr_len });
        }

        let opts_len = hdr_len - Self::BASE_SIZE;
        if rest.len() < opts_len {
            return Err(Ipv4HdrError::Truncated { len });
        }

        let (opts, ulp) = rest.split_at_mut(opts_len);
        Ok((Self { base, opts }, ulp))
    }

    #[inline]
    pub fn csum(&self) -> [u8; 2] {
        self.base.csum
    }

    /// Zero the header checksum, then compute and store it over the
    /// whole header, options included.
    pub fn compute_hdr_csum(&mut self) {
        self.base.csum = [0; 2];
        let mut csum = Checksum::compute(self.base.as_bytes());
        csum.add_bytes(self.opts);
        self.base.csum = HeaderChecksum::from(csum).bytes();
    }

    #[inline]
    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.base.dst)
    }

    /// Is the stored header checksum correct?
    pub fn hdr_csum_ok(&self) -> bool {
        let mut csum = Checksum::compute(self.base.as_bytes());
        csum.add_bytes(self.opts);
        csum.verifies()
    }

    /// Return the header length, in bytes.
    #[inline]
    pub fn hdr_len(&self) -> usize {
        Self::BASE_SIZE + self.opts.len()
    }

    #[inline]
    pub fn proto(&self) -> Protocol {
        Protocol::from(self.base.proto)
    }

    #[inline]
    pub fn set_proto(&mut self, proto: Protocol) {
        self.base.proto = u8::from(proto);
    }

    #[inline]
    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.base.src)
    }

    /// Return the value of the `Total Length` field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(self.base.total_len)
    }
}

/// Populate `bytes` with the IPv4 pseudo-header used by UDP, TCP and
/// DCCP checksums.
pub fn pseudo_bytes(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: Protocol,
    ulp_len: u16,
    bytes: &mut [u8; 12],
) {
    bytes[0..4].copy_from_slice(&src.octets());
    bytes[4..8].copy_from_slice(&dst.octets());
    let len_bytes = ulp_len.to_be_bytes();
    bytes[8..12].copy_from_slice(&[
        0,
        u8::from(proto),
        len_bytes[0],
        len_bytes[1],
    ]);
}

/// Return a [`Checksum`] of the pseudo-header.
///
/// The protocol and length are passed explicitly rather than read
/// from an IP header: a transcoded packet is checksummed as the
/// protocol it is about to become.
pub fn pseudo_csum(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: Protocol,
    ulp_len: u16,
) -> Checksum {
    let mut pseudo = [0u8; 12];
    pseudo_bytes(src, dst, proto, ulp_len, &mut pseudo);
    Checksum::compute(&pseudo)
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4HdrRaw {
    pub const SIZE: usize = core::mem::size_of::<Self>();
}
