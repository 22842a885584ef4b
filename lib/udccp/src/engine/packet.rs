// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet buffers handed to the converter.
//!
//! A [`PacketBuf`] is an owned packet made of one or more segments, in
//! the manner of an mblk or skb chain. Header rewriting only ever
//! touches the head segment; checksums are summed across all of them.

use super::checksum::Checksum;
use super::dccp::DccpHdr;
use super::dccp::ExtHdrRaw;
use super::dccp::UdpShapedHdr;
use super::ip4::Ipv4Hdr;
use super::ip4::Ipv4HdrError;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// The largest packet an IPv4 header can describe.
pub const MAX_PKT_LEN: usize = u16::MAX as usize;

bitflags::bitflags! {
    /// Checksum state attached to a packet by the layers below.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct OffloadFlags: u16 {
        /// Rx: the L4 checksum was verified, by hardware or by us.
        const L4_CSUM_OK = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LinearizeError {
    #[error("packet of {len} bytes exceeds {MAX_PKT_LEN}")]
    TooLarge { len: usize },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error("{0}")]
    Ip(#[from] Ipv4HdrError),

    #[error("transport header truncated: only {len} bytes available")]
    UlpTruncated { len: usize },
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PacketBuf {
    segs: Vec<Vec<u8>>,
    offload: OffloadFlags,
}

impl PacketBuf {
    /// Create a single-segment packet holding a copy of `buf`.
    pub fn copy(buf: impl AsRef<[u8]>) -> Self {
        Self::from_segments([buf.as_ref().to_vec()])
    }

    /// Create a packet from its segments, in order.
    pub fn from_segments<I>(segs: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            segs: segs.into_iter().collect(),
            offload: OffloadFlags::empty(),
        }
    }

    /// Total number of bytes across all segments.
    pub fn byte_len(&self) -> usize {
        self.segs.iter().map(Vec::len).sum()
    }

    /// Sum every byte from `offset` to the end of the packet.
    ///
    /// Segment boundaries may fall on odd offsets; a byte left over at
    /// the end of one segment is paired with the first byte of the
    /// next, as if the packet were contiguous.
    pub fn checksum_from(&self, offset: usize) -> Checksum {
        let mut csum = Checksum::new();
        let mut skip = offset;
        let mut carry: Option<u8> = None;

        for seg in &self.segs {
            if skip >= seg.len() {
                skip -= seg.len();
                continue;
            }

            let mut bytes = &seg[skip..];
            skip = 0;

            if let Some(prev) = carry.take() {
                match bytes.split_first() {
                    Some((first, rest)) => {
                        csum.add_bytes(&[prev, *first]);
                        bytes = rest;
                    }

                    None => {
                        carry = Some(prev);
                        continue;
                    }
                }
            }

            let even = bytes.len() & !1;
            csum.add_bytes(&bytes[..even]);
            if even < bytes.len() {
                carry = Some(bytes[even]);
            }
        }

        if let Some(last) = carry {
            csum.add_bytes(&[last]);
        }

        csum
    }

    /// Copy out all bytes within this packet to a single contiguous
    /// buffer.
    pub fn copy_all(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());

        for seg in &self.segs {
            out.extend_from_slice(seg);
        }

        out
    }

    /// The first segment.
    pub fn head(&self) -> &[u8] {
        self.segs.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first segment, for in-place rewriting.
    pub fn head_mut(&mut self) -> &mut [u8] {
        self.segs.first_mut().map(Vec::as_mut_slice).unwrap_or(&mut [])
    }

    /// Does the packet live in a single segment?
    pub fn is_linear(&self) -> bool {
        self.segs.len() <= 1
    }

    /// Collapse all segments into one.
    ///
    /// Offload flags are carried over. On error the packet is left as
    /// it was.
    pub fn linearize(&mut self) -> Result<(), LinearizeError> {
        if self.is_linear() {
            return Ok(());
        }

        let len = self.byte_len();
        if len > MAX_PKT_LEN {
            return Err(LinearizeError::TooLarge { len });
        }

        let all = self.copy_all();
        self.segs = vec![all];
        Ok(())
    }

    pub fn offload_flags(&self) -> OffloadFlags {
        self.offload
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`, crossing
    /// segments as needed.
    ///
    /// Return `false`, leaving `dst` partially written, if the packet
    /// ends first.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> bool {
        let mut skip = offset;
        let mut filled = 0;

        for seg in &self.segs {
            if filled == dst.len() {
                break;
            }

            if skip >= seg.len() {
                skip -= seg.len();
                continue;
            }

            let avail = &seg[skip..];
            skip = 0;
            let n = avail.len().min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&avail[..n]);
            filled += n;
        }

        filled == dst.len()
    }

    pub fn segs(&self) -> impl Iterator<Item = &[u8]> {
        self.segs.iter().map(Vec::as_slice)
    }

    pub fn set_offload_flags(&mut self, flags: OffloadFlags) {
        self.offload = flags;
    }

    /// Parse the head segment as IPv4 followed by the fixed region of
    /// an extended transport header.
    pub fn view(&mut self) -> Result<PacketView<'_>, ViewError> {
        let pkt_len = self.byte_len();
        PacketView::parse(self.head_mut(), pkt_len)
    }
}

/// A mutable view over the headers of one packet.
///
/// The transport header is the 12-byte fixed region; whether it is
/// read as DCCP or as its UDP-shaped encoding is up to the caller.
#[derive(Debug)]
pub struct PacketView<'a> {
    pub ip: Ipv4Hdr<'a>,
    ulp: &'a mut ExtHdrRaw,
    ulp_len: usize,
}

impl<'a> PacketView<'a> {
    /// Parse the headers at the front of `buf`, where `pkt_len` is the
    /// length of the whole packet `buf` belongs to.
    pub fn parse(buf: &'a mut [u8], pkt_len: usize) -> Result<Self, ViewError> {
        let (ip, rest) = Ipv4Hdr::parse(buf)?;
        let len = rest.len();
        let (ulp, _) = ExtHdrRaw::mut_from_prefix(rest)
            .map_err(|_| ViewError::UlpTruncated { len })?;
        let ulp_len = pkt_len.saturating_sub(ip.hdr_len());
        Ok(Self { ip, ulp, ulp_len })
    }

    pub fn dccp(&mut self) -> DccpHdr<'_> {
        DccpHdr::new(&mut *self.ulp)
    }

    pub fn udp_shaped(&mut self) -> UdpShapedHdr<'_> {
        UdpShapedHdr::new(&mut *self.ulp)
    }

    /// Sum of the fixed transport header region as it currently stands.
    pub fn ulp_hdr_csum(&self) -> Checksum {
        Checksum::compute(self.ulp.as_bytes())
    }

    /// Bytes from the start of the transport header to the end of the
    /// packet.
    pub fn ulp_len(&self) -> usize {
        self.ulp_len
    }
}
