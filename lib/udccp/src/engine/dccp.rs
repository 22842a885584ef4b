// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! DCCP extended headers and their UDP-shaped encoding.
//!
//! A DCCP generic header with X=1 (RFC 4340 §5.1) is 16 bytes:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Source Port          |           Dest Port           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Data Offset  | CCVal | CsCov |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     |       |X|               |                               .
//! | Res | Type  |=|   Reserved    |  Sequence Number (high bits)  .
//! |     |       |1|               |                               .
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! .                  Sequence Number (low bits)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Only the first 12 bytes, the fixed region, take part in the
//! conversion. It rewrites them in place so that the first 8 form a
//! valid UDP header:
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Source Port          |           Dest Port           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            Length             |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | CCVal | Type  |  Data Offset  |  Sequence Number (high bits)  .
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! .                  Sequence Number (low bits)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! CsCov and the reserved bits have no slot in this encoding. They
//! come back as zero. The low sequence word is never read or written,
//! and a packet that ends after the fixed region is still converted.

use core::fmt;
use core::fmt::Display;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// Length of the DCCP generic header when X=1.
pub const DCCP_EXT_HDR_LEN: usize = 16;

/// Length of the region the conversion rewrites.
pub const DCCP_FIXED_HDR_LEN: usize = ExtHdrRaw::SIZE;

/// Offset of the checksum field, which both encodings share.
pub const DCCP_CSUM_OFF: usize = 6;

pub const NIBBLE_MASK: u8 = 0x0F;
pub const NIBBLE_SHIFT: u8 = 4;
pub const DCCP_TYPE_SHIFT: u8 = 1;
pub const DCCP_X_MASK: u8 = 0x01;
pub const DCCP_RES_SHIFT: u8 = 5;

/// Pack two 4-bit values into one byte, `hi` in the upper nibble.
#[inline]
pub fn pack_nibbles(hi: u8, lo: u8) -> u8 {
    ((hi & NIBBLE_MASK) << NIBBLE_SHIFT) | (lo & NIBBLE_MASK)
}

/// Split a byte into its (upper, lower) nibbles.
#[inline]
pub fn unpack_nibbles(byte: u8) -> (u8, u8) {
    (byte >> NIBBLE_SHIFT, byte & NIBBLE_MASK)
}

/// DCCP packet types (RFC 4340 §5.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DccpType {
    Request,
    Response,
    Data,
    Ack,
    DataAck,
    CloseReq,
    Close,
    Reset,
    Sync,
    SyncAck,
    Reserved(u8),
}

impl From<u8> for DccpType {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Request,
            1 => Self::Response,
            2 => Self::Data,
            3 => Self::Ack,
            4 => Self::DataAck,
            5 => Self::CloseReq,
            6 => Self::Close,
            7 => Self::Reset,
            8 => Self::Sync,
            9 => Self::SyncAck,
            _ => Self::Reserved(val),
        }
    }
}

impl From<DccpType> for u8 {
    fn from(ty: DccpType) -> u8 {
        match ty {
            DccpType::Request => 0,
            DccpType::Response => 1,
            DccpType::Data => 2,
            DccpType::Ack => 3,
            DccpType::DataAck => 4,
            DccpType::CloseReq => 5,
            DccpType::Close => 6,
            DccpType::Reset => 7,
            DccpType::Sync => 8,
            DccpType::SyncAck => 9,
            DccpType::Reserved(v) => v,
        }
    }
}

impl Display for DccpType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Reserved(v) => write!(f, "Reserved({})", v),
            other => write!(f, "{:?}", other),
        }
    }
}

/// The DCCP fields that move between the two encodings.
///
/// Ports and the sequence number keep their positions; these three
/// are relocated so the Length field can take their place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExtFields {
    pub doff: u8,
    pub ccval: u8,
    pub pkt_type: u8,
}

/// The fixed region of the extended header, in either encoding.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct ExtHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub doff: u8,
    pub ccval_cscov: u8,
    pub csum: [u8; 2],
    pub res_type_x: u8,
    pub rsvd: u8,
    pub seq_high: [u8; 2],
}

impl ExtHdrRaw {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    #[inline]
    fn src_port(&self) -> u16 {
        u16::from_be_bytes(self.src_port)
    }

    #[inline]
    fn dst_port(&self) -> u16 {
        u16::from_be_bytes(self.dst_port)
    }
}

/// The extended header read as DCCP.
#[derive(Debug)]
pub struct DccpHdr<'a> {
    raw: &'a mut ExtHdrRaw,
}

impl<'a> DccpHdr<'a> {
    pub fn new(raw: &'a mut ExtHdrRaw) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn ccval(&self) -> u8 {
        unpack_nibbles(self.raw.ccval_cscov).0
    }

    #[inline]
    pub fn cscov(&self) -> u8 {
        unpack_nibbles(self.raw.ccval_cscov).1
    }

    #[inline]
    pub fn csum(&self) -> [u8; 2] {
        self.raw.csum
    }

    #[inline]
    pub fn doff(&self) -> u8 {
        self.raw.doff
    }

    #[inline]
    pub fn dst_port(&self) -> u16 {
        self.raw.dst_port()
    }

    /// Read the fields the UDP-shaped encoding relocates.
    pub fn ext_fields(&self) -> ExtFields {
        ExtFields {
            doff: self.doff(),
            ccval: self.ccval(),
            pkt_type: u8::from(self.pkt_type()),
        }
    }

    #[inline]
    pub fn pkt_type(&self) -> DccpType {
        DccpType::from((self.raw.res_type_x >> DCCP_TYPE_SHIFT) & NIBBLE_MASK)
    }

    /// The 3 reserved bits ahead of Type.
    #[inline]
    pub fn reserved(&self) -> u8 {
        self.raw.res_type_x >> DCCP_RES_SHIFT
    }

    /// The reserved byte following Type and X.
    #[inline]
    pub fn reserved2(&self) -> u8 {
        self.raw.rsvd
    }

    /// Write back the relocated fields, resetting everything the
    /// UDP-shaped encoding could not carry.
    ///
    /// CsCov becomes 0 (the whole datagram is covered), the reserved
    /// bits and byte are zeroed, and X is set since only extended
    /// headers are ever encoded.
    pub fn restore(&mut self, fields: &ExtFields) {
        self.raw.doff = fields.doff;
        self.raw.ccval_cscov = pack_nibbles(fields.ccval, 0);
        self.raw.res_type_x = ((fields.pkt_type & NIBBLE_MASK)
            << DCCP_TYPE_SHIFT)
            | DCCP_X_MASK;
        self.raw.rsvd = 0;
    }

    /// The upper 16 bits of the 48-bit sequence number.
    #[inline]
    pub fn seq_high(&self) -> u16 {
        u16::from_be_bytes(self.raw.seq_high)
    }

    #[inline]
    pub fn set_csum(&mut self, csum: [u8; 2]) {
        self.raw.csum = csum;
    }

    #[inline]
    pub fn src_port(&self) -> u16 {
        self.raw.src_port()
    }

    #[inline]
    pub fn x(&self) -> bool {
        self.raw.res_type_x & DCCP_X_MASK != 0
    }
}

/// The extended header read in its UDP-shaped encoding.
#[derive(Debug)]
pub struct UdpShapedHdr<'a> {
    raw: &'a mut ExtHdrRaw,
}

impl<'a> UdpShapedHdr<'a> {
    pub fn new(raw: &'a mut ExtHdrRaw) -> Self {
        Self { raw }
    }

    /// Overwrite the header with its UDP-shaped encoding.
    ///
    /// `fields` must have been read before this call, as the Length
    /// field lands on top of Data Offset and CsCov.
    pub fn encode(&mut self, fields: &ExtFields, len: u16) {
        self.raw.res_type_x = pack_nibbles(fields.ccval, fields.pkt_type);
        self.raw.rsvd = fields.doff;
        let [len_hi, len_lo] = len.to_be_bytes();
        self.raw.doff = len_hi;
        self.raw.ccval_cscov = len_lo;
    }

    /// Read the relocated DCCP fields back out.
    pub fn ext_fields(&self) -> ExtFields {
        let (ccval, pkt_type) = unpack_nibbles(self.raw.res_type_x);
        ExtFields { doff: self.raw.rsvd, ccval, pkt_type }
    }

    /// The UDP Length field.
    #[inline]
    pub fn len(&self) -> u16 {
        u16::from_be_bytes([self.raw.doff, self.raw.ccval_cscov])
    }

    #[inline]
    pub fn set_csum(&mut self, csum: [u8; 2]) {
        self.raw.csum = csum;
    }
}
