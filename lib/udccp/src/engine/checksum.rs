// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types for calculating the internet checksum.
//!
//! The [`Checksum`] type provides a rolling one's complement sum,
//! allowing a sum to be built up from several disjoint byte ranges
//! (a pseudo-header, a rewritten transport header, a payload spread
//! across segments) before finalizing it into a [`HeaderChecksum`],
//! which is the value stored in the actual header bytes.
//!
//! # Checksums and Endianness
//!
//! A logical value in a network header (a port, a length) is sent in
//! network order and must be converted on the host. The internet
//! checksum is not such a value: it is a pair of bytes produced by
//! summing the packet as a sequence of 16-bit words. The sum comes
//! out right regardless of host byte order as long as the words are
//! loaded and the result stored with the *same* conversion. We load
//! with `from_ne_bytes()` and store with `to_ne_bytes()`, so on a
//! little-endian host every word is logically swapped on the way in
//! and swapped back on the way out. Never byte-swap a checksum field.
//!
//! See RFC 1071 §1.B:
//!
//! > Therefore, the sum may be calculated in exactly the same way
//! > regardless of the byte order ("big-endian" or "little-endian")
//! > of the underlaying hardware.
//!
//! # Relevant RFCs
//!
//! * 768 User Datagram Protocol
//!
//! * 1071 Computing the Internet Checksum
//!
//! * 4340 Datagram Congestion Control Protocol, §9

/// The checksum value, as it is contained in a network header.
///
/// This holds the bytes as they are stored in the header itself,
/// i.e. with one's complement applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Return the bytes to transmit in a UDP header.
    ///
    /// UDP reserves an all-zero checksum to mean "no checksum", so a
    /// computed zero goes on the wire as its one's complement
    /// equivalent, all ones (RFC 768).
    pub fn udp_bytes(&self) -> [u8; 2] {
        if self.inner == [0; 2] { [0xFF; 2] } else { self.inner }
    }

    /// Wrap the checksum bytes found in a header.
    pub fn wrap(hc: [u8; 2]) -> Self {
        Self { inner: hc }
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        // See the module-level comment about why it's important to
        // convert using native-endian.
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
///
/// Carries are accumulated in the upper half of a `u32` and only
/// folded back in when the final value is needed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Creates a new checksum counter.
    pub fn new() -> Self {
        Self::from(0)
    }

    /// Update the sum by adding the contents of `bytes`.
    ///
    /// An odd trailing byte is summed as if padded with a zero byte,
    /// so callers summing discontiguous ranges must only split on
    /// even offsets.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Update the sum by subtracting the contents of `bytes`.
    pub fn sub_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_sub(self.inner, bytes);
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }

    /// Does this sum, which must include the stored header checksum,
    /// describe an intact packet?
    ///
    /// A correct checksum field makes the complete sum come out as
    /// all ones (negative zero).
    pub fn verifies(&mut self) -> bool {
        self.finalize() == 0xFFFF
    }
}

impl From<HeaderChecksum> for Checksum {
    // Convert a header's checksum bytes into a rolling checksum.
    fn from(hc: HeaderChecksum) -> Self {
        // See the module-level comment about why it's important to
        // convert using native-endian.
        Self { inner: (!u16::from_ne_bytes(hc.bytes())) as u32 }
    }
}

impl From<u32> for Checksum {
    fn from(csum: u32) -> Self {
        Self { inner: csum }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(mut self, mut other: Self) -> Self {
        // Fold first so that summing many partial sums cannot
        // overflow the accumulator.
        Self { inner: self.finalize() as u32 + other.finalize() as u32 }
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

fn csum_add(csum: u32, bytes: &[u8]) -> u32 {
    let mut csum = fold_carry(csum);
    let mut words = bytes.chunks_exact(2);

    for w in &mut words {
        // See the module-level comment about why it's important to
        // convert using native-endian.
        csum += u16::from_ne_bytes([w[0], w[1]]) as u32;
        csum = fold_carry(csum);
    }

    if let [last] = words.remainder() {
        csum += u16::from_ne_bytes([*last, 0]) as u32;
    }

    csum
}

fn csum_sub(csum: u32, bytes: &[u8]) -> u32 {
    let mut csum = fold_carry(csum);
    let mut words = bytes.chunks_exact(2);

    for w in &mut words {
        csum += (!u16::from_ne_bytes([w[0], w[1]])) as u32;
        csum = fold_carry(csum);
    }

    if let [last] = words.remainder() {
        csum += (!u16::from_ne_bytes([*last, 0])) as u32;
    }

    csum
}

// Keep the accumulator clear of the top bit for arbitrarily long
// inputs; a packet can span up to 64KiB of words.
#[inline]
fn fold_carry(csum: u32) -> u32 {
    if csum & 0x8000_0000 != 0 {
        (csum >> 16) + (csum & 0xFFFF)
    } else {
        csum
    }
}
